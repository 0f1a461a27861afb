//! Per-path ordering of dispatched events
//!
//! Each (target, path) key remembers the completion latch of the last event
//! queued for it. A new event waits on those latches before its first attempt,
//! so events touching the same path reach a target in the order they were
//! dispatched. Keys whose latch has completed are pruned lazily.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::wait::WaitDone;

#[derive(Default)]
pub struct PathSequencer {
	tails: Mutex<HashMap<(usize, String), WaitDone>>,
}

impl PathSequencer {
	pub fn new() -> Self {
		Self::default()
	}

	/// Queue `done` behind every pending event on `keys` for `target`.
	///
	/// Returns the latches to wait for before running.
	pub fn enqueue(&self, target: usize, keys: &[String], done: &WaitDone) -> Vec<WaitDone> {
		let mut tails = self.tails.lock().unwrap_or_else(|e| e.into_inner());
		tails.retain(|_, wd| !wd.is_done());

		let mut before = Vec::new();
		for key in keys {
			if let Some(prev) = tails.insert((target, key.clone()), done.clone()) {
				before.push(prev);
			}
		}
		before
	}

	/// Number of keys with an event still pending
	pub fn pending(&self) -> usize {
		let tails = self.tails.lock().unwrap_or_else(|e| e.into_inner());
		tails.values().filter(|wd| !wd.is_done()).count()
	}
}


// vim: ts=4
