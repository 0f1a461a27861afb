//! Single-fire completion signal
//!
//! A [`WaitDone`] starts pending and completes exactly once, optionally with
//! an error. Clones share the same state, so one side can complete it while
//! any number of others wait, either blocking a thread with [`WaitDone::wait`]
//! or suspending a task with [`WaitDone::wait_async`].

use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use tokio::sync::watch;

use crate::error::{SyncError, SyncResult};

type Outcome = Result<(), Arc<SyncError>>;

struct Inner {
	state: Mutex<Option<Outcome>>,
	cond: Condvar,
	tx: watch::Sender<bool>,
}

impl Inner {
	fn lock(&self) -> MutexGuard<'_, Option<Outcome>> {
		// A poisoned latch still holds a valid Option
		self.state.lock().unwrap_or_else(|e| e.into_inner())
	}
}

/// One-shot completion latch carrying an optional error
#[derive(Clone)]
pub struct WaitDone {
	inner: Arc<Inner>,
}

impl Default for WaitDone {
	fn default() -> Self {
		Self::new()
	}
}

impl WaitDone {
	pub fn new() -> Self {
		let (tx, _rx) = watch::channel(false);
		WaitDone { inner: Arc::new(Inner { state: Mutex::new(None), cond: Condvar::new(), tx }) }
	}

	/// Latch that is already complete with `result`
	pub fn completed(result: SyncResult<()>) -> Self {
		let wd = Self::new();
		wd.complete(result);
		wd
	}

	/// Complete without error. Returns false if already complete.
	pub fn done(&self) -> bool {
		self.finish(Ok(()))
	}

	/// Complete with `err`. Returns false if already complete.
	pub fn done_with_error(&self, err: SyncError) -> bool {
		self.finish(Err(Arc::new(err)))
	}

	/// Complete with whichever outcome `result` holds
	pub fn complete(&self, result: SyncResult<()>) -> bool {
		match result {
			Ok(()) => self.done(),
			Err(e) => self.done_with_error(e),
		}
	}

	/// Complete with an outcome shared with other latches
	pub fn settle(&self, outcome: Outcome) -> bool {
		self.finish(outcome)
	}

	fn finish(&self, outcome: Outcome) -> bool {
		{
			let mut state = self.inner.lock();
			if state.is_some() {
				return false;
			}
			*state = Some(outcome);
		}
		self.inner.cond.notify_all();
		self.inner.tx.send_replace(true);
		true
	}

	pub fn is_done(&self) -> bool {
		self.inner.lock().is_some()
	}

	/// Outcome if already complete, without blocking
	pub fn try_result(&self) -> Option<Outcome> {
		self.inner.lock().clone()
	}

	/// Block the current thread until complete.
	///
	/// Must not be called from inside an async task; use [`wait_async`](Self::wait_async) there.
	pub fn wait(&self) -> Outcome {
		let mut state = self.inner.lock();
		loop {
			if let Some(outcome) = state.as_ref() {
				return outcome.clone();
			}
			state = self.inner.cond.wait(state).unwrap_or_else(|e| e.into_inner());
		}
	}

	/// Suspend the current task until complete
	pub async fn wait_async(&self) -> Outcome {
		let mut rx = self.inner.tx.subscribe();
		// The sender lives in `inner`, so the channel cannot close while we hold self
		let _ = rx.wait_for(|done| *done).await;
		self.try_result().unwrap_or(Ok(()))
	}
}

impl std::fmt::Debug for WaitDone {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self.try_result() {
			None => write!(f, "WaitDone(pending)"),
			Some(Ok(())) => write!(f, "WaitDone(ok)"),
			Some(Err(e)) => write!(f, "WaitDone(err: {})", e),
		}
	}
}

/// Wait for every latch and fold the outcomes, keeping the first error
pub async fn wait_all(all: &[WaitDone]) -> Outcome {
	let mut first_err = None;
	for wd in all {
		if let Err(e) = wd.wait_async().await {
			first_err.get_or_insert(e);
		}
	}
	match first_err {
		Some(e) => Err(e),
		None => Ok(()),
	}
}


// vim: ts=4
