//! Last-synced hash cache
//!
//! Remembers, per target and path, the content hash that was last replicated
//! successfully. The orchestrator consults it to skip writes whose content
//! the target already holds. Entries are cleared on remove and moved on rename.

use std::collections::HashMap;
use std::sync::Mutex;

/// Cache key: target index plus slash separated relative path
type Key = (usize, String);

#[derive(Debug, Default)]
pub struct HashCache {
	entries: Mutex<HashMap<Key, String>>,
}

impl HashCache {
	pub fn new() -> Self {
		Self::default()
	}

	fn with<R>(&self, f: impl FnOnce(&mut HashMap<Key, String>) -> R) -> R {
		let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
		f(&mut entries)
	}

	pub fn get(&self, target: usize, path: &str) -> Option<String> {
		self.with(|m| m.get(&(target, path.to_string())).cloned())
	}

	/// True when `hash` is what the target last received for `path`
	pub fn matches(&self, target: usize, path: &str, hash: &str) -> bool {
		self.with(|m| m.get(&(target, path.to_string())).is_some_and(|h| h == hash))
	}

	pub fn record(&self, target: usize, path: &str, hash: &str) {
		self.with(|m| m.insert((target, path.to_string()), hash.to_string()));
	}

	/// Forget `path` and everything below it
	pub fn invalidate(&self, target: usize, path: &str) {
		let prefix = format!("{}/", path);
		self.with(|m| {
			m.retain(|(t, p), _| *t != target || (p != path && !p.starts_with(&prefix)))
		});
	}

	/// Move the entry for `from` (and its descendants) to `to`
	pub fn rename(&self, target: usize, from: &str, to: &str) {
		let prefix = format!("{}/", from);
		self.with(|m| {
			let moved: Vec<(String, String)> = m
				.iter()
				.filter(|((t, p), _)| *t == target && (p == from || p.starts_with(&prefix)))
				.map(|((_, p), h)| (format!("{}{}", to, &p[from.len()..]), h.clone()))
				.collect();
			m.retain(|(t, p), _| *t != target || (p != from && !p.starts_with(&prefix)));
			for (p, h) in moved {
				m.insert((target, p), h);
			}
		});
	}

	pub fn len(&self) -> usize {
		self.with(|m| m.len())
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}


// vim: ts=4
