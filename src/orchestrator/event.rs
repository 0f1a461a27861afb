//! Change events and their lifecycle

use std::fmt;

use crate::action::Action;
use crate::driver::clean_path;
use crate::error::{SyncError, SyncResult};

/// A raw change notification as delivered by a watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
	/// Path relative to the source root
	pub path: String,
	/// Destination of a rename
	pub new_path: Option<String>,
	/// Raw operation value, classified with [`Action::valid`]
	pub op: i64,
}

impl ChangeEvent {
	pub fn new(path: impl Into<String>, action: Action) -> Self {
		ChangeEvent { path: path.into(), new_path: None, op: action.into() }
	}

	/// Event carrying an unclassified operation value
	pub fn raw(path: impl Into<String>, op: i64) -> Self {
		ChangeEvent { path: path.into(), new_path: None, op }
	}

	pub fn rename(old: impl Into<String>, new: impl Into<String>) -> Self {
		ChangeEvent { path: old.into(), new_path: Some(new.into()), op: Action::Rename.into() }
	}

	pub fn action(&self) -> Action {
		Action::valid(self.op)
	}

	/// Classify and normalize the paths
	pub(crate) fn classify(&self) -> SyncResult<Classified> {
		let action = self.action();
		let path = clean_path(&self.path)?;
		let new_path = match &self.new_path {
			Some(p) => Some(clean_path(p)?),
			None if action == Action::Rename => {
				return Err(SyncError::Protocol { message: format!("rename of {} without new path", path) });
			}
			None => None,
		};
		Ok(Classified { action, path, new_path })
	}
}

impl fmt::Display for ChangeEvent {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.new_path {
			Some(new) => write!(f, "{} {} -> {}", Action::describe(self.op), self.path, new),
			None => write!(f, "{} {}", Action::describe(self.op), self.path),
		}
	}
}

/// An event with its action decided and paths cleaned
#[derive(Debug, Clone)]
pub(crate) struct Classified {
	pub action: Action,
	pub path: String,
	pub new_path: Option<String>,
}

impl Classified {
	/// Paths whose per-target order this event takes part in
	pub fn keys(&self) -> Vec<String> {
		let mut keys = vec![self.path.clone()];
		if let Some(new) = &self.new_path {
			if *new != self.path {
				keys.push(new.clone());
			}
		}
		keys
	}
}

/// Lifecycle of one event on one target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventState {
	Received,
	Classified,
	Dispatched,
	Succeeded,
	FailedExhausted,
	Cancelled,
}

impl EventState {
	pub fn is_terminal(self) -> bool {
		matches!(self, EventState::Succeeded | EventState::FailedExhausted | EventState::Cancelled)
	}
}

impl fmt::Display for EventState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			EventState::Received => "received",
			EventState::Classified => "classified",
			EventState::Dispatched => "dispatched",
			EventState::Succeeded => "succeeded",
			EventState::FailedExhausted => "failed",
			EventState::Cancelled => "cancelled",
		};
		write!(f, "{}", s)
	}
}


// vim: ts=4
