//! Classification of filesystem changes
//!
//! Every change notification delivered to the orchestrator is reduced to one
//! member of [`Action`]. The numeric values are part of the wire format.

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Upper bound sentinel, never itself a valid action
pub const MAX_ACTION: i64 = 6;

/// Kind of filesystem change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Action {
	#[default]
	Unknown = 0,
	Create = 1,
	Write = 2,
	Remove = 3,
	Rename = 4,
	Chmod = 5,
}

impl Action {
	/// Map any raw integer onto the closed set, defaulting to `Unknown`
	pub fn valid(raw: i64) -> Action {
		match raw {
			1 => Action::Create,
			2 => Action::Write,
			3 => Action::Remove,
			4 => Action::Rename,
			5 => Action::Chmod,
			_ => Action::Unknown,
		}
	}

	/// Parse from text; never fails, degrades to `Unknown`
	pub fn parse(s: &str) -> Action {
		s.trim().parse::<i64>().map(Action::valid).unwrap_or(Action::Unknown)
	}

	/// Render a raw value without normalizing it first.
	///
	/// Zero prints "Unknown" while any other value outside the known set
	/// prints "Invalid".
	pub fn describe(raw: i64) -> &'static str {
		match raw {
			0 => "Unknown",
			r if r > 0 && r < MAX_ACTION => Action::valid(r).label(),
			_ => "Invalid",
		}
	}

	pub fn label(self) -> &'static str {
		match self {
			Action::Unknown => "Unknown",
			Action::Create => "Create",
			Action::Write => "Write",
			Action::Remove => "Remove",
			Action::Rename => "Rename",
			Action::Chmod => "Chmod",
		}
	}
}

impl fmt::Display for Action {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.label())
	}
}

impl From<i64> for Action {
	fn from(raw: i64) -> Self {
		Action::valid(raw)
	}
}

impl From<Action> for i64 {
	fn from(action: Action) -> Self {
		action as i64
	}
}

impl FromStr for Action {
	type Err = Infallible;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Action::parse(s))
	}
}


// vim: ts=4
