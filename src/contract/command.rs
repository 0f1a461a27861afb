//! Control commands exchanged with a sync server

use serde::{Deserialize, Serialize};
use std::fmt;

/// Control vocabulary, distinct from content transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum Command {
	#[default]
	Unknown = 0,
	Info = 1,
	Auth = 2,
}

impl From<i32> for Command {
	fn from(raw: i32) -> Self {
		match raw {
			1 => Command::Info,
			2 => Command::Auth,
			_ => Command::Unknown,
		}
	}
}

impl From<Command> for i32 {
	fn from(c: Command) -> Self {
		c as i32
	}
}

impl fmt::Display for Command {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			Command::Unknown => "unknown",
			Command::Info => "info",
			Command::Auth => "auth",
		};
		write!(f, "{}", s)
	}
}

/// Body of `POST /api/command`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandRequest {
	pub command: Command,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub username: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub password: Option<String>,
}

impl CommandRequest {
	pub fn info() -> Self {
		Self { command: Command::Info, ..Default::default() }
	}

	pub fn auth(username: &str, password: &str) -> Self {
		Self {
			command: Command::Auth,
			username: Some(username.to_string()),
			password: Some(password.to_string()),
		}
	}
}

/// Reply to `Command::Info`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
	pub version: String,
	pub root: String,
	pub auth_required: bool,
}

/// Reply to `Command::Auth`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
	pub token: String,
}

// vim: ts=4
