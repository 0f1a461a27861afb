//! Status codes carried by every response

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SyncError;

/// Outcome code. The first three are the coarse tri-state; the rest refine it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum Code {
	#[default]
	Unknown = 0,
	Success = 1,
	Fail = 2,
	Unauthorized = 3,
	NotFound = 4,
	NoPermission = 5,
	ServerError = 6,
	AccessDenied = 7,
	NotModified = 8,
	ChunkNotModified = 9,
	Modified = 10,
	ChunkModified = 11,
}

impl Code {
	/// Canonical human readable description
	pub fn description(self) -> &'static str {
		match self {
			Code::Unknown => "unknown",
			Code::Success => "success",
			Code::Fail => "fail",
			Code::Unauthorized => "unauthorized",
			Code::NotFound => "not found",
			Code::NoPermission => "no permission",
			Code::ServerError => "server internal error",
			Code::AccessDenied => "access denied",
			Code::NotModified => "not modified",
			Code::ChunkNotModified => "chunk not modified",
			Code::Modified => "modified",
			Code::ChunkModified => "chunk modified",
		}
	}

	/// Codes that mean the request was handled as intended
	pub fn is_ok(self) -> bool {
		matches!(
			self,
			Code::Success
				| Code::NotModified
				| Code::ChunkNotModified
				| Code::Modified
				| Code::ChunkModified
		)
	}
}

impl fmt::Display for Code {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.description())
	}
}

impl From<i32> for Code {
	fn from(raw: i32) -> Self {
		match raw {
			1 => Code::Success,
			2 => Code::Fail,
			3 => Code::Unauthorized,
			4 => Code::NotFound,
			5 => Code::NoPermission,
			6 => Code::ServerError,
			7 => Code::AccessDenied,
			8 => Code::NotModified,
			9 => Code::ChunkNotModified,
			10 => Code::Modified,
			11 => Code::ChunkModified,
			_ => Code::Unknown,
		}
	}
}

impl From<Code> for i32 {
	fn from(code: Code) -> Self {
		code as i32
	}
}

/// Which family of API produced a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum ApiType {
	#[default]
	Unknown = 0,
	SyncMessage = 1,
	Info = 2,
}

impl From<i32> for ApiType {
	fn from(raw: i32) -> Self {
		match raw {
			1 => ApiType::SyncMessage,
			2 => ApiType::Info,
			_ => ApiType::Unknown,
		}
	}
}

impl From<ApiType> for i32 {
	fn from(t: ApiType) -> Self {
		t as i32
	}
}

/// Code, message and API family of a response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
	pub code: Code,
	pub message: String,
	pub api_type: ApiType,
}

impl Status {
	/// Status whose message is the code's canonical description
	pub fn new(code: Code, api_type: ApiType) -> Self {
		Self { code, message: code.description().to_string(), api_type }
	}

	/// Status with an extra detail appended to the canonical description
	pub fn with_detail(code: Code, api_type: ApiType, detail: impl fmt::Display) -> Self {
		Self { code, message: format!("{}: {}", code.description(), detail), api_type }
	}

	/// Turn a failed status into an error for `path`
	pub fn into_error(self, path: &str) -> SyncError {
		SyncError::from_code(self.code, self.message, path)
	}
}

/// Envelope for every JSON response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
	#[serde(flatten)]
	pub status: Status,
	#[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
}

impl<T> ApiResponse<T> {
	pub fn success(api_type: ApiType, data: T) -> Self {
		Self { status: Status::new(Code::Success, api_type), data: Some(data) }
	}

	pub fn with_code(code: Code, api_type: ApiType, data: Option<T>) -> Self {
		Self { status: Status::new(code, api_type), data }
	}

	pub fn failure(status: Status) -> Self {
		Self { status, data: None }
	}

	/// Extract the payload, turning failure codes into errors
	pub fn into_result(self, path: &str) -> Result<Option<T>, SyncError> {
		if self.status.code.is_ok() {
			Ok(self.data)
		} else {
			Err(self.status.into_error(path))
		}
	}
}


// vim: ts=4
