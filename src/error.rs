//! Error types for replicr operations

use std::error::Error;
use std::fmt;
use std::io;

use crate::contract::Code;

/// Result alias used throughout the crate
pub type SyncResult<T> = Result<T, SyncError>;

/// Coarse classification used to decide retryability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	/// Backend unreachable or transport broken
	Connectivity,
	/// Path absent
	NotFound,
	/// Permission, authentication or access denied
	Permission,
	/// Content hash mismatch or short write
	Integrity,
	/// Retry budget consumed
	Exhaustion,
	/// Abandoned on caller request
	Cancelled,
	/// Invalid configuration or unsupported operation
	Config,
	/// Anything else
	Other,
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			ErrorKind::Connectivity => "connectivity",
			ErrorKind::NotFound => "not-found",
			ErrorKind::Permission => "permission",
			ErrorKind::Integrity => "integrity",
			ErrorKind::Exhaustion => "exhaustion",
			ErrorKind::Cancelled => "cancelled",
			ErrorKind::Config => "config",
			ErrorKind::Other => "other",
		};
		write!(f, "{}", s)
	}
}

/// Main error type for replication operations
#[derive(Debug)]
pub enum SyncError {
	/// Failed to reach a backend
	ConnectionFailed { location: String, source: Box<dyn Error + Send + Sync> },

	/// Path does not exist on the backend
	NotFound { path: String },

	/// Permission denied on a path
	PermissionDenied { path: String },

	/// Authentication rejected by a remote server
	Unauthorized { message: String },

	/// Path escapes the backend root
	AccessDenied { path: String },

	/// Hash verification failed
	HashMismatch { path: String, expected: String, actual: String },

	/// Transfer stopped part way through; `cause` is the error that stopped it
	PartialWrite { path: String, written: u64, expected: u64, cause: Option<Box<SyncError>> },

	/// Remote server answered with a failure code
	Remote { code: Code, message: String },

	/// Malformed wire data
	Protocol { message: String },

	/// Operation not offered by a backend
	Unsupported { operation: &'static str, backend: String },

	/// Invalid configuration
	InvalidConfig { message: String },

	/// All retry attempts failed
	RetryExhausted { description: String, attempts: u32, last: Box<SyncError> },

	/// Wrapped operation panicked
	Panicked { description: String, message: String },

	/// Operation abandoned by caller request
	Cancelled,

	/// I/O error
	Io(io::Error),

	/// Generic error message
	Other { message: String },
}

impl SyncError {
	/// Build from an I/O error, keeping the path for not-found and permission failures
	pub fn io_at(path: impl Into<String>, e: io::Error) -> Self {
		match e.kind() {
			io::ErrorKind::NotFound => SyncError::NotFound { path: path.into() },
			io::ErrorKind::PermissionDenied => SyncError::PermissionDenied { path: path.into() },
			_ => SyncError::Io(e),
		}
	}

	/// Build from a remote status code
	pub fn from_code(code: Code, message: impl Into<String>, path: &str) -> Self {
		let message = message.into();
		match code {
			Code::NotFound => SyncError::NotFound { path: path.to_string() },
			Code::NoPermission => SyncError::PermissionDenied { path: path.to_string() },
			Code::Unauthorized => SyncError::Unauthorized { message },
			Code::AccessDenied => SyncError::AccessDenied { path: path.to_string() },
			_ => SyncError::Remote { code, message },
		}
	}

	pub fn kind(&self) -> ErrorKind {
		match self {
			SyncError::ConnectionFailed { .. } => ErrorKind::Connectivity,
			SyncError::NotFound { .. } => ErrorKind::NotFound,
			SyncError::PermissionDenied { .. }
			| SyncError::Unauthorized { .. }
			| SyncError::AccessDenied { .. } => ErrorKind::Permission,
			SyncError::HashMismatch { .. } | SyncError::PartialWrite { .. } => ErrorKind::Integrity,
			SyncError::RetryExhausted { .. } => ErrorKind::Exhaustion,
			SyncError::Cancelled => ErrorKind::Cancelled,
			SyncError::InvalidConfig { .. } | SyncError::Unsupported { .. } => ErrorKind::Config,
			SyncError::Remote { code, .. } => match code {
				Code::ServerError | Code::Fail => ErrorKind::Connectivity,
				Code::NotFound => ErrorKind::NotFound,
				Code::NoPermission | Code::Unauthorized | Code::AccessDenied => ErrorKind::Permission,
				_ => ErrorKind::Other,
			},
			SyncError::Io(e) => match e.kind() {
				io::ErrorKind::NotFound => ErrorKind::NotFound,
				io::ErrorKind::PermissionDenied => ErrorKind::Permission,
				io::ErrorKind::ConnectionRefused
				| io::ErrorKind::ConnectionReset
				| io::ErrorKind::ConnectionAborted
				| io::ErrorKind::BrokenPipe
				| io::ErrorKind::TimedOut => ErrorKind::Connectivity,
				_ => ErrorKind::Other,
			},
			SyncError::Protocol { .. } | SyncError::Panicked { .. } | SyncError::Other { .. } => {
				ErrorKind::Other
			}
		}
	}

	/// Status code a server reports for this error
	pub fn code(&self) -> Code {
		match self {
			SyncError::NotFound { .. } => Code::NotFound,
			SyncError::PermissionDenied { .. } => Code::NoPermission,
			SyncError::Unauthorized { .. } => Code::Unauthorized,
			SyncError::AccessDenied { .. } => Code::AccessDenied,
			SyncError::Remote { code, .. } => *code,
			SyncError::Io(e) => match e.kind() {
				io::ErrorKind::NotFound => Code::NotFound,
				io::ErrorKind::PermissionDenied => Code::NoPermission,
				_ => Code::ServerError,
			},
			SyncError::HashMismatch { .. }
			| SyncError::PartialWrite { .. }
			| SyncError::Protocol { .. }
			| SyncError::Unsupported { .. }
			| SyncError::InvalidConfig { .. } => Code::Fail,
			_ => Code::ServerError,
		}
	}

	/// Whether another attempt could plausibly succeed
	pub fn is_retryable(&self) -> bool {
		!matches!(
			self.kind(),
			ErrorKind::NotFound
				| ErrorKind::Permission
				| ErrorKind::Config
				| ErrorKind::Cancelled
				| ErrorKind::Exhaustion
		)
	}
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncError::ConnectionFailed { location, source } => {
				write!(f, "Failed to connect to {}: {}", location, source)
			}
			SyncError::NotFound { path } => write!(f, "Not found: {}", path),
			SyncError::PermissionDenied { path } => write!(f, "Permission denied: {}", path),
			SyncError::Unauthorized { message } => write!(f, "Unauthorized: {}", message),
			SyncError::AccessDenied { path } => write!(f, "Access denied: {}", path),
			SyncError::HashMismatch { path, expected, actual } => {
				write!(f, "Hash mismatch on {}: expected {}, got {}", path, expected, actual)
			}
			SyncError::PartialWrite { path, written, expected, cause } => {
				write!(f, "Partial write on {}: {} of {} bytes", path, written, expected)?;
				match cause {
					Some(cause) => write!(f, " ({})", cause),
					None => Ok(()),
				}
			}
			SyncError::Remote { code, message } => {
				write!(f, "Remote error [{}]: {}", code, message)
			}
			SyncError::Protocol { message } => write!(f, "Protocol error: {}", message),
			SyncError::Unsupported { operation, backend } => {
				write!(f, "Operation {} is not supported by {}", operation, backend)
			}
			SyncError::InvalidConfig { message } => {
				write!(f, "Invalid configuration: {}", message)
			}
			SyncError::RetryExhausted { description, attempts, last } => {
				write!(f, "{} failed after {} attempts: {}", description, attempts, last)
			}
			SyncError::Panicked { description, message } => {
				write!(f, "{} panicked: {}", description, message)
			}
			SyncError::Cancelled => write!(f, "Operation cancelled"),
			SyncError::Io(e) => write!(f, "I/O error: {}", e),
			SyncError::Other { message } => write!(f, "{}", message),
		}
	}
}

impl Error for SyncError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			SyncError::ConnectionFailed { source, .. } => Some(source.as_ref()),
			SyncError::RetryExhausted { last, .. } => Some(last.as_ref()),
			SyncError::PartialWrite { cause: Some(cause), .. } => Some(cause.as_ref()),
			SyncError::Io(e) => Some(e),
			_ => None,
		}
	}
}

impl From<io::Error> for SyncError {
	fn from(e: io::Error) -> Self {
		SyncError::Io(e)
	}
}

impl From<String> for SyncError {
	fn from(message: String) -> Self {
		SyncError::Other { message }
	}
}

impl From<&str> for SyncError {
	fn from(message: &str) -> Self {
		SyncError::Other { message: message.to_string() }
	}
}

impl From<serde_json::Error> for SyncError {
	fn from(e: serde_json::Error) -> Self {
		SyncError::Protocol { message: e.to_string() }
	}
}

impl From<base64::DecodeError> for SyncError {
	fn from(e: base64::DecodeError) -> Self {
		SyncError::Protocol { message: format!("Base64 decode error: {}", e) }
	}
}

impl From<json5::Error> for SyncError {
	fn from(e: json5::Error) -> Self {
		SyncError::InvalidConfig { message: e.to_string() }
	}
}

impl From<toml::de::Error> for SyncError {
	fn from(e: toml::de::Error) -> Self {
		SyncError::InvalidConfig { message: e.to_string() }
	}
}

impl From<reqwest::Error> for SyncError {
	fn from(e: reqwest::Error) -> Self {
		let location = e.url().map(|u| u.to_string()).unwrap_or_else(|| "remote".to_string());
		if e.is_decode() {
			return SyncError::Protocol { message: e.to_string() };
		}
		SyncError::ConnectionFailed { location, source: Box::new(e) }
	}
}

impl From<opendal::Error> for SyncError {
	fn from(e: opendal::Error) -> Self {
		match e.kind() {
			opendal::ErrorKind::NotFound => SyncError::NotFound { path: String::new() },
			opendal::ErrorKind::PermissionDenied => {
				SyncError::PermissionDenied { path: String::new() }
			}
			opendal::ErrorKind::Unsupported => SyncError::Unsupported {
				operation: "object-store",
				backend: e.to_string(),
			},
			_ => SyncError::ConnectionFailed {
				location: "object store".to_string(),
				source: Box::new(e),
			},
		}
	}
}

impl From<hyper::Error> for SyncError {
	fn from(e: hyper::Error) -> Self {
		SyncError::ConnectionFailed { location: "http peer".to_string(), source: Box::new(e) }
	}
}

impl From<tokio::task::JoinError> for SyncError {
	fn from(e: tokio::task::JoinError) -> Self {
		SyncError::Other { message: format!("Join error: {}", e) }
	}
}


// vim: ts=4
