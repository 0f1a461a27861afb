//! Configuration for replicr
//!
//! A single immutable [`Config`] value is loaded once at startup from a TOML
//! or JSON5 file and handed by reference to the orchestrator, the drivers and
//! the server. Every section has defaults, so a file only needs to name what
//! differs.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{SyncError, SyncResult};

// ============================================================================
// MAIN CONFIGURATION STRUCT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
	/// Watched source directory
	pub source: PathBuf,

	/// Backends every change is replicated to
	pub targets: Vec<TargetConfig>,

	pub retry: RetryConfig,

	pub chunk: ChunkConfig,

	pub server: ServerConfig,

	/// Fallback log level when RUST_LOG is unset
	pub log_level: String,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			source: PathBuf::from("."),
			targets: Vec::new(),
			retry: RetryConfig::default(),
			chunk: ChunkConfig::default(),
			server: ServerConfig::default(),
			log_level: "info".to_string(),
		}
	}
}

impl Config {
	/// Load from a file; `.json`/`.json5` parse as JSON5, anything else as TOML
	pub fn load(path: &Path) -> SyncResult<Config> {
		let text =
			std::fs::read_to_string(path).map_err(|e| SyncError::io_at(path.display().to_string(), e))?;
		let config = match path.extension().and_then(|e| e.to_str()) {
			Some("json") | Some("json5") => Config::from_json5(&text)?,
			_ => Config::from_toml(&text)?,
		};
		config.validate()?;
		Ok(config)
	}

	pub fn from_toml(text: &str) -> SyncResult<Config> {
		Ok(toml::from_str(text)?)
	}

	pub fn from_json5(text: &str) -> SyncResult<Config> {
		Ok(json5::from_str(text)?)
	}

	/// Reject values that cannot work at runtime
	pub fn validate(&self) -> SyncResult<()> {
		for (i, target) in self.targets.iter().enumerate() {
			target.validate().map_err(|message| SyncError::InvalidConfig {
				message: format!("targets[{}]: {}", i, message),
			})?;
		}
		match self.chunk.strategy {
			ChunkStrategyKind::Fixed if self.chunk.chunk_size == 0 => {
				return Err(invalid("chunk.chunkSize must be greater than zero"));
			}
			ChunkStrategyKind::Rolling if !(8..=28).contains(&self.chunk.chunk_bits) => {
				return Err(invalid("chunk.chunkBits must be between 8 and 28"));
			}
			_ => {}
		}
		if self.server.addr.parse::<std::net::SocketAddr>().is_err() {
			return Err(invalid(&format!("server.addr is not a socket address: {}", self.server.addr)));
		}
		Ok(())
	}
}

fn invalid(message: &str) -> SyncError {
	SyncError::InvalidConfig { message: message.to_string() }
}

// ============================================================================
// TARGETS
// ============================================================================

/// One replication target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TargetConfig {
	Local {
		path: PathBuf,
	},
	#[serde(rename_all = "camelCase")]
	Remote {
		url: String,
		#[serde(default)]
		username: Option<String>,
		#[serde(default)]
		password: Option<String>,
	},
	#[serde(rename_all = "camelCase")]
	Sftp {
		endpoint: String,
		user: String,
		#[serde(default)]
		key: Option<String>,
		#[serde(default)]
		root: String,
	},
	#[serde(rename_all = "camelCase")]
	S3 {
		bucket: String,
		#[serde(default)]
		region: Option<String>,
		#[serde(default)]
		endpoint: Option<String>,
		#[serde(default)]
		access_key: Option<String>,
		#[serde(default)]
		secret_key: Option<String>,
		#[serde(default)]
		root: String,
	},
}

impl TargetConfig {
	fn validate(&self) -> Result<(), String> {
		match self {
			TargetConfig::Local { path } if path.as_os_str().is_empty() => {
				Err("local target needs a path".to_string())
			}
			TargetConfig::Remote { url, .. }
				if !(url.starts_with("http://") || url.starts_with("https://")) =>
			{
				Err(format!("remote url must be http(s): {}", url))
			}
			TargetConfig::Remote { username: Some(_), password: None, .. } => {
				Err("remote username given without password".to_string())
			}
			TargetConfig::Sftp { endpoint, .. } if endpoint.is_empty() => {
				Err("sftp target needs an endpoint".to_string())
			}
			TargetConfig::S3 { bucket, .. } if bucket.is_empty() => {
				Err("s3 target needs a bucket".to_string())
			}
			_ => Ok(()),
		}
	}
}

// ============================================================================
// RETRY
// ============================================================================

/// Whether the retry executor runs attempts inline or on a spawned task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RetryMode {
	Sync,
	#[default]
	Async,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryConfig {
	/// Additional attempts after the first
	pub count: u32,

	/// Fixed pause between attempts in milliseconds
	pub wait_ms: u64,

	pub mode: RetryMode,

	/// Report exhaustion through the completion signal instead of only logging it
	pub surface_exhaustion: bool,
}

impl RetryConfig {
	pub fn wait(&self) -> Duration {
		Duration::from_millis(self.wait_ms)
	}
}

impl Default for RetryConfig {
	fn default() -> Self {
		RetryConfig { count: 3, wait_ms: 1000, mode: RetryMode::Async, surface_exhaustion: true }
	}
}

// ============================================================================
// CHUNKING
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ChunkStrategyKind {
	#[default]
	Fixed,
	Rolling,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChunkConfig {
	pub strategy: ChunkStrategyKind,

	/// Chunk size for the fixed strategy
	pub chunk_size: u64,

	/// Average chunk size exponent for the rolling strategy
	pub chunk_bits: u32,

	/// Files at or below this size travel as a single chunk
	pub threshold: u64,
}

impl Default for ChunkConfig {
	fn default() -> Self {
		ChunkConfig {
			strategy: ChunkStrategyKind::Fixed,
			chunk_size: 1 << 20,
			chunk_bits: 20,
			threshold: 1 << 20,
		}
	}
}

// ============================================================================
// SERVER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCredentials {
	pub username: String,
	pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
	/// Listen address, e.g. "127.0.0.1:8787"
	pub addr: String,

	/// Directory served to remote drivers
	pub root: PathBuf,

	/// Auth is required only when this is non-empty
	pub users: Vec<UserCredentials>,
}

impl Default for ServerConfig {
	fn default() -> Self {
		ServerConfig { addr: "127.0.0.1:8787".to_string(), root: PathBuf::from("."), users: Vec::new() }
	}
}

impl ServerConfig {
	pub fn auth_required(&self) -> bool {
		!self.users.is_empty()
	}
}


// vim: ts=4
