//! Logging prelude module for convenient access to tracing macros.
//!
//! # Usage
//!
//! ```ignore
//! use crate::logging::*;
//!
//! info!("Replicated {}", path);
//! warn!("Attempt {} failed", attempt);
//! ```

pub use tracing::{debug, error, info, warn};

/// Initialize the tracing subscriber with environment filter support.
///
/// `RUST_LOG` wins when set; otherwise `level` (e.g. "info", "debug") is used:
///
/// ```bash
/// RUST_LOG=replicr::retry=debug,replicr::orchestrator=debug replicr push -c replicr.toml
/// ```
pub fn init_tracing(level: &str) {
	let fallback = if level.trim().is_empty() { "info" } else { level };
	let _ = tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback)),
		)
		.with_writer(std::io::stderr)
		.try_init();
}

// vim: ts=4
