//! # replicr - Resilient Multi-Backend Filesystem Replication
//!
//! replicr mirrors changes in a local source directory to any number of
//! storage backends: another local directory, a replicr sync server over
//! HTTP, an SFTP server or an S3 bucket. Every backend operation runs under a
//! bounded, cancellable retry policy and reports its outcome through a
//! one-shot [`WaitDone`] latch.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use replicr::{Action, ChangeEvent, Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("replicr.toml".as_ref())?;
//!     let orch = Orchestrator::from_config(&config)?;
//!     orch.connect().await?;
//!     orch.dispatch(ChangeEvent::new("notes/todo.txt", Action::Write)).wait_async().await?;
//!     println!("{:?}", orch.stats());
//!     Ok(())
//! }
//! ```
//!
//! ## Retrying a single operation
//!
//! ```rust,ignore
//! use replicr::Retry;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! let retry = Retry::new(3, Duration::from_millis(500));
//! let done = retry.execute("upload a.txt", CancellationToken::new(), || async { Ok(()) }).await;
//! done.wait_async().await?;
//! ```

pub mod action;
pub mod cache;
pub mod chunking;
pub mod config;
pub mod contract;
pub mod driver;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod retry;
pub mod server;
pub mod wait;

// Re-export commonly used types and functions
pub use action::Action;
pub use config::Config;
pub use driver::{create_driver, Driver};
pub use error::{SyncError, SyncResult};
pub use orchestrator::{ChangeEvent, Orchestrator, SyncStats};
pub use retry::Retry;
pub use server::SyncServer;
pub use wait::WaitDone;

// vim: ts=4
