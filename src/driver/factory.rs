//! Driver factory
//!
//! Turns a target entry from the configuration into a shared driver. No
//! connection is made here; callers run `connect()` once before dispatching.

use std::sync::Arc;

use super::local::LocalDriver;
use super::remote::RemoteDriver;
use super::s3::S3Settings;
use super::traits::Driver;
use super::{s3, sftp};
use crate::config::{ChunkConfig, TargetConfig};
use crate::error::SyncResult;

/// Build the driver for `target`; `chunk` drives chunked transfers to remote servers
pub fn create_driver(target: &TargetConfig, chunk: &ChunkConfig) -> SyncResult<Arc<dyn Driver>> {
	let driver: Arc<dyn Driver> = match target {
		TargetConfig::Local { path } => Arc::new(LocalDriver::new(path.clone())),
		TargetConfig::Remote { url, username, password } => {
			Arc::new(RemoteDriver::new(url, username.clone(), password.clone(), chunk.clone())?)
		}
		TargetConfig::Sftp { endpoint, user, key, root } => {
			Arc::new(sftp::build(endpoint, user, key.as_deref(), root)?)
		}
		TargetConfig::S3 { bucket, region, endpoint, access_key, secret_key, root } => {
			Arc::new(s3::build(&S3Settings {
				bucket,
				region: region.as_deref(),
				endpoint: endpoint.as_deref(),
				access_key: access_key.as_deref(),
				secret_key: secret_key.as_deref(),
				root,
			})?)
		}
	};
	Ok(driver)
}


// vim: ts=4
