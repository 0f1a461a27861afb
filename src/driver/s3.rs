//! S3-compatible backend
//!
//! S3 has no rename, so moves are emulated with copy then delete. Missing
//! credentials fall back to the usual environment and instance sources.

use opendal::layers::TimeoutLayer;
use opendal::Operator;
use std::time::Duration;

use super::object::{ObjectStore, RenameMode, IO_TIMEOUT_SECS, OP_TIMEOUT_SECS};
use crate::error::SyncResult;

/// Region used when the config names none
pub const DEFAULT_REGION: &str = "us-east-1";

/// Connection settings for one bucket
#[derive(Debug, Clone, Default)]
pub struct S3Settings<'a> {
	pub bucket: &'a str,
	pub region: Option<&'a str>,
	pub endpoint: Option<&'a str>,
	pub access_key: Option<&'a str>,
	pub secret_key: Option<&'a str>,
	pub root: &'a str,
}

pub fn build(settings: &S3Settings<'_>) -> SyncResult<ObjectStore> {
	use opendal::services::S3;

	let mut builder = S3::default()
		.bucket(settings.bucket)
		.region(settings.region.unwrap_or(DEFAULT_REGION));

	if let Some(key) = settings.access_key {
		builder = builder.access_key_id(key);
	}
	if let Some(secret) = settings.secret_key {
		builder = builder.secret_access_key(secret);
	}
	if let Some(ep) = settings.endpoint {
		builder = builder.endpoint(ep);
	}
	if !settings.root.is_empty() {
		builder = builder.root(settings.root);
	}

	let operator = Operator::new(builder)?
		.layer(
			TimeoutLayer::default()
				.with_timeout(Duration::from_secs(OP_TIMEOUT_SECS))
				.with_io_timeout(Duration::from_secs(IO_TIMEOUT_SECS)),
		)
		.finish();

	let name = format!(
		"s3://{}{}",
		settings.bucket,
		if settings.root.is_empty() {
			String::new()
		} else {
			format!("/{}", settings.root.trim_start_matches('/'))
		}
	);
	Ok(ObjectStore::new(operator, RenameMode::CopyDelete, name))
}


// vim: ts=4
