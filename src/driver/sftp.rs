//! SFTP backend
//!
//! Built on opendal's sftp service, which renames natively. Authentication
//! uses the given private key or, without one, the local ssh agent.

use opendal::layers::TimeoutLayer;
use opendal::Operator;
use std::time::Duration;

use super::object::{ObjectStore, RenameMode, IO_TIMEOUT_SECS, OP_TIMEOUT_SECS};
use crate::error::SyncResult;

pub fn build(endpoint: &str, user: &str, key: Option<&str>, root: &str) -> SyncResult<ObjectStore> {
	use opendal::services::Sftp;

	let mut builder = Sftp::default().endpoint(endpoint).user(user);
	if let Some(key) = key {
		builder = builder.key(key);
	}
	if !root.is_empty() {
		builder = builder.root(root);
	}

	let operator = Operator::new(builder)?
		.layer(
			TimeoutLayer::default()
				.with_timeout(Duration::from_secs(OP_TIMEOUT_SECS))
				.with_io_timeout(Duration::from_secs(IO_TIMEOUT_SECS)),
		)
		.finish();

	let name = format!("sftp://{}@{}/{}", user, endpoint, root.trim_start_matches('/'));
	Ok(ObjectStore::new(operator, RenameMode::Native, name))
}

// vim: ts=4
