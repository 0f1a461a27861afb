//! Storage backend drivers
//!
//! One [`Driver`] implementation per backend kind:
//!
//! - [`LocalDriver`]: a directory on local disk
//! - [`RemoteDriver`]: a replicr sync server over HTTP(S)
//! - [`ObjectStore`]: SFTP and S3 through opendal, built by [`sftp::build`] and [`s3::build`]
//!
//! # Example Usage
//!
//! ```ignore
//! use replicr::driver::create_driver;
//!
//! let driver = create_driver(&target, &config.chunk)?;
//! driver.connect().await?;
//! driver.write(Path::new("/src/a.txt"), "a.txt").await?;
//! ```

pub mod factory;
pub mod local;
pub mod object;
pub mod remote;
pub mod s3;
pub mod sftp;
pub mod traits;

pub use factory::create_driver;
pub use local::LocalDriver;
pub use object::ObjectStore;
pub use remote::RemoteDriver;
pub use traits::{Driver, ReadStream, TransferReport, WalkControl, WalkVisitor};

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::contract::FileInfo;
use crate::error::{SyncError, SyncResult};

/// Normalize a relative path.
///
/// Drops empty and `.` components. Absolute paths and `..` components are
/// rejected with `AccessDenied`.
pub fn clean_path(path: &str) -> SyncResult<String> {
	if path.starts_with('/') || path.starts_with('\\') {
		return Err(SyncError::AccessDenied { path: path.to_string() });
	}
	let mut parts = Vec::new();
	for part in path.split('/') {
		match part {
			"" | "." => {}
			".." => return Err(SyncError::AccessDenied { path: path.to_string() }),
			p => parts.push(p),
		}
	}
	Ok(parts.join("/"))
}

/// Join two relative paths; either may be empty
pub fn join_path(base: &str, name: &str) -> String {
	match (base.is_empty(), name.is_empty()) {
		(true, _) => name.to_string(),
		(_, true) => base.to_string(),
		_ => format!("{}/{}", base, name),
	}
}

/// Parent of a relative path; None for the root
pub fn parent_path(path: &str) -> Option<&str> {
	if path.is_empty() {
		return None;
	}
	Some(path.rfind('/').map(|i| &path[..i]).unwrap_or(""))
}

/// Map a cleaned relative path under a local root
pub fn local_path(root: &Path, rel: &str) -> PathBuf {
	if rel.is_empty() {
		root.to_path_buf()
	} else {
		root.join(rel)
	}
}

/// Feed a depth-first ordered listing to a walk visitor, honoring SkipDir and Stop
pub fn visit_listing(entries: &[FileInfo], visit: &mut WalkVisitor<'_>) -> SyncResult<()> {
	let mut skipped: Option<String> = None;
	for info in entries {
		if let Some(prefix) = &skipped {
			if info.path.starts_with(prefix.as_str()) {
				continue;
			}
			skipped = None;
		}
		match visit(info)? {
			WalkControl::Continue => {}
			WalkControl::SkipDir if info.is_dir.is_dir() => {
				// The root's subtree is everything that follows
				skipped = Some(if info.path.is_empty() {
					String::new()
				} else {
					format!("{}/", info.path)
				});
			}
			WalkControl::SkipDir => {}
			WalkControl::Stop => break,
		}
	}
	Ok(())
}

/// Order a flat listing depth-first: parents before children, siblings by name
pub fn sort_depth_first(entries: &mut [FileInfo]) {
	entries.sort_by(|a, b| {
		let a_parts = a.path.split('/').filter(|p| !p.is_empty());
		let b_parts = b.path.split('/').filter(|p| !p.is_empty());
		a_parts.cmp(b_parts)
	});
}

pub fn unix_secs(t: SystemTime) -> i64 {
	match t.duration_since(UNIX_EPOCH) {
		Ok(d) => d.as_secs() as i64,
		Err(e) => -(e.duration().as_secs() as i64),
	}
}


// vim: ts=4
