//! Core driver trait every storage backend implements
//!
//! The orchestrator depends only on this trait, never on a concrete backend.
//! Paths are slash separated and relative to the backend root; the empty
//! string names the root itself.

use async_trait::async_trait;
use std::path::Path;
use tokio::io::AsyncRead;

use crate::contract::{FileInfo, FileTimes};
use crate::error::SyncResult;

/// What a [`Driver::walk_dir`] visitor wants next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkControl {
	Continue,
	/// Do not descend into the directory just visited
	SkipDir,
	/// End the walk; `walk_dir` still returns Ok
	Stop,
}

/// Visitor called once per entry, the walk root included
pub type WalkVisitor<'a> = dyn FnMut(&FileInfo) -> SyncResult<WalkControl> + Send + 'a;

/// Boxed byte stream returned by [`Driver::open`]
pub type ReadStream = Box<dyn AsyncRead + Send + Unpin>;

/// What a [`Driver::write`] actually moved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferReport {
	pub bytes_sent: u64,
	pub chunks_sent: usize,
	pub chunks_total: usize,
}

impl TransferReport {
	/// Target already held identical content
	pub fn unchanged(chunks_total: usize) -> Self {
		TransferReport { bytes_sent: 0, chunks_sent: 0, chunks_total }
	}
}

/// Storage capability interface
///
/// Implementations must be safe for concurrent use: one instance is shared by
/// every event dispatched to its target.
#[async_trait]
pub trait Driver: Send + Sync {
	/// Label for logs
	fn name(&self) -> &str;

	/// Validate reachability; idempotent
	async fn connect(&self) -> SyncResult<()>;

	/// Create a directory and missing ancestors; Ok if it exists
	async fn mkdir_all(&self, path: &str) -> SyncResult<()>;

	/// Create an empty file
	async fn create(&self, path: &str) -> SyncResult<()>;

	/// Delete a file or a directory tree; Ok if absent
	async fn remove(&self, path: &str) -> SyncResult<()>;

	/// Move `old_path` to `new_path`; NotFound if `old_path` is absent
	async fn rename(&self, old_path: &str, new_path: &str) -> SyncResult<()>;

	/// Set access and modification times (unix seconds)
	async fn chtimes(&self, path: &str, a_time: i64, m_time: i64) -> SyncResult<()>;

	/// Depth-first traversal starting at `root`
	async fn walk_dir(&self, root: &str, visit: &mut WalkVisitor<'_>) -> SyncResult<()>;

	/// Stream the content of a file
	async fn open(&self, path: &str) -> SyncResult<ReadStream>;

	async fn stat(&self, path: &str) -> SyncResult<FileInfo>;

	/// Creation, access and modification times; see each backend for substitutes
	async fn get_file_time(&self, path: &str) -> SyncResult<FileTimes>;

	/// Copy local file `src` to `dest` on this backend
	async fn write(&self, src: &Path, dest: &str) -> SyncResult<TransferReport>;
}

// vim: ts=4
