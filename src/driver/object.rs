//! Object storage driver on top of an `opendal::Operator`
//!
//! The SFTP and S3 backends build an operator and hand it to [`ObjectStore`].
//! Neither can set timestamps, so `chtimes` is a logged no-op and
//! `get_file_time` substitutes the last-modified time for creation and
//! access time. Directories are keys ending in `/`. Remove on an absent path
//! succeeds, as object stores delete idempotently.

use async_trait::async_trait;
use futures::TryStreamExt;
use opendal::{Metadata, Metakey, Operator};
use std::path::Path;
use tokio::io::AsyncReadExt;
use tokio_util::compat::FuturesAsyncReadCompatExt;

use super::traits::{Driver, ReadStream, TransferReport, WalkVisitor};
use super::{clean_path, join_path, parent_path, sort_depth_first, visit_listing};
use crate::contract::{FileInfo, FileTimes, IsDir};
use crate::error::{SyncError, SyncResult};
use crate::logging::*;

/// Non-IO operation timeout (stat, delete, ...)
pub const OP_TIMEOUT_SECS: u64 = 60;
/// IO operation timeout (read, write)
pub const IO_TIMEOUT_SECS: u64 = 300;

/// Size of each upload part
const WRITE_BUFFER_SIZE: usize = 8 << 20;

/// How the backend moves an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameMode {
	/// The service renames natively
	Native,
	/// Copy each object then delete the original
	CopyDelete,
}

pub struct ObjectStore {
	operator: Operator,
	rename: RenameMode,
	name: String,
}

fn dir_key(rel: &str) -> String {
	if rel.is_empty() {
		"/".to_string()
	} else {
		format!("{}/", rel)
	}
}

fn with_path(e: opendal::Error, rel: &str) -> SyncError {
	match SyncError::from(e) {
		SyncError::NotFound { .. } => SyncError::NotFound { path: rel.to_string() },
		SyncError::PermissionDenied { .. } => SyncError::PermissionDenied { path: rel.to_string() },
		other => other,
	}
}

/// Upload failure; once bytes have gone out it is reported as a partial write
fn interrupted(rel: String, written: u64, expected: u64, e: opendal::Error) -> SyncError {
	let cause = with_path(e, &rel);
	if written == 0 {
		return cause;
	}
	SyncError::PartialWrite { path: rel, written, expected, cause: Some(Box::new(cause)) }
}

fn info_from(rel: &str, meta: &Metadata) -> FileInfo {
	let m_time = meta.last_modified().map_or(0, |t| t.timestamp());
	let is_dir = meta.is_dir();
	FileInfo {
		path: rel.to_string(),
		is_dir: IsDir::from_bool(is_dir),
		size: if is_dir { 0 } else { meta.content_length() },
		hash: None,
		c_time: m_time,
		a_time: m_time,
		m_time,
	}
}

impl ObjectStore {
	pub fn new(operator: Operator, rename: RenameMode, name: String) -> Self {
		ObjectStore { operator, rename, name }
	}

	/// Metadata for a file key, falling back to the directory key
	async fn lookup(&self, rel: &str) -> SyncResult<Metadata> {
		if rel.is_empty() {
			return self.operator.stat("/").await.map_err(|e| with_path(e, rel));
		}
		match self.operator.stat(rel).await {
			Ok(meta) => Ok(meta),
			Err(e) if e.kind() == opendal::ErrorKind::NotFound => {
				self.operator.stat(&dir_key(rel)).await.map_err(|e| with_path(e, rel))
			}
			Err(e) => Err(with_path(e, rel)),
		}
	}

	/// Every entry below `rel` (not `rel` itself), with paths relative to the store root
	async fn list(&self, rel: &str) -> SyncResult<Vec<FileInfo>> {
		let key = dir_key(rel);
		let mut lister = self
			.operator
			.lister_with(&key)
			.recursive(true)
			.metakey(Metakey::ContentLength | Metakey::LastModified | Metakey::Mode)
			.await
			.map_err(|e| with_path(e, rel))?;

		let mut entries = Vec::new();
		while let Some(entry) = lister.try_next().await? {
			let path = entry.path().trim_matches('/').to_string();
			if path.is_empty() || path == rel {
				continue;
			}
			entries.push(info_from(&path, entry.metadata()));
		}
		Ok(entries)
	}

	/// Move one object
	async fn move_file(&self, old: &str, new: &str) -> SyncResult<()> {
		match self.rename {
			RenameMode::Native => self.operator.rename(old, new).await.map_err(|e| with_path(e, old)),
			RenameMode::CopyDelete => {
				self.operator.copy(old, new).await.map_err(|e| with_path(e, old))?;
				self.operator.delete(old).await.map_err(|e| with_path(e, old))
			}
		}
	}

	/// Move a directory object by object; services only rename single files
	async fn move_tree(&self, old: &str, new: &str) -> SyncResult<()> {
		self.operator.create_dir(&dir_key(new)).await?;
		let mut entries = self.list(old).await?;
		sort_depth_first(&mut entries);
		for entry in entries {
			let moved = join_path(new, entry.path[old.len()..].trim_start_matches('/'));
			if entry.is_dir.is_dir() {
				self.operator.create_dir(&dir_key(&moved)).await?;
			} else {
				self.move_file(&entry.path, &moved).await?;
			}
		}
		self.remove_tree(old).await
	}

	/// Delete a directory and everything below it, deepest entries first
	async fn remove_tree(&self, rel: &str) -> SyncResult<()> {
		let mut entries = self.list(rel).await?;
		sort_depth_first(&mut entries);
		for entry in entries.iter().rev() {
			let key = if entry.is_dir.is_dir() { dir_key(&entry.path) } else { entry.path.clone() };
			self.operator.delete(&key).await.map_err(|e| with_path(e, &entry.path))?;
		}
		self.operator.delete(&dir_key(rel)).await.map_err(|e| with_path(e, rel))
	}

	async fn ensure_parent(&self, rel: &str) -> SyncResult<()> {
		match parent_path(rel).filter(|p| !p.is_empty()) {
			Some(parent) => self.operator.create_dir(&dir_key(parent)).await.map_err(|e| with_path(e, parent)),
			None => Ok(()),
		}
	}
}

#[async_trait]
impl Driver for ObjectStore {
	fn name(&self) -> &str {
		&self.name
	}

	async fn connect(&self) -> SyncResult<()> {
		self.operator.check().await.map_err(|e| SyncError::ConnectionFailed {
			location: self.name.clone(),
			source: Box::new(e),
		})
	}

	async fn mkdir_all(&self, path: &str) -> SyncResult<()> {
		let rel = clean_path(path)?;
		if rel.is_empty() {
			return Ok(());
		}
		self.operator.create_dir(&dir_key(&rel)).await.map_err(|e| with_path(e, &rel))
	}

	async fn create(&self, path: &str) -> SyncResult<()> {
		let rel = clean_path(path)?;
		if rel.is_empty() {
			return Err(SyncError::AccessDenied { path: path.to_string() });
		}
		self.ensure_parent(&rel).await?;
		self.operator.write(&rel, Vec::<u8>::new()).await.map_err(|e| with_path(e, &rel))?;
		Ok(())
	}

	async fn remove(&self, path: &str) -> SyncResult<()> {
		let rel = clean_path(path)?;
		if rel.is_empty() {
			return Err(SyncError::AccessDenied { path: path.to_string() });
		}
		let meta = match self.lookup(&rel).await {
			Ok(meta) => meta,
			Err(SyncError::NotFound { .. }) => {
				debug!("remove {}: already absent", rel);
				return Ok(());
			}
			Err(e) => return Err(e),
		};
		if meta.is_dir() {
			self.remove_tree(&rel).await
		} else {
			self.operator.delete(&rel).await.map_err(|e| with_path(e, &rel))
		}
	}

	async fn rename(&self, old_path: &str, new_path: &str) -> SyncResult<()> {
		let old = clean_path(old_path)?;
		let new = clean_path(new_path)?;
		let meta = self.lookup(&old).await?;
		self.ensure_parent(&new).await?;
		if meta.is_dir() {
			self.move_tree(&old, &new).await
		} else {
			self.move_file(&old, &new).await
		}
	}

	async fn chtimes(&self, path: &str, _a_time: i64, _m_time: i64) -> SyncResult<()> {
		debug!("{}: cannot set times on {}, skipped", self.name, path);
		Ok(())
	}

	async fn walk_dir(&self, root: &str, visit: &mut WalkVisitor<'_>) -> SyncResult<()> {
		let rel = clean_path(root)?;
		let meta = self.lookup(&rel).await?;
		let mut entries = vec![info_from(&rel, &meta)];
		if meta.is_dir() {
			entries.extend(self.list(&rel).await?);
		}
		sort_depth_first(&mut entries);
		visit_listing(&entries, visit)
	}

	async fn open(&self, path: &str) -> SyncResult<ReadStream> {
		let rel = clean_path(path)?;
		let size = self.operator.stat(&rel).await.map_err(|e| with_path(e, &rel))?.content_length();
		let reader = self
			.operator
			.reader(&rel)
			.await
			.map_err(|e| with_path(e, &rel))?
			.into_futures_async_read(0..size)
			.await
			.map_err(|e| with_path(e, &rel))?;
		Ok(Box::new(Box::pin(reader.compat())))
	}

	async fn stat(&self, path: &str) -> SyncResult<FileInfo> {
		let rel = clean_path(path)?;
		let meta = self.lookup(&rel).await?;
		Ok(info_from(&rel, &meta))
	}

	async fn get_file_time(&self, path: &str) -> SyncResult<FileTimes> {
		Ok(self.stat(path).await?.times())
	}

	async fn write(&self, src: &Path, dest: &str) -> SyncResult<TransferReport> {
		let rel = clean_path(dest)?;
		if rel.is_empty() {
			return Err(SyncError::AccessDenied { path: dest.to_string() });
		}
		let mut f = tokio::fs::File::open(src)
			.await
			.map_err(|e| SyncError::io_at(src.display().to_string(), e))?;
		let expected = f.metadata().await?.len();

		self.ensure_parent(&rel).await?;
		let mut writer = self.operator.writer(&rel).await.map_err(|e| with_path(e, &rel))?;
		let mut written: u64 = 0;
		let mut parts = 0usize;
		loop {
			let mut buf = Vec::with_capacity(WRITE_BUFFER_SIZE);
			let n = (&mut f).take(WRITE_BUFFER_SIZE as u64).read_to_end(&mut buf).await?;
			if n == 0 {
				break;
			}
			if let Err(e) = writer.write(buf).await {
				let _ = writer.abort().await;
				return Err(interrupted(rel, written, expected, e));
			}
			written += n as u64;
			parts += 1;
		}
		if let Err(e) = writer.close().await {
			return Err(interrupted(rel, written, expected, e));
		}

		if written != expected {
			return Err(SyncError::PartialWrite { path: rel, written, expected, cause: None });
		}
		debug!("{}: wrote {} ({} bytes)", self.name, rel, written);
		Ok(TransferReport { bytes_sent: written, chunks_sent: parts, chunks_total: parts })
	}
}


// vim: ts=4
