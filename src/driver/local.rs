//! Local disk driver
//!
//! Remove on an absent path succeeds. Create and write make missing parent
//! directories. Content is written to a temp file next to the destination and
//! renamed into place, so readers never see a half-written file. Creation
//! time falls back to modification time where the filesystem has none.

use async_trait::async_trait;
use std::fs::Metadata;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use super::traits::{Driver, ReadStream, TransferReport, WalkControl, WalkVisitor};
use super::{clean_path, join_path, local_path, parent_path, unix_secs};
use crate::contract::{FileInfo, FileTimes, IsDir};
use crate::error::{SyncError, SyncResult};
use crate::logging::*;

/// Suffix of in-flight temp files
pub const TMP_SUFFIX: &str = ".replicr-tmp";

pub struct LocalDriver {
	root: PathBuf,
	name: String,
}

impl LocalDriver {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		let root = root.into();
		let name = format!("local:{}", root.display());
		LocalDriver { root, name }
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	fn resolve(&self, path: &str) -> SyncResult<(String, PathBuf)> {
		let rel = clean_path(path)?;
		let full = local_path(&self.root, &rel);
		Ok((rel, full))
	}

	async fn ensure_parent(&self, rel: &str) -> SyncResult<()> {
		if let Some(parent) = parent_path(rel) {
			let dir = local_path(&self.root, parent);
			tokio::fs::create_dir_all(&dir).await.map_err(|e| SyncError::io_at(parent, e))?;
		}
		Ok(())
	}

	/// Recursive helper for walk_dir; returns false once the visitor asked to stop
	fn walk_impl<'a>(
		&'a self,
		rel: String,
		visit: &'a mut WalkVisitor<'_>,
	) -> Pin<Box<dyn Future<Output = SyncResult<bool>> + Send + 'a>> {
		Box::pin(async move {
			let full = local_path(&self.root, &rel);
			let meta = tokio::fs::symlink_metadata(&full).await.map_err(|e| SyncError::io_at(&rel, e))?;
			let info = file_info(&rel, &meta);
			match visit(&info)? {
				WalkControl::Stop => return Ok(false),
				WalkControl::SkipDir => return Ok(true),
				WalkControl::Continue => {}
			}
			if !meta.is_dir() {
				return Ok(true);
			}

			let mut names = Vec::new();
			let mut entries = tokio::fs::read_dir(&full).await.map_err(|e| SyncError::io_at(&rel, e))?;
			while let Some(entry) = entries.next_entry().await? {
				names.push(entry.file_name().to_string_lossy().into_owned());
			}
			names.sort();

			for name in names {
				if !self.walk_impl(join_path(&rel, &name), &mut *visit).await? {
					return Ok(false);
				}
			}
			Ok(true)
		})
	}
}

/// FileInfo for a local entry; no hash
pub(crate) fn file_info(rel: &str, meta: &Metadata) -> FileInfo {
	let times = file_times(meta);
	FileInfo {
		path: rel.to_string(),
		is_dir: IsDir::from_bool(meta.is_dir()),
		size: if meta.is_dir() { 0 } else { meta.len() },
		hash: None,
		c_time: times.c_time,
		a_time: times.a_time,
		m_time: times.m_time,
	}
}

pub(crate) fn file_times(meta: &Metadata) -> FileTimes {
	let m_time = meta.modified().map(unix_secs).unwrap_or(0);
	FileTimes {
		c_time: meta.created().map(unix_secs).unwrap_or(m_time),
		a_time: meta.accessed().map(unix_secs).unwrap_or(m_time),
		m_time,
	}
}

/// Set times on a local path from a blocking thread
pub(crate) async fn set_times(full: PathBuf, rel: &str, a_time: i64, m_time: i64) -> SyncResult<()> {
	let atime = filetime::FileTime::from_unix_time(a_time, 0);
	let mtime = filetime::FileTime::from_unix_time(m_time, 0);
	tokio::task::spawn_blocking(move || filetime::set_file_times(&full, atime, mtime))
		.await?
		.map_err(|e| SyncError::io_at(rel, e))
}

/// Unique hidden temp file path next to `full`
pub(crate) fn tmp_path(full: &Path) -> PathBuf {
	let mut name = std::ffi::OsString::from(".");
	name.push(full.file_name().unwrap_or_default());
	name.push(format!(".{}{}", uuid::Uuid::new_v4().simple(), TMP_SUFFIX));
	full.with_file_name(name)
}

#[async_trait]
impl Driver for LocalDriver {
	fn name(&self) -> &str {
		&self.name
	}

	async fn connect(&self) -> SyncResult<()> {
		tokio::fs::create_dir_all(&self.root).await.map_err(|e| SyncError::ConnectionFailed {
			location: self.root.display().to_string(),
			source: Box::new(e),
		})?;
		let meta = tokio::fs::metadata(&self.root).await?;
		if !meta.is_dir() {
			return Err(SyncError::InvalidConfig {
				message: format!("{} is not a directory", self.root.display()),
			});
		}
		Ok(())
	}

	async fn mkdir_all(&self, path: &str) -> SyncResult<()> {
		let (rel, full) = self.resolve(path)?;
		tokio::fs::create_dir_all(&full).await.map_err(|e| SyncError::io_at(rel, e))
	}

	async fn create(&self, path: &str) -> SyncResult<()> {
		let (rel, full) = self.resolve(path)?;
		self.ensure_parent(&rel).await?;
		tokio::fs::File::create(&full).await.map_err(|e| SyncError::io_at(rel, e))?;
		Ok(())
	}

	async fn remove(&self, path: &str) -> SyncResult<()> {
		let (rel, full) = self.resolve(path)?;
		if rel.is_empty() {
			return Err(SyncError::AccessDenied { path: path.to_string() });
		}
		let meta = match tokio::fs::symlink_metadata(&full).await {
			Ok(meta) => meta,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				debug!("remove {}: already absent", rel);
				return Ok(());
			}
			Err(e) => return Err(SyncError::io_at(rel, e)),
		};
		let result = if meta.is_dir() {
			tokio::fs::remove_dir_all(&full).await
		} else {
			tokio::fs::remove_file(&full).await
		};
		match result {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(SyncError::io_at(rel, e)),
		}
	}

	async fn rename(&self, old_path: &str, new_path: &str) -> SyncResult<()> {
		let (old_rel, old_full) = self.resolve(old_path)?;
		let (new_rel, new_full) = self.resolve(new_path)?;
		if tokio::fs::symlink_metadata(&old_full).await.is_err() {
			return Err(SyncError::NotFound { path: old_rel });
		}
		self.ensure_parent(&new_rel).await?;
		tokio::fs::rename(&old_full, &new_full).await.map_err(|e| SyncError::io_at(old_rel, e))
	}

	async fn chtimes(&self, path: &str, a_time: i64, m_time: i64) -> SyncResult<()> {
		let (rel, full) = self.resolve(path)?;
		set_times(full, &rel, a_time, m_time).await
	}

	async fn walk_dir(&self, root: &str, visit: &mut WalkVisitor<'_>) -> SyncResult<()> {
		let rel = clean_path(root)?;
		self.walk_impl(rel, visit).await?;
		Ok(())
	}

	async fn open(&self, path: &str) -> SyncResult<ReadStream> {
		let (rel, full) = self.resolve(path)?;
		let f = tokio::fs::File::open(&full).await.map_err(|e| SyncError::io_at(rel, e))?;
		Ok(Box::new(f))
	}

	async fn stat(&self, path: &str) -> SyncResult<FileInfo> {
		let (rel, full) = self.resolve(path)?;
		let meta = tokio::fs::symlink_metadata(&full).await.map_err(|e| SyncError::io_at(&rel, e))?;
		Ok(file_info(&rel, &meta))
	}

	async fn get_file_time(&self, path: &str) -> SyncResult<FileTimes> {
		let (rel, full) = self.resolve(path)?;
		let meta = tokio::fs::metadata(&full).await.map_err(|e| SyncError::io_at(rel, e))?;
		Ok(file_times(&meta))
	}

	async fn write(&self, src: &Path, dest: &str) -> SyncResult<TransferReport> {
		let (rel, full) = self.resolve(dest)?;
		if rel.is_empty() {
			return Err(SyncError::AccessDenied { path: dest.to_string() });
		}
		let expected = tokio::fs::metadata(src)
			.await
			.map_err(|e| SyncError::io_at(src.display().to_string(), e))?
			.len();
		self.ensure_parent(&rel).await?;

		let tmp = tmp_path(&full);
		let written = match tokio::fs::copy(src, &tmp).await {
			Ok(n) => n,
			Err(e) => {
				let _ = tokio::fs::remove_file(&tmp).await;
				return Err(SyncError::io_at(src.display().to_string(), e));
			}
		};
		if written != expected {
			let _ = tokio::fs::remove_file(&tmp).await;
			return Err(SyncError::PartialWrite { path: rel, written, expected, cause: None });
		}
		tokio::fs::rename(&tmp, &full).await.map_err(|e| SyncError::io_at(&rel, e))?;
		debug!("{}: wrote {} ({} bytes)", self.name, rel, written);
		Ok(TransferReport { bytes_sent: written, chunks_sent: 1, chunks_total: 1 })
	}
}


// vim: ts=4
