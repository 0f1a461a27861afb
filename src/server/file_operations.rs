//! Filesystem side of the sync server
//!
//! Applies change records and the compare/chunk/commit transfer steps to a
//! directory tree. Plain changes go through a [`LocalDriver`] rooted at the
//! served directory; chunk application writes in place at each offset and
//! commit fixes the final length, verifies the whole-file hash and applies
//! the sender's times.

use base64::Engine;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::action::Action;
use crate::chunking::{hash_bytes, hash_file, verify_chunk};
use crate::contract::{ChangeRecord, Chunk, ChunkVerdict, Code, CompareResult, FileInfo};
use crate::driver::local::set_times;
use crate::driver::{clean_path, local_path, parent_path, Driver, LocalDriver, WalkControl};
use crate::error::{SyncError, SyncResult};
use crate::logging::*;

pub struct FileOperations {
	root: PathBuf,
	local: LocalDriver,
}

impl FileOperations {
	pub fn new(root: PathBuf) -> Self {
		let local = LocalDriver::new(root.clone());
		FileOperations { root, local }
	}

	pub fn root(&self) -> &PathBuf {
		&self.root
	}

	fn resolve(&self, path: &str) -> SyncResult<(String, PathBuf)> {
		let rel = clean_path(path)?;
		if rel.is_empty() {
			return Err(SyncError::AccessDenied { path: path.to_string() });
		}
		let full = local_path(&self.root, &rel);
		Ok((rel, full))
	}

	/// Replay a metadata change
	pub async fn apply_change(&self, record: &ChangeRecord) -> SyncResult<()> {
		debug!("change {} {}", record.action, record.path);
		match record.action {
			Action::Create => match &record.file {
				Some(file) if file.is_dir.is_dir() => self.local.mkdir_all(&record.path).await,
				_ => self.local.create(&record.path).await,
			},
			Action::Remove => self.local.remove(&record.path).await,
			Action::Rename => {
				let new_path = record.new_path.as_deref().ok_or_else(|| SyncError::Protocol {
					message: format!("rename of {} without new path", record.path),
				})?;
				self.local.rename(&record.path, new_path).await
			}
			Action::Chmod => {
				let file = record.file.as_ref().ok_or_else(|| SyncError::Protocol {
					message: format!("chmod of {} without times", record.path),
				})?;
				self.local.chtimes(&record.path, file.a_time, file.m_time).await
			}
			Action::Write | Action::Unknown => Err(SyncError::Protocol {
				message: format!("{} is not a change record action", record.action),
			}),
		}
	}

	/// Decide which of the offered chunks the sender still has to send
	pub async fn compare(&self, file: &FileInfo, chunks: &[Chunk]) -> SyncResult<CompareResult> {
		let (rel, full) = self.resolve(&file.path)?;
		let all = |code: Code| -> Vec<ChunkVerdict> {
			chunks.iter().map(|c| ChunkVerdict { offset: c.offset, code }).collect()
		};

		let meta = match tokio::fs::metadata(&full).await {
			Ok(meta) if meta.is_file() => meta,
			Ok(_) => return Ok(CompareResult { code: Code::Modified, chunks: all(Code::ChunkModified) }),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				return Ok(CompareResult { code: Code::Modified, chunks: all(Code::ChunkModified) });
			}
			Err(e) => return Err(SyncError::io_at(rel, e)),
		};

		// Whole-file fast path
		if meta.len() == file.size {
			if let Some(expected) = &file.hash {
				if hash_file(&full).await? == *expected {
					return Ok(CompareResult {
						code: Code::NotModified,
						chunks: all(Code::ChunkNotModified),
					});
				}
			}
		}

		let mut f = tokio::fs::File::open(&full).await.map_err(|e| SyncError::io_at(&rel, e))?;
		let mut verdicts = Vec::with_capacity(chunks.len());
		for chunk in chunks {
			let code = if chunk.end() <= meta.len() {
				let mut data = vec![0u8; chunk.size as usize];
				f.seek(std::io::SeekFrom::Start(chunk.offset)).await?;
				f.read_exact(&mut data).await?;
				if hash_bytes(&data) == chunk.hash {
					Code::ChunkNotModified
				} else {
					Code::ChunkModified
				}
			} else {
				Code::ChunkModified
			};
			verdicts.push(ChunkVerdict { offset: chunk.offset, code });
		}
		Ok(CompareResult { code: Code::Modified, chunks: verdicts })
	}

	/// Verify a chunk and write it at its offset without truncating
	pub async fn apply_chunk(&self, path: &str, chunk: &Chunk, data: &str) -> SyncResult<()> {
		let (rel, full) = self.resolve(path)?;
		let bytes = base64::engine::general_purpose::STANDARD.decode(data)?;
		if !verify_chunk(chunk, &bytes) {
			return Err(SyncError::HashMismatch {
				path: rel,
				expected: chunk.hash.clone(),
				actual: hash_bytes(&bytes),
			});
		}
		self.prepare_file(&rel, &full).await?;

		let mut f = tokio::fs::OpenOptions::new()
			.write(true)
			.create(true)
			.truncate(false)
			.open(&full)
			.await
			.map_err(|e| SyncError::io_at(&rel, e))?;
		f.seek(std::io::SeekFrom::Start(chunk.offset)).await?;
		f.write_all(&bytes).await?;
		f.flush().await?;
		Ok(())
	}

	/// Finish a transfer: size, integrity, times
	pub async fn commit(&self, file: &FileInfo) -> SyncResult<()> {
		let (rel, full) = self.resolve(&file.path)?;
		self.prepare_file(&rel, &full).await?;
		let f = tokio::fs::OpenOptions::new()
			.write(true)
			.create(true)
			.truncate(false)
			.open(&full)
			.await
			.map_err(|e| SyncError::io_at(&rel, e))?;
		f.set_len(file.size).await?;
		f.sync_all().await?;
		drop(f);

		if let Some(expected) = &file.hash {
			let actual = hash_file(&full).await?;
			if actual != *expected {
				warn!("commit {}: hash mismatch", rel);
				return Err(SyncError::HashMismatch { path: rel, expected: expected.clone(), actual });
			}
		}
		set_times(full, &rel, file.a_time, file.m_time).await?;
		debug!("committed {} ({} bytes)", rel, file.size);
		Ok(())
	}

	/// Make sure a regular file may live at `full`: parents exist, no directory in the way
	async fn prepare_file(&self, rel: &str, full: &Path) -> SyncResult<()> {
		if let Ok(meta) = tokio::fs::symlink_metadata(full).await {
			if meta.is_dir() {
				debug!("{}: replacing directory with file", rel);
				tokio::fs::remove_dir_all(full).await.map_err(|e| SyncError::io_at(rel, e))?;
			}
		}
		if let Some(parent) = parent_path(rel) {
			let dir = local_path(&self.root, parent);
			tokio::fs::create_dir_all(&dir).await.map_err(|e| SyncError::io_at(parent, e))?;
		}
		Ok(())
	}

	/// Stat one entry, or list a subtree depth-first
	pub async fn query(&self, path: &str, recursive: bool) -> SyncResult<Vec<FileInfo>> {
		if !recursive {
			return Ok(vec![self.local.stat(path).await?]);
		}
		let mut entries = Vec::new();
		self.local
			.walk_dir(path, &mut |info: &FileInfo| {
				entries.push(info.clone());
				Ok(WalkControl::Continue)
			})
			.await?;
		Ok(entries)
	}

	pub async fn open(&self, path: &str) -> SyncResult<tokio::fs::File> {
		let (rel, full) = self.resolve(path)?;
		tokio::fs::File::open(&full).await.map_err(|e| SyncError::io_at(rel, e))
	}
}


// vim: ts=4
