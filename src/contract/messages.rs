//! Request and reply bodies of the sync message API

use serde::{Deserialize, Serialize};

use super::status::Code;
use super::types::{ChangeRecord, Chunk, FileInfo};

/// Body of `POST /api/sync`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncRequest {
	/// Metadata-only change: create, remove, rename, chmod
	Change(ChangeRecord),

	/// Offer a file's metadata and chunk list; the server answers with verdicts
	Compare { file: FileInfo, chunks: Vec<Chunk> },

	/// Chunk payload, base64 encoded
	Chunk { path: String, chunk: Chunk, data: String },

	/// All required chunks sent; finalize size, hash and times
	Commit { file: FileInfo },

	/// Stat (`recursive == false`) or depth-first listing
	Query { path: String, recursive: bool },
}

impl SyncRequest {
	/// Path the request is about, for error reporting
	pub fn path(&self) -> &str {
		match self {
			SyncRequest::Change(rec) => &rec.path,
			SyncRequest::Compare { file, .. } | SyncRequest::Commit { file } => &file.path,
			SyncRequest::Chunk { path, .. } | SyncRequest::Query { path, .. } => path,
		}
	}
}

/// Server verdict for one offered chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkVerdict {
	pub offset: u64,
	/// `ChunkModified` or `ChunkNotModified`
	pub code: Code,
}

/// Reply to `SyncRequest::Compare`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareResult {
	/// `Modified` or `NotModified` for the whole file
	pub code: Code,
	pub chunks: Vec<ChunkVerdict>,
}

impl CompareResult {
	/// Offsets the client still has to send
	pub fn modified_offsets(&self) -> Vec<u64> {
		if self.code == Code::NotModified {
			return Vec::new();
		}
		self.chunks.iter().filter(|v| v.code == Code::ChunkModified).map(|v| v.offset).collect()
	}
}

/// Body of `POST /api/open`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenRequest {
	pub path: String,
}


// vim: ts=4
