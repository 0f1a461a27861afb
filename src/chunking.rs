//! Splitting files into hashed chunks
//!
//! Files above the configured threshold are cut into chunks, either at fixed
//! offsets or at content-defined boundaries found with the Bup rolling
//! checksum. Every chunk and every whole file is hashed with BLAKE3 and the
//! digest is rendered as lowercase hex.

use rollsum::Bup;
use std::path::Path;
use tokio::io::AsyncReadExt;

use crate::config::{ChunkConfig, ChunkStrategyKind};
use crate::contract::Chunk;
use crate::error::{SyncError, SyncResult};

/// Maximum chunk size factor for the rolling strategy (multiplied by 2^bits)
pub const MAX_CHUNK_SIZE_FACTOR: usize = 16;

/// How chunk boundaries are chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStrategy {
	Fixed { size: u64 },
	Rolling { bits: u32 },
}

impl ChunkStrategy {
	pub fn from_config(config: &ChunkConfig) -> Self {
		match config.strategy {
			ChunkStrategyKind::Fixed => ChunkStrategy::Fixed { size: config.chunk_size.max(1) },
			ChunkStrategyKind::Rolling => ChunkStrategy::Rolling { bits: config.chunk_bits },
		}
	}

	/// Largest chunk this strategy can produce
	pub fn max_chunk_size(&self) -> usize {
		match *self {
			ChunkStrategy::Fixed { size } => size as usize,
			ChunkStrategy::Rolling { bits } => (1usize << bits) * MAX_CHUNK_SIZE_FACTOR,
		}
	}

	/// Length of the next chunk at the start of `buf`.
	///
	/// `buf` holds at most `max_chunk_size` bytes; when shorter it is the file tail.
	fn next_cut(&self, buf: &[u8]) -> usize {
		match *self {
			ChunkStrategy::Fixed { size } => buf.len().min(size as usize),
			ChunkStrategy::Rolling { bits } => {
				let mut bup = Bup::new_with_chunk_bits(bits);
				match bup.find_chunk_edge(buf) {
					Some((edge, _)) if edge > 0 => edge,
					_ => buf.len(),
				}
			}
		}
	}
}

/// Whole-file hash plus its chunk list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChunks {
	pub hash: String,
	pub size: u64,
	pub chunks: Vec<Chunk>,
}

pub fn hash_bytes(data: &[u8]) -> String {
	blake3::hash(data).to_hex().to_string()
}

/// True when `data` is exactly the bytes `chunk` describes
pub fn verify_chunk(chunk: &Chunk, data: &[u8]) -> bool {
	data.len() as u64 == chunk.size && hash_bytes(data) == chunk.hash
}

/// Hash a whole file without loading it into memory
pub async fn hash_file(path: &Path) -> SyncResult<String> {
	let mut f = tokio::fs::File::open(path)
		.await
		.map_err(|e| SyncError::io_at(path.display().to_string(), e))?;
	let mut hasher = blake3::Hasher::new();
	let mut buf = vec![0u8; 64 * 1024];
	loop {
		let n = f.read(&mut buf).await?;
		if n == 0 {
			break;
		}
		hasher.update(&buf[..n]);
	}
	Ok(hasher.finalize().to_hex().to_string())
}

/// Split in-memory data the same way [`split_file`] splits a file
pub fn split_bytes(data: &[u8], config: &ChunkConfig) -> FileChunks {
	let size = data.len() as u64;
	let hash = hash_bytes(data);
	if data.is_empty() {
		return FileChunks { hash, size, chunks: Vec::new() };
	}
	if size <= config.threshold {
		let chunks = vec![Chunk { offset: 0, size, hash: hash.clone() }];
		return FileChunks { hash, size, chunks };
	}

	let strategy = ChunkStrategy::from_config(config);
	let max = strategy.max_chunk_size();
	let mut chunks = Vec::new();
	let mut pos = 0usize;
	while pos < data.len() {
		let end = (pos + max).min(data.len());
		let count = strategy.next_cut(&data[pos..end]);
		chunks.push(Chunk {
			offset: pos as u64,
			size: count as u64,
			hash: hash_bytes(&data[pos..pos + count]),
		});
		pos += count;
	}
	FileChunks { hash, size, chunks }
}

/// Describe a file as chunks.
///
/// Empty files have no chunks; files at or below the threshold have a single
/// chunk at offset 0 whose hash equals the whole-file hash.
pub async fn split_file(path: &Path, config: &ChunkConfig) -> SyncResult<FileChunks> {
	let display = path.display().to_string();
	let mut f = tokio::fs::File::open(path).await.map_err(|e| SyncError::io_at(&display, e))?;
	let size = f.metadata().await?.len();
	if size <= config.threshold {
		let mut data = Vec::with_capacity(size as usize);
		f.read_to_end(&mut data).await?;
		return Ok(split_bytes(&data, config));
	}

	let strategy = ChunkStrategy::from_config(config);
	let mut buf: Vec<u8> = vec![0; strategy.max_chunk_size()];
	let mut hasher = blake3::Hasher::new();
	let mut chunks = Vec::new();
	let mut offset: u64 = 0;
	let mut n = fill(&mut f, &mut buf).await?;
	while n > 0 {
		let count = strategy.next_cut(&buf[..n]);
		hasher.update(&buf[..count]);
		chunks.push(Chunk { offset, size: count as u64, hash: hash_bytes(&buf[..count]) });

		// Shift remaining data to front
		buf.copy_within(count..n, 0);
		offset += count as u64;
		n -= count;
		n += fill(&mut f, &mut buf[n..]).await?;
	}

	Ok(FileChunks { hash: hasher.finalize().to_hex().to_string(), size: offset, chunks })
}

/// Read until `buf` is full or EOF so boundaries never depend on read sizes
async fn fill(f: &mut tokio::fs::File, buf: &mut [u8]) -> SyncResult<usize> {
	let mut total = 0;
	while total < buf.len() {
		let n = f.read(&mut buf[total..]).await?;
		if n == 0 {
			break;
		}
		total += n;
	}
	Ok(total)
}


// vim: ts=4
