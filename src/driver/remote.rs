//! Driver for a replicr sync server over HTTP(S)
//!
//! Every operation is one JSON request against the server's `/api/*` routes.
//! `write` runs the chunked transfer: offer the file's chunk list, send only
//! the chunks the server reports as modified, then commit. The underlying
//! `reqwest::Client` pools connections and is safe to share between tasks.

use async_trait::async_trait;
use base64::Engine;
use futures::TryStreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::StreamReader;

use super::local::file_times;
use super::traits::{Driver, ReadStream, TransferReport, WalkVisitor};
use super::{clean_path, visit_listing};
use crate::action::Action;
use crate::chunking::split_file;
use crate::config::ChunkConfig;
use crate::contract::{
	ApiResponse, AuthToken, ChangeRecord, Code, CommandRequest, CompareResult, FileInfo, FileTimes,
	IsDir, OpenRequest, ServerInfo, SyncRequest,
};
use crate::error::{SyncError, SyncResult};
use crate::logging::*;

/// Per-request timeout
pub const REQUEST_TIMEOUT_SECS: u64 = 120;

pub struct RemoteDriver {
	client: reqwest::Client,
	base_url: String,
	username: Option<String>,
	password: Option<String>,
	token: RwLock<Option<String>>,
	chunk: ChunkConfig,
	name: String,
}

impl RemoteDriver {
	pub fn new(
		url: &str,
		username: Option<String>,
		password: Option<String>,
		chunk: ChunkConfig,
	) -> SyncResult<Self> {
		let client = reqwest::Client::builder()
			.timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
			.build()?;
		let base_url = url.trim_end_matches('/').to_string();
		let name = format!("remote:{}", base_url);
		Ok(RemoteDriver {
			client,
			base_url,
			username,
			password,
			token: RwLock::new(None),
			chunk,
			name,
		})
	}

	fn token(&self) -> Option<String> {
		self.token.read().unwrap_or_else(|e| e.into_inner()).clone()
	}

	fn set_token(&self, token: Option<String>) {
		*self.token.write().unwrap_or_else(|e| e.into_inner()) = token;
	}

	fn request(&self, route: &str) -> reqwest::RequestBuilder {
		let builder = self.client.post(format!("{}{}", self.base_url, route));
		match self.token() {
			Some(token) => builder.bearer_auth(token),
			None => builder,
		}
	}

	async fn post<B, T>(&self, route: &str, body: &B) -> SyncResult<ApiResponse<T>>
	where
		B: Serialize + Sync,
		T: DeserializeOwned,
	{
		let resp = self.request(route).json(body).send().await?;
		Ok(resp.json::<ApiResponse<T>>().await?)
	}

	async fn authenticate(&self) -> SyncResult<()> {
		let (user, pass) = match (&self.username, &self.password) {
			(Some(u), Some(p)) => (u, p),
			_ => {
				return Err(SyncError::Unauthorized {
					message: format!("{} requires credentials", self.base_url),
				})
			}
		};
		let resp: ApiResponse<AuthToken> =
			self.post("/api/command", &CommandRequest::auth(user, pass)).await?;
		match resp.into_result("")? {
			Some(t) => {
				self.set_token(Some(t.token));
				debug!("{}: authenticated as {}", self.name, user);
				Ok(())
			}
			None => Err(SyncError::Protocol { message: "auth reply without token".to_string() }),
		}
	}

	/// Send a sync request, re-authenticating once if the token was rejected
	async fn sync<T: DeserializeOwned>(&self, req: &SyncRequest) -> SyncResult<Option<T>> {
		let resp: ApiResponse<T> = self.post("/api/sync", req).await?;
		if resp.status.code == Code::Unauthorized && self.username.is_some() {
			debug!("{}: token rejected, re-authenticating", self.name);
			self.authenticate().await?;
			let resp: ApiResponse<T> = self.post("/api/sync", req).await?;
			return resp.into_result(req.path());
		}
		resp.into_result(req.path())
	}

	async fn change(&self, record: ChangeRecord) -> SyncResult<()> {
		self.sync::<serde_json::Value>(&SyncRequest::Change(record)).await?;
		Ok(())
	}

	async fn query(&self, path: &str, recursive: bool) -> SyncResult<Vec<FileInfo>> {
		let req = SyncRequest::Query { path: path.to_string(), recursive };
		Ok(self.sync::<Vec<FileInfo>>(&req).await?.unwrap_or_default())
	}
}

fn marker(path: &str, is_dir: IsDir) -> FileInfo {
	FileInfo { path: path.to_string(), is_dir, ..Default::default() }
}

#[async_trait]
impl Driver for RemoteDriver {
	fn name(&self) -> &str {
		&self.name
	}

	async fn connect(&self) -> SyncResult<()> {
		let resp: ApiResponse<ServerInfo> =
			self.post("/api/command", &CommandRequest::info()).await.map_err(|e| match e {
				SyncError::ConnectionFailed { source, .. } => {
					SyncError::ConnectionFailed { location: self.base_url.clone(), source }
				}
				other => other,
			})?;
		let info = resp
			.into_result("")?
			.ok_or_else(|| SyncError::Protocol { message: "info reply without data".to_string() })?;
		debug!("{}: server version {} serving {}", self.name, info.version, info.root);
		if info.auth_required && self.token().is_none() {
			self.authenticate().await?;
		}
		Ok(())
	}

	async fn mkdir_all(&self, path: &str) -> SyncResult<()> {
		let rel = clean_path(path)?;
		self.change(ChangeRecord::new(Action::Create, &rel).with_file(marker(&rel, IsDir::Dir)))
			.await
	}

	async fn create(&self, path: &str) -> SyncResult<()> {
		let rel = clean_path(path)?;
		self.change(ChangeRecord::new(Action::Create, &rel).with_file(marker(&rel, IsDir::NotDir)))
			.await
	}

	async fn remove(&self, path: &str) -> SyncResult<()> {
		let rel = clean_path(path)?;
		self.change(ChangeRecord::new(Action::Remove, rel)).await
	}

	async fn rename(&self, old_path: &str, new_path: &str) -> SyncResult<()> {
		let old = clean_path(old_path)?;
		let new = clean_path(new_path)?;
		self.change(ChangeRecord::new(Action::Rename, old).with_new_path(new)).await
	}

	async fn chtimes(&self, path: &str, a_time: i64, m_time: i64) -> SyncResult<()> {
		let rel = clean_path(path)?;
		let mut file = marker(&rel, IsDir::Unknown);
		file.set_times(FileTimes { c_time: m_time, a_time, m_time });
		self.change(ChangeRecord::new(Action::Chmod, &rel).with_file(file)).await
	}

	async fn walk_dir(&self, root: &str, visit: &mut WalkVisitor<'_>) -> SyncResult<()> {
		let rel = clean_path(root)?;
		let entries = self.query(&rel, true).await?;
		visit_listing(&entries, visit)
	}

	async fn open(&self, path: &str) -> SyncResult<ReadStream> {
		let rel = clean_path(path)?;
		let resp = self.request("/api/open").json(&OpenRequest { path: rel.clone() }).send().await?;
		if !resp.status().is_success() {
			let body: ApiResponse<()> = resp.json().await?;
			return Err(body.status.into_error(&rel));
		}
		let stream = resp.bytes_stream().map_err(std::io::Error::other);
		Ok(Box::new(Box::pin(StreamReader::new(stream))))
	}

	async fn stat(&self, path: &str) -> SyncResult<FileInfo> {
		let rel = clean_path(path)?;
		self.query(&rel, false).await?.into_iter().next().ok_or(SyncError::NotFound { path: rel })
	}

	async fn get_file_time(&self, path: &str) -> SyncResult<FileTimes> {
		Ok(self.stat(path).await?.times())
	}

	async fn write(&self, src: &Path, dest: &str) -> SyncResult<TransferReport> {
		let rel = clean_path(dest)?;
		let meta = tokio::fs::metadata(src)
			.await
			.map_err(|e| SyncError::io_at(src.display().to_string(), e))?;
		let split = split_file(src, &self.chunk).await?;
		let total = split.chunks.len();

		let mut file = FileInfo {
			path: rel.clone(),
			is_dir: IsDir::NotDir,
			size: split.size,
			hash: Some(split.hash.clone()),
			..Default::default()
		};
		file.set_times(file_times(&meta));

		let compare = SyncRequest::Compare { file: file.clone(), chunks: split.chunks.clone() };
		let verdict: CompareResult = self
			.sync(&compare)
			.await?
			.ok_or_else(|| SyncError::Protocol { message: "compare reply without data".to_string() })?;
		if verdict.code == Code::NotModified {
			debug!("{}: {} unchanged", self.name, rel);
			return Ok(TransferReport::unchanged(total));
		}

		let wanted = verdict.modified_offsets();
		let mut f = tokio::fs::File::open(src)
			.await
			.map_err(|e| SyncError::io_at(src.display().to_string(), e))?;
		let mut report = TransferReport { bytes_sent: 0, chunks_sent: 0, chunks_total: total };
		for chunk in split.chunks.iter().filter(|c| wanted.contains(&c.offset)) {
			let mut data = vec![0u8; chunk.size as usize];
			f.seek(std::io::SeekFrom::Start(chunk.offset)).await?;
			if let Err(e) = f.read_exact(&mut data).await {
				if e.kind() == std::io::ErrorKind::UnexpectedEof {
					return Err(SyncError::PartialWrite {
						path: rel,
						written: report.bytes_sent,
						expected: split.size,
						cause: Some(Box::new(e.into())),
					});
				}
				return Err(e.into());
			}
			let req = SyncRequest::Chunk {
				path: rel.clone(),
				chunk: chunk.clone(),
				data: base64::engine::general_purpose::STANDARD.encode(&data),
			};
			if let Err(e) = self.sync::<serde_json::Value>(&req).await {
				if report.chunks_sent == 0 {
					return Err(e);
				}
				warn!("{}: {} interrupted after {} chunks: {}", self.name, rel, report.chunks_sent, e);
				return Err(SyncError::PartialWrite {
					path: rel,
					written: report.bytes_sent,
					expected: split.size,
					cause: Some(Box::new(e)),
				});
			}
			report.bytes_sent += chunk.size;
			report.chunks_sent += 1;
		}

		self.sync::<serde_json::Value>(&SyncRequest::Commit { file }).await?;
		debug!(
			"{}: wrote {} ({}/{} chunks, {} bytes)",
			self.name, rel, report.chunks_sent, report.chunks_total, report.bytes_sent
		);
		Ok(report)
	}
}

// vim: ts=4
