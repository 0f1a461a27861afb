//! Remote sync server
//!
//! Serves a directory tree to [`RemoteDriver`](crate::driver::RemoteDriver)
//! clients over HTTP/1.1. Authentication is only required when users are
//! configured; a successful login yields a random bearer token valid for the
//! lifetime of the process.

pub mod file_operations;
pub mod handler;

pub use file_operations::FileOperations;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::{ServerConfig, UserCredentials};
use crate::error::{SyncError, SyncResult};
use crate::logging::*;

/// State shared by every connection
pub struct ServerState {
	pub files: FileOperations,
	users: Vec<UserCredentials>,
	tokens: Mutex<HashSet<String>>,
}

impl ServerState {
	pub fn auth_required(&self) -> bool {
		!self.users.is_empty()
	}

	/// Issue a token for valid credentials
	pub fn login(&self, username: &str, password: &str) -> Option<String> {
		if !self.users.iter().any(|u| u.username == username && u.password == password) {
			return None;
		}
		let token = uuid::Uuid::new_v4().to_string();
		self.tokens.lock().unwrap_or_else(|e| e.into_inner()).insert(token.clone());
		Some(token)
	}

	pub fn authorized(&self, token: Option<&str>) -> bool {
		if !self.auth_required() {
			return true;
		}
		match token {
			Some(t) => self.tokens.lock().unwrap_or_else(|e| e.into_inner()).contains(t),
			None => false,
		}
	}
}

pub struct SyncServer {
	state: Arc<ServerState>,
	addr: String,
}

impl SyncServer {
	pub fn new(config: &ServerConfig) -> Self {
		let state = ServerState {
			files: FileOperations::new(config.root.clone()),
			users: config.users.clone(),
			tokens: Mutex::new(HashSet::new()),
		};
		SyncServer { state: Arc::new(state), addr: config.addr.clone() }
	}

	/// Bind the configured address
	pub async fn bind(&self) -> SyncResult<TcpListener> {
		let addr: SocketAddr = self.addr.parse().map_err(|_| SyncError::InvalidConfig {
			message: format!("invalid listen address {}", self.addr),
		})?;
		Ok(TcpListener::bind(addr).await?)
	}

	/// Bind and serve until `shutdown` fires
	pub async fn run(&self, shutdown: CancellationToken) -> SyncResult<()> {
		let listener = self.bind().await?;
		self.serve(listener, shutdown).await
	}

	/// Serve connections from an already bound listener until `shutdown` fires
	pub async fn serve(&self, listener: TcpListener, shutdown: CancellationToken) -> SyncResult<()> {
		let local = listener.local_addr()?;
		info!(
			"Sync server listening on {} serving {}",
			local,
			self.state.files.root().display()
		);

		loop {
			tokio::select! {
				result = listener.accept() => {
					let (stream, peer) = result?;
					let io = TokioIo::new(stream);
					let state = Arc::clone(&self.state);

					tokio::spawn(async move {
						let service = service_fn(move |req| {
							let state = Arc::clone(&state);
							handler::handle(req, state)
						});

						if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
							debug!("Connection from {} ended: {}", peer, e);
						}
					});
				}
				_ = shutdown.cancelled() => {
					info!("Sync server shutting down");
					break;
				}
			}
		}
		Ok(())
	}
}


// vim: ts=4
