/// End-to-end tests of the remote driver against a running sync server
use replicr::config::{ChunkConfig, ChunkStrategyKind, Config, RetryMode, ServerConfig, UserCredentials};
use replicr::contract::{
	ApiResponse, ApiType, ChunkVerdict, Code, CompareResult, FileInfo, ServerInfo, Status, SyncRequest,
	PROTOCOL_VERSION,
};
use replicr::driver::{Driver, RemoteDriver, WalkControl};
use replicr::error::{ErrorKind, SyncError};
use replicr::{Action, ChangeEvent, Orchestrator, SyncServer};
use std::fs;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

struct TestServer {
	addr: SocketAddr,
	shutdown: CancellationToken,
}

impl TestServer {
	async fn start(root: &Path, users: Vec<UserCredentials>) -> Self {
		let config = ServerConfig { addr: "127.0.0.1:0".to_string(), root: root.to_path_buf(), users };
		let server = SyncServer::new(&config);
		let listener = server.bind().await.unwrap();
		let addr = listener.local_addr().unwrap();
		let shutdown = CancellationToken::new();
		let token = shutdown.clone();
		tokio::spawn(async move {
			let _ = server.serve(listener, token).await;
		});
		TestServer { addr, shutdown }
	}

	fn url(&self) -> String {
		format!("http://{}/", self.addr)
	}
}

impl Drop for TestServer {
	fn drop(&mut self) {
		self.shutdown.cancel();
	}
}

fn small_chunks() -> ChunkConfig {
	ChunkConfig { strategy: ChunkStrategyKind::Fixed, chunk_size: 1024, chunk_bits: 13, threshold: 0 }
}

fn alice() -> Vec<UserCredentials> {
	vec![UserCredentials { username: "alice".to_string(), password: "wonderland".to_string() }]
}

async fn client(server: &TestServer, password: Option<&str>) -> RemoteDriver {
	let user = password.map(|_| "alice".to_string());
	RemoteDriver::new(&server.url(), user, password.map(str::to_string), small_chunks()).unwrap()
}

#[tokio::test]
async fn test_chunked_write_sends_only_changed_chunks() {
	let served = TempDir::new().unwrap();
	let local = TempDir::new().unwrap();
	let server = TestServer::start(served.path(), alice()).await;
	let driver = client(&server, Some("wonderland")).await;
	driver.connect().await.unwrap();

	let mut content: Vec<u8> = (0..10 * 1024).map(|i| (i % 251) as u8).collect();
	let src = local.path().join("data.bin");
	fs::write(&src, &content).unwrap();

	let report = driver.write(&src, "nested/data.bin").await.unwrap();
	assert_eq!(report.chunks_total, 10);
	assert_eq!(report.chunks_sent, 10);
	assert_eq!(fs::read(served.path().join("nested/data.bin")).unwrap(), content);

	// Touch one chunk in the middle
	content[5 * 1024 + 3] ^= 0xff;
	fs::write(&src, &content).unwrap();
	let report = driver.write(&src, "nested/data.bin").await.unwrap();
	assert_eq!(report.chunks_sent, 1);
	assert_eq!(report.bytes_sent, 1024);
	assert_eq!(fs::read(served.path().join("nested/data.bin")).unwrap(), content);

	// Identical content transfers nothing
	let report = driver.write(&src, "nested/data.bin").await.unwrap();
	assert_eq!(report.chunks_sent, 0);
}

#[tokio::test]
async fn test_shrinking_file_is_truncated() {
	let served = TempDir::new().unwrap();
	let local = TempDir::new().unwrap();
	let server = TestServer::start(served.path(), Vec::new()).await;
	let driver = client(&server, None).await;
	driver.connect().await.unwrap();

	let src = local.path().join("f");
	fs::write(&src, vec![b'a'; 4000]).unwrap();
	driver.write(&src, "f").await.unwrap();
	fs::write(&src, vec![b'a'; 1500]).unwrap();
	driver.write(&src, "f").await.unwrap();
	assert_eq!(fs::read(served.path().join("f")).unwrap(), vec![b'a'; 1500]);

	fs::write(&src, b"").unwrap();
	driver.write(&src, "f").await.unwrap();
	assert_eq!(fs::read(served.path().join("f")).unwrap().len(), 0);
}

#[tokio::test]
async fn test_metadata_operations() {
	let served = TempDir::new().unwrap();
	let server = TestServer::start(served.path(), Vec::new()).await;
	let driver = client(&server, None).await;
	driver.connect().await.unwrap();

	driver.mkdir_all("a/b").await.unwrap();
	driver.create("a/b/empty").await.unwrap();
	fs::write(served.path().join("a/readme"), b"read me").unwrap();
	driver.chtimes("a/readme", 1_100_000_000, 1_300_000_000).await.unwrap();

	let info = driver.stat("a/readme").await.unwrap();
	assert_eq!(info.size, 7);
	assert_eq!(info.m_time, 1_300_000_000);
	assert_eq!(driver.get_file_time("a/readme").await.unwrap().m_time, 1_300_000_000);
	assert!(driver.stat("a/b").await.unwrap().is_dir.is_dir());

	let mut seen = Vec::new();
	driver
		.walk_dir("", &mut |info: &FileInfo| {
			seen.push(info.path.clone());
			Ok(if info.path == "a/b" { WalkControl::SkipDir } else { WalkControl::Continue })
		})
		.await
		.unwrap();
	assert_eq!(seen, vec!["", "a", "a/b", "a/readme"]);

	let mut content = String::new();
	driver.open("a/readme").await.unwrap().read_to_string(&mut content).await.unwrap();
	assert_eq!(content, "read me");

	driver.rename("a/readme", "c/moved").await.unwrap();
	assert!(served.path().join("c/moved").is_file());
	driver.remove("a").await.unwrap();
	assert!(!served.path().join("a").exists());
	driver.remove("a").await.unwrap();

	assert_eq!(driver.stat("a").await.unwrap_err().kind(), ErrorKind::NotFound);
	assert_eq!(driver.open("missing").await.err().map(|e| e.kind()), Some(ErrorKind::NotFound));
}

#[tokio::test]
async fn test_server_rejects_escapes() {
	let served = TempDir::new().unwrap();
	let server = TestServer::start(served.path(), Vec::new()).await;
	let driver = client(&server, None).await;
	driver.connect().await.unwrap();

	let err = driver.create("../outside").await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Permission);
}

#[tokio::test]
async fn test_authentication() {
	let served = TempDir::new().unwrap();
	let server = TestServer::start(served.path(), alice()).await;

	let wrong = client(&server, Some("guess")).await;
	let err = wrong.connect().await.unwrap_err();
	assert!(matches!(err, SyncError::Unauthorized { .. }), "{}", err);
	assert!(!err.is_retryable());

	let anonymous = client(&server, None).await;
	assert!(matches!(anonymous.connect().await, Err(SyncError::Unauthorized { .. })));
	assert!(matches!(anonymous.mkdir_all("x").await, Err(SyncError::Unauthorized { .. })));
	assert!(!served.path().join("x").exists());
}

#[tokio::test]
async fn test_unreachable_server_is_retryable() {
	let driver = RemoteDriver::new("http://127.0.0.1:9/", None, None, small_chunks()).unwrap();
	let err = driver.connect().await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Connectivity);
	assert!(err.is_retryable());
}

#[tokio::test]
async fn test_orchestrator_over_remote_target() {
	let served = TempDir::new().unwrap();
	let src = TempDir::new().unwrap();
	let server = TestServer::start(served.path(), alice()).await;
	fs::create_dir(src.path().join("docs")).unwrap();
	fs::write(src.path().join("docs/a.txt"), vec![b'x'; 3000]).unwrap();

	let mut config = Config { source: src.path().to_path_buf(), ..Default::default() };
	config.retry.mode = RetryMode::Sync;
	config.retry.wait_ms = 10;
	let driver: Arc<dyn Driver> = Arc::new(client(&server, Some("wonderland")).await);
	let orch = Orchestrator::new(&config, vec![driver]);
	orch.connect().await.unwrap();

	for wd in orch.push_all().await.unwrap() {
		wd.wait_async().await.unwrap();
	}
	assert_eq!(fs::read(served.path().join("docs/a.txt")).unwrap(), vec![b'x'; 3000]);

	orch.dispatch(ChangeEvent::new("docs/a.txt", Action::Remove)).wait_async().await.unwrap();
	assert!(!served.path().join("docs/a.txt").exists());
	assert_eq!(orch.stats().failed, 0);
}

/// Server that marks every chunk modified, accepts the first chunk upload and
/// fails each one after it
async fn failing_chunk_server() -> (SocketAddr, Arc<AtomicUsize>) {
	let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	let uploads = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&uploads);
	tokio::spawn(async move {
		while let Ok((stream, _)) = listener.accept().await {
			let counter = Arc::clone(&counter);
			tokio::spawn(async move {
				let service = service_fn(move |req: Request<Incoming>| {
					let counter = Arc::clone(&counter);
					async move {
						let route = req.uri().path().to_string();
						let bytes = req.into_body().collect().await?.to_bytes();
						let body = failing_chunk_reply(&route, &bytes, &counter);
						Ok::<_, hyper::Error>(Response::new(Full::new(Bytes::from(body))))
					}
				});
				let _ = http1::Builder::new().serve_connection(TokioIo::new(stream), service).await;
			});
		}
	});
	(addr, uploads)
}

fn failing_chunk_reply(route: &str, bytes: &[u8], uploads: &AtomicUsize) -> Vec<u8> {
	if route == "/api/command" {
		let info = ServerInfo {
			version: PROTOCOL_VERSION.to_string(),
			root: "/".to_string(),
			auth_required: false,
		};
		return serde_json::to_vec(&ApiResponse::success(ApiType::Info, info)).unwrap();
	}
	match serde_json::from_slice::<SyncRequest>(bytes).unwrap() {
		SyncRequest::Compare { chunks, .. } => {
			let verdicts = chunks
				.iter()
				.map(|c| ChunkVerdict { offset: c.offset, code: Code::ChunkModified })
				.collect();
			let result = CompareResult { code: Code::Modified, chunks: verdicts };
			serde_json::to_vec(&ApiResponse::success(ApiType::SyncMessage, result)).unwrap()
		}
		SyncRequest::Chunk { .. } if uploads.fetch_add(1, Ordering::SeqCst) == 0 => {
			let ok = ApiResponse::<()>::with_code(Code::Success, ApiType::SyncMessage, None);
			serde_json::to_vec(&ok).unwrap()
		}
		_ => {
			let failed = ApiResponse::<()>::failure(Status::new(Code::ServerError, ApiType::SyncMessage));
			serde_json::to_vec(&failed).unwrap()
		}
	}
}

#[tokio::test]
async fn test_chunk_failure_after_progress_is_partial_write() {
	let local = TempDir::new().unwrap();
	let (addr, uploads) = failing_chunk_server().await;
	let chunk = ChunkConfig { strategy: ChunkStrategyKind::Fixed, chunk_size: 10, chunk_bits: 13, threshold: 0 };
	let driver = RemoteDriver::new(&format!("http://{}/", addr), None, None, chunk).unwrap();
	driver.connect().await.unwrap();

	let src = local.path().join("forty.bin");
	fs::write(&src, [7u8; 40]).unwrap();
	let err = driver.write(&src, "forty.bin").await.err().unwrap();
	assert_eq!(uploads.load(Ordering::SeqCst), 2);
	assert_eq!(err.kind(), ErrorKind::Integrity);
	match err {
		SyncError::PartialWrite { path, written, expected, cause } => {
			assert_eq!(path, "forty.bin");
			assert_eq!(written, 10);
			assert_eq!(expected, 40);
			let cause = cause.unwrap();
			assert!(matches!(*cause, SyncError::Remote { code: Code::ServerError, .. }), "{}", cause);
		}
		other => panic!("expected a partial write, got {}", other),
	}
}

// vim: ts=4
