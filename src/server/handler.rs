//! HTTP request routing for the sync server
//!
//! Every route takes a JSON body via POST. Outcomes travel in the response's
//! `Status.code` with HTTP 200; only `/api/open` uses HTTP status codes, since
//! its success body is raw file content.

use futures::TryStreamExt;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Bytes, Frame, Incoming};
use hyper::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use super::ServerState;
use crate::contract::{
	ApiResponse, ApiType, AuthToken, Code, Command, CommandRequest, OpenRequest, ServerInfo, Status,
	SyncRequest, PROTOCOL_VERSION,
};
use crate::error::{SyncError, SyncResult};
use crate::logging::*;

pub type Body = BoxBody<Bytes, std::io::Error>;

fn full(bytes: impl Into<Bytes>) -> Body {
	Full::new(bytes.into()).map_err(|never| match never {}).boxed()
}

fn json<T: Serialize>(http: StatusCode, body: &ApiResponse<T>) -> Response<Body> {
	let (http, bytes) = match serde_json::to_vec(body) {
		Ok(bytes) => (http, bytes),
		Err(e) => {
			error!("Failed to encode response: {}", e);
			(StatusCode::INTERNAL_SERVER_ERROR, Vec::new())
		}
	};
	let mut resp = Response::new(full(bytes));
	*resp.status_mut() = http;
	resp.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
	resp
}

fn failure(err: &SyncError, api_type: ApiType) -> ApiResponse<()> {
	ApiResponse::failure(Status::with_detail(err.code(), api_type, err))
}

/// Reply to a sync request: Success with optional data, or the error's code
fn reply<T: Serialize>(result: SyncResult<Option<T>>) -> Response<Body> {
	match result {
		Ok(data) => json(StatusCode::OK, &ApiResponse::with_code(Code::Success, ApiType::SyncMessage, data)),
		Err(e) => {
			debug!("sync request failed: {}", e);
			json(StatusCode::OK, &failure(&e, ApiType::SyncMessage))
		}
	}
}

fn parse<T: DeserializeOwned>(bytes: &Bytes) -> SyncResult<T> {
	Ok(serde_json::from_slice(bytes)?)
}

fn bearer(req: &Request<Incoming>) -> Option<String> {
	let value = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
	value.strip_prefix("Bearer ").map(|t| t.trim().to_string())
}

/// Route one request
pub async fn handle(req: Request<Incoming>, state: Arc<ServerState>) -> Result<Response<Body>, hyper::Error> {
	let route = req.uri().path().to_string();
	if req.method() != Method::POST {
		let err = SyncError::Protocol { message: format!("{} {} not allowed", req.method(), route) };
		return Ok(json(StatusCode::METHOD_NOT_ALLOWED, &failure(&err, ApiType::Unknown)));
	}
	let token = bearer(&req);
	let bytes = req.into_body().collect().await?.to_bytes();

	let resp = match route.as_str() {
		"/api/command" => command(&state, &bytes),
		"/api/sync" | "/api/open" if !state.authorized(token.as_deref()) => {
			let err = SyncError::Unauthorized { message: "missing or unknown token".to_string() };
			let http =
				if route == "/api/open" { StatusCode::UNAUTHORIZED } else { StatusCode::OK };
			json(http, &failure(&err, ApiType::SyncMessage))
		}
		"/api/sync" => sync(&state, &bytes).await,
		"/api/open" => open(&state, &bytes).await,
		_ => {
			let err = SyncError::NotFound { path: route.clone() };
			json(StatusCode::NOT_FOUND, &failure(&err, ApiType::Unknown))
		}
	};
	Ok(resp)
}

fn command(state: &ServerState, bytes: &Bytes) -> Response<Body> {
	let req: CommandRequest = match parse(bytes) {
		Ok(req) => req,
		Err(e) => return json(StatusCode::OK, &failure(&e, ApiType::Info)),
	};
	match req.command {
		Command::Info => {
			let info = ServerInfo {
				version: PROTOCOL_VERSION.to_string(),
				root: state.files.root().display().to_string(),
				auth_required: state.auth_required(),
			};
			json(StatusCode::OK, &ApiResponse::success(ApiType::Info, info))
		}
		Command::Auth => {
			let user = req.username.as_deref().unwrap_or("");
			match state.login(user, req.password.as_deref().unwrap_or("")) {
				Some(token) => {
					info!("User {} authenticated", user);
					json(StatusCode::OK, &ApiResponse::success(ApiType::Info, AuthToken { token }))
				}
				None => {
					warn!("Rejected login for {}", user);
					let err = SyncError::Unauthorized { message: "bad credentials".to_string() };
					json(StatusCode::OK, &failure(&err, ApiType::Info))
				}
			}
		}
		Command::Unknown => {
			let err = SyncError::Protocol { message: "unknown command".to_string() };
			json(StatusCode::OK, &failure(&err, ApiType::Info))
		}
	}
}

async fn sync(state: &ServerState, bytes: &Bytes) -> Response<Body> {
	let req: SyncRequest = match parse(bytes) {
		Ok(req) => req,
		Err(e) => return json(StatusCode::OK, &failure(&e, ApiType::SyncMessage)),
	};
	let files = &state.files;
	match req {
		SyncRequest::Change(record) => reply::<()>(files.apply_change(&record).await.map(|_| None)),
		SyncRequest::Compare { file, chunks } => match files.compare(&file, &chunks).await {
			Ok(result) => {
				json(StatusCode::OK, &ApiResponse::with_code(result.code, ApiType::SyncMessage, Some(result)))
			}
			Err(e) => json(StatusCode::OK, &failure(&e, ApiType::SyncMessage)),
		},
		SyncRequest::Chunk { path, chunk, data } => {
			reply::<()>(files.apply_chunk(&path, &chunk, &data).await.map(|_| None))
		}
		SyncRequest::Commit { file } => reply::<()>(files.commit(&file).await.map(|_| None)),
		SyncRequest::Query { path, recursive } => reply(files.query(&path, recursive).await.map(Some)),
	}
}

async fn open(state: &ServerState, bytes: &Bytes) -> Response<Body> {
	let opened = match parse::<OpenRequest>(bytes) {
		Ok(req) => state.files.open(&req.path).await,
		Err(e) => Err(e),
	};
	match opened {
		Ok(f) => {
			let stream = ReaderStream::new(f).map_ok(Frame::data);
			let mut resp = Response::new(StreamBody::new(stream).boxed());
			resp.headers_mut()
				.insert(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
			resp
		}
		Err(e) => {
			let http = match e.code() {
				Code::NotFound => StatusCode::NOT_FOUND,
				Code::AccessDenied | Code::NoPermission => StatusCode::FORBIDDEN,
				Code::Fail => StatusCode::BAD_REQUEST,
				_ => StatusCode::INTERNAL_SERVER_ERROR,
			};
			json(http, &failure(&e, ApiType::SyncMessage))
		}
	}
}

// vim: ts=4
