//! Wire contract shared by the remote driver and the sync server
//!
//! All messages travel as JSON over HTTP. Enumerations that carry meaning
//! across the wire (`Action`, `Code`, `ApiType`, `Command`, `IsDir`) are
//! encoded as integers so both sides agree on a fixed vocabulary.
//!
//! # Example
//!
//! ```ignore
//! use replicr::contract::{ApiResponse, Code, ServerInfo};
//!
//! let resp: ApiResponse<ServerInfo> = client.post(url).json(&req).send().await?.json().await?;
//! if resp.status.code != Code::Success {
//!     return Err(resp.status.into_error(""));
//! }
//! ```

pub mod command;
pub mod messages;
pub mod status;
pub mod types;

pub use command::{AuthToken, Command, CommandRequest, ServerInfo};
pub use messages::{ChunkVerdict, CompareResult, OpenRequest, SyncRequest};
pub use status::{ApiResponse, ApiType, Code, Status};
pub use types::{ChangeRecord, Chunk, FileInfo, FileTimes, IsDir};

/// Protocol version announced by `Command::Info`
pub const PROTOCOL_VERSION: &str = "1";

// vim: ts=4
