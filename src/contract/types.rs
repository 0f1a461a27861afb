//! Value types describing files and chunks on the wire

use serde::{Deserialize, Serialize};

use crate::action::Action;

/// Directory flag that can also say "don't know"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "i8", into = "i8")]
pub enum IsDir {
	#[default]
	Unknown,
	Dir,
	NotDir,
}

impl IsDir {
	pub fn from_bool(is_dir: bool) -> Self {
		if is_dir {
			IsDir::Dir
		} else {
			IsDir::NotDir
		}
	}

	pub fn is_dir(self) -> bool {
		self == IsDir::Dir
	}

	pub fn is_file(self) -> bool {
		self == IsDir::NotDir
	}
}

impl From<i8> for IsDir {
	fn from(raw: i8) -> Self {
		match raw {
			1 => IsDir::Dir,
			2 => IsDir::NotDir,
			_ => IsDir::Unknown,
		}
	}
}

impl From<IsDir> for i8 {
	fn from(v: IsDir) -> Self {
		match v {
			IsDir::Unknown => 0,
			IsDir::Dir => 1,
			IsDir::NotDir => 2,
		}
	}
}

/// Creation, access and modification times in unix seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileTimes {
	pub c_time: i64,
	pub a_time: i64,
	pub m_time: i64,
}

/// File metadata as reported by a driver
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
	/// Slash separated path relative to the backend root
	pub path: String,
	pub is_dir: IsDir,
	pub size: u64,
	/// Content hash, only meaningful for files
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub hash: Option<String>,
	pub c_time: i64,
	pub a_time: i64,
	pub m_time: i64,
}

impl FileInfo {
	pub fn times(&self) -> FileTimes {
		FileTimes { c_time: self.c_time, a_time: self.a_time, m_time: self.m_time }
	}

	pub fn set_times(&mut self, times: FileTimes) {
		self.c_time = times.c_time;
		self.a_time = times.a_time;
		self.m_time = times.m_time;
	}

	/// Last path component, empty for the root
	pub fn name(&self) -> &str {
		self.path.rsplit('/').next().unwrap_or("")
	}
}

/// Byte range of a file with the hash of exactly those bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
	pub offset: u64,
	pub size: u64,
	pub hash: String,
}

impl Chunk {
	pub fn end(&self) -> u64 {
		self.offset + self.size
	}
}

/// A change replayed against a remote backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
	pub action: Action,
	pub path: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub new_path: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub file: Option<FileInfo>,
}

impl ChangeRecord {
	pub fn new(action: Action, path: impl Into<String>) -> Self {
		Self { action, path: path.into(), new_path: None, file: None }
	}

	pub fn with_file(mut self, file: FileInfo) -> Self {
		self.file = Some(file);
		self
	}

	pub fn with_new_path(mut self, new_path: impl Into<String>) -> Self {
		self.new_path = Some(new_path.into());
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_is_dir_tristate_wire() {
		assert_eq!(serde_json::to_string(&IsDir::Unknown).unwrap(), "0");
		assert_eq!(serde_json::to_string(&IsDir::Dir).unwrap(), "1");
		let v: IsDir = serde_json::from_str("2").unwrap();
		assert!(v.is_file());
	}

	#[test]
	fn test_file_info_camel_case() {
		let info = FileInfo {
			path: "a/b.txt".to_string(),
			is_dir: IsDir::NotDir,
			size: 3,
			hash: None,
			c_time: 1,
			a_time: 2,
			m_time: 3,
		};
		let json = serde_json::to_value(&info).unwrap();
		assert_eq!(json["isDir"], 2);
		assert_eq!(json["mTime"], 3);
		assert!(json.get("hash").is_none());
		assert_eq!(info.name(), "b.txt");
	}

	#[test]
	fn test_change_record_builder() {
		let rec = ChangeRecord::new(Action::Rename, "old").with_new_path("new");
		let json = serde_json::to_value(&rec).unwrap();
		assert_eq!(json["action"], 4);
		assert_eq!(json["newPath"], "new");
	}
}

// vim: ts=4
