/// Integration tests for configuration loading from TOML and JSON5 files
use replicr::config::{ChunkStrategyKind, Config, RetryMode, TargetConfig};
use replicr::error::ErrorKind;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const TOML_CONFIG: &str = r#"
source = "/data/src"
logLevel = "debug"

[[targets]]
type = "local"
path = "/mnt/backup"

[[targets]]
type = "remote"
url = "https://sync.example.com"
username = "alice"
password = "secret"

[[targets]]
type = "s3"
bucket = "mirror"
region = "eu-west-1"
accessKey = "AK"
secretKey = "SK"
root = "replicas"

[retry]
count = 5
waitMs = 250
mode = "sync"
surfaceExhaustion = false

[chunk]
strategy = "rolling"
chunkBits = 16
"#;

#[test]
fn test_load_toml() {
	let temp_dir = TempDir::new().expect("Failed to create temp dir");
	let path = temp_dir.path().join("replicr.toml");
	fs::write(&path, TOML_CONFIG).unwrap();

	let config = Config::load(&path).expect("Config should load");
	assert_eq!(config.source, PathBuf::from("/data/src"));
	assert_eq!(config.log_level, "debug");
	assert_eq!(config.targets.len(), 3);
	assert_eq!(config.targets[0], TargetConfig::Local { path: PathBuf::from("/mnt/backup") });
	assert!(matches!(
		&config.targets[1],
		TargetConfig::Remote { username: Some(u), .. } if u == "alice"
	));
	assert!(matches!(
		&config.targets[2],
		TargetConfig::S3 { access_key: Some(k), endpoint: None, .. } if k == "AK"
	));

	assert_eq!(config.retry.count, 5);
	assert_eq!(config.retry.wait_ms, 250);
	assert_eq!(config.retry.mode, RetryMode::Sync);
	assert!(!config.retry.surface_exhaustion);

	assert_eq!(config.chunk.strategy, ChunkStrategyKind::Rolling);
	assert_eq!(config.chunk.chunk_bits, 16);
	// Unspecified fields keep their defaults
	assert_eq!(config.chunk.threshold, 1 << 20);
	assert_eq!(config.server.addr, "127.0.0.1:8787");
}

#[test]
fn test_load_json5() {
	let temp_dir = TempDir::new().expect("Failed to create temp dir");
	let path = temp_dir.path().join("replicr.json5");
	let content = r#"{
		// JSON5 allows comments and trailing commas
		source: "./src",
		targets: [
			{ type: "sftp", endpoint: "ssh://backup:22", user: "sync", key: "/home/sync/.ssh/id_ed25519", root: "/srv/mirror" },
		],
		server: {
			addr: "0.0.0.0:9000",
			users: [{ username: "bob", password: "hunter2" }],
		},
	}"#;
	fs::write(&path, content).unwrap();

	let config = Config::load(&path).expect("Config should load");
	assert!(matches!(
		&config.targets[0],
		TargetConfig::Sftp { user, key: Some(_), .. } if user == "sync"
	));
	assert_eq!(config.server.addr, "0.0.0.0:9000");
	assert!(config.server.auth_required());
	assert_eq!(config.retry.count, 3);
	assert_eq!(config.retry.mode, RetryMode::Async);
}

#[test]
fn test_empty_file_is_default() {
	let temp_dir = TempDir::new().unwrap();
	let path = temp_dir.path().join("empty.toml");
	fs::write(&path, "").unwrap();

	let config = Config::load(&path).unwrap();
	assert!(config.targets.is_empty());
	assert_eq!(config.retry.count, 3);
}

#[test]
fn test_missing_file() {
	let temp_dir = TempDir::new().unwrap();
	let err = Config::load(&temp_dir.path().join("nope.toml")).unwrap_err();
	assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_malformed_file() {
	let temp_dir = TempDir::new().unwrap();
	let path = temp_dir.path().join("bad.toml");
	fs::write(&path, "retry = [unterminated").unwrap();
	let err = Config::load(&path).unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn test_unknown_target_type() {
	let temp_dir = TempDir::new().unwrap();
	let path = temp_dir.path().join("ftp.toml");
	fs::write(&path, "[[targets]]\ntype = \"ftp\"\nurl = \"ftp://x\"\n").unwrap();
	assert!(Config::load(&path).is_err());
}

#[test]
fn test_validation_runs_on_load() {
	let temp_dir = TempDir::new().unwrap();
	let path = temp_dir.path().join("bits.toml");
	fs::write(&path, "[chunk]\nstrategy = \"rolling\"\nchunkBits = 40\n").unwrap();
	let err = Config::load(&path).unwrap_err();
	assert!(err.to_string().contains("chunkBits"));

	let path = temp_dir.path().join("user.toml");
	fs::write(&path, "[[targets]]\ntype = \"remote\"\nurl = \"http://h\"\nusername = \"u\"\n").unwrap();
	let err = Config::load(&path).unwrap_err();
	assert!(err.to_string().contains("targets[0]"));
}

// vim: ts=4
