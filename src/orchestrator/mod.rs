//! Sync orchestrator
//!
//! Maps change events observed in the source tree onto driver calls for every
//! configured target. Each (event, target) pair runs on its own task under the
//! retry policy; events touching the same path are applied to a target in
//! dispatch order.
//!
//! # Example Usage
//!
//! ```ignore
//! use replicr::orchestrator::{ChangeEvent, Orchestrator};
//! use replicr::Action;
//!
//! let orch = Orchestrator::from_config(&config)?;
//! orch.connect().await?;
//! orch.dispatch(ChangeEvent::new("docs/a.txt", Action::Write)).wait_async().await?;
//! ```

pub mod event;
pub mod sequencer;

pub use event::{ChangeEvent, EventState};
pub use sequencer::PathSequencer;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use self::event::Classified;
use crate::action::Action;
use crate::cache::HashCache;
use crate::chunking::hash_file;
use crate::config::Config;
use crate::contract::FileInfo;
use crate::driver::local::file_times;
use crate::driver::{create_driver, local_path, Driver, LocalDriver, WalkControl};
use crate::error::{SyncError, SyncResult};
use crate::logging::*;
use crate::retry::Retry;
use crate::wait::{wait_all, WaitDone};

/// Outcome counters, one count per (event, target) pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
	pub succeeded: usize,
	pub failed: usize,
	pub cancelled: usize,
	/// Unchanged content, vanished sources and ignored events
	pub skipped: usize,
}

#[derive(Default)]
struct Counters {
	succeeded: AtomicUsize,
	failed: AtomicUsize,
	cancelled: AtomicUsize,
	skipped: AtomicUsize,
}

impl Counters {
	fn snapshot(&self) -> SyncStats {
		SyncStats {
			succeeded: self.succeeded.load(Ordering::Relaxed),
			failed: self.failed.load(Ordering::Relaxed),
			cancelled: self.cancelled.load(Ordering::Relaxed),
			skipped: self.skipped.load(Ordering::Relaxed),
		}
	}
}

pub struct Orchestrator {
	source: LocalDriver,
	targets: Vec<Arc<dyn Driver>>,
	retry: Retry,
	cache: Arc<HashCache>,
	sequencer: Arc<PathSequencer>,
	counters: Arc<Counters>,
	token: CancellationToken,
}

impl Orchestrator {
	pub fn new(config: &Config, targets: Vec<Arc<dyn Driver>>) -> Self {
		Orchestrator {
			source: LocalDriver::new(config.source.clone()),
			targets,
			retry: Retry::from_config(&config.retry),
			cache: Arc::new(HashCache::new()),
			sequencer: Arc::new(PathSequencer::new()),
			counters: Arc::new(Counters::default()),
			token: CancellationToken::new(),
		}
	}

	/// Build one driver per configured target
	pub fn from_config(config: &Config) -> SyncResult<Self> {
		let targets =
			config.targets.iter().map(|t| create_driver(t, &config.chunk)).collect::<SyncResult<Vec<_>>>()?;
		Ok(Self::new(config, targets))
	}

	pub fn source(&self) -> &Path {
		self.source.root()
	}

	pub fn targets(&self) -> &[Arc<dyn Driver>] {
		&self.targets
	}

	pub fn cache(&self) -> &HashCache {
		&self.cache
	}

	pub fn stats(&self) -> SyncStats {
		self.counters.snapshot()
	}

	/// Token whose cancellation stops every queued and retrying event
	pub fn token(&self) -> CancellationToken {
		self.token.clone()
	}

	/// Check that every target is reachable
	pub async fn connect(&self) -> SyncResult<()> {
		for driver in &self.targets {
			info!("Connecting to {}", driver.name());
			driver.connect().await?;
		}
		Ok(())
	}

	/// Queue `event` for every target.
	///
	/// The returned latch completes when all targets have reached a terminal
	/// state and carries the first error among them. Must be called from
	/// within a tokio runtime.
	pub fn dispatch(&self, event: ChangeEvent) -> WaitDone {
		debug!("{}: {}", event, EventState::Received);
		let classified = match event.classify() {
			Ok(c) => c,
			Err(e) => {
				warn!("Rejected event {}: {}", event, e);
				self.counters.failed.fetch_add(1, Ordering::Relaxed);
				return WaitDone::completed(Err(e));
			}
		};
		debug!("{}: {} as {}", event, EventState::Classified, classified.action);

		if classified.action == Action::Unknown {
			debug!("{}: ignored", event);
			self.counters.skipped.fetch_add(1, Ordering::Relaxed);
			return WaitDone::completed(Ok(()));
		}

		let keys = classified.keys();
		let mut per_target = Vec::with_capacity(self.targets.len());
		for (index, driver) in self.targets.iter().enumerate() {
			let done = WaitDone::new();
			let before = self.sequencer.enqueue(index, &keys, &done);
			let job = Arc::new(Job {
				target: index,
				driver: Arc::clone(driver),
				source: self.source.root().to_path_buf(),
				cache: Arc::clone(&self.cache),
				event: classified.clone(),
				applied: AtomicBool::new(false),
				skipped: AtomicBool::new(false),
			});
			let run = Run {
				label: format!("{} on {}", event, driver.name()),
				retry: self.retry.clone(),
				token: self.token.child_token(),
				counters: Arc::clone(&self.counters),
			};
			tokio::spawn(run.execute(job, before, done.clone()));
			per_target.push(done);
		}

		let overall = WaitDone::new();
		let all = overall.clone();
		tokio::spawn(async move {
			all.settle(wait_all(&per_target).await);
		});
		overall
	}

	/// Dispatch a Create for every entry of the source tree, parents first
	pub async fn push_all(&self) -> SyncResult<Vec<WaitDone>> {
		let mut paths = Vec::new();
		self.source
			.walk_dir("", &mut |info: &FileInfo| {
				if !info.path.is_empty() {
					paths.push(info.path.clone());
				}
				Ok(WalkControl::Continue)
			})
			.await?;
		info!("Pushing {} entries from {}", paths.len(), self.source().display());
		Ok(paths.into_iter().map(|p| self.dispatch(ChangeEvent::new(p, Action::Create))).collect())
	}

	/// Stop retrying; queued events finish as cancelled
	pub fn shutdown(&self) {
		info!("Orchestrator shutting down");
		self.token.cancel();
	}
}

//////////////////////////
// Per-target execution //
//////////////////////////

struct Run {
	label: String,
	retry: Retry,
	token: CancellationToken,
	counters: Arc<Counters>,
}

impl Run {
	async fn execute(self, job: Arc<Job>, before: Vec<WaitDone>, done: WaitDone) {
		for prev in &before {
			let _ = prev.wait_async().await;
		}
		if self.token.is_cancelled() {
			self.finish(EventState::Cancelled, false, Ok(()), &done);
			return;
		}
		debug!("{}: {}", self.label, EventState::Dispatched);

		let attempt_job = Arc::clone(&job);
		let wd = self
			.retry
			.execute(&self.label, self.token.clone(), move || {
				let job = Arc::clone(&attempt_job);
				async move {
					job.apply().await?;
					job.applied.store(true, Ordering::Release);
					Ok(())
				}
			})
			.await;
		let result = wd.wait_async().await;

		let state = match &result {
			Err(_) => EventState::FailedExhausted,
			Ok(()) if job.applied.load(Ordering::Acquire) => EventState::Succeeded,
			Ok(()) if self.token.is_cancelled() => EventState::Cancelled,
			// Exhausted with the error only logged
			Ok(()) => EventState::FailedExhausted,
		};
		self.finish(state, job.skipped.load(Ordering::Acquire), result, &done);
	}

	fn finish(&self, state: EventState, skipped: bool, result: Result<(), Arc<SyncError>>, done: &WaitDone) {
		let counter = match state {
			EventState::Succeeded if skipped => &self.counters.skipped,
			EventState::Succeeded => &self.counters.succeeded,
			EventState::Cancelled => &self.counters.cancelled,
			_ => &self.counters.failed,
		};
		counter.fetch_add(1, Ordering::Relaxed);
		debug!("{}: {}", self.label, state);
		done.settle(result);
	}
}

/// One event bound to one target
struct Job {
	target: usize,
	driver: Arc<dyn Driver>,
	source: PathBuf,
	cache: Arc<HashCache>,
	event: Classified,
	applied: AtomicBool,
	skipped: AtomicBool,
}

impl Job {
	async fn apply(&self) -> SyncResult<()> {
		let ev = &self.event;
		match ev.action {
			Action::Create | Action::Write => self.upload(&ev.path, false).await,
			Action::Remove => {
				self.driver.remove(&ev.path).await?;
				self.cache.invalidate(self.target, &ev.path);
				Ok(())
			}
			Action::Rename => self.rename().await,
			Action::Chmod => self.chmod(&ev.path).await,
			Action::Unknown => Ok(()),
		}
	}

	fn skip(&self, rel: &str, reason: &str) {
		debug!("{} on {}: {}, skipped", rel, self.driver.name(), reason);
		self.skipped.store(true, Ordering::Release);
	}

	/// Move `path` to `new_path` on the target, then bring the content up to date
	async fn rename(&self) -> SyncResult<()> {
		let old = &self.event.path;
		let new = self.event.new_path.as_deref().ok_or_else(|| SyncError::Protocol {
			message: format!("rename of {} without new path", old),
		})?;
		match self.driver.rename(old, new).await {
			Ok(()) => self.cache.rename(self.target, old, new),
			Err(SyncError::NotFound { .. }) => {
				// Nothing to move on the target, or an earlier attempt already did
				self.driver.remove(old).await?;
				self.cache.invalidate(self.target, old);
			}
			Err(e) => return Err(e),
		}
		self.upload(new, true).await
	}

	async fn chmod(&self, rel: &str) -> SyncResult<()> {
		let full = local_path(&self.source, rel);
		let meta = match tokio::fs::metadata(&full).await {
			Ok(meta) => meta,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				self.skip(rel, "source vanished");
				return Ok(());
			}
			Err(e) => return Err(SyncError::io_at(rel, e)),
		};
		let times = file_times(&meta);
		self.driver.chtimes(rel, times.a_time, times.m_time).await
	}

	/// Replicate the source entry at `rel`; directories are created, and
	/// their contents sent as well when `recursive`
	async fn upload(&self, rel: &str, recursive: bool) -> SyncResult<()> {
		let full = local_path(&self.source, rel);
		let meta = match tokio::fs::metadata(&full).await {
			Ok(meta) => meta,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				self.skip(rel, "source vanished");
				return Ok(());
			}
			Err(e) => return Err(SyncError::io_at(rel, e)),
		};

		if !meta.is_dir() {
			if !self.upload_file(rel, &full).await? {
				self.skip(rel, "content unchanged");
			}
			return Ok(());
		}

		self.driver.mkdir_all(rel).await?;
		if !recursive {
			return Ok(());
		}
		let mut entries = Vec::new();
		LocalDriver::new(self.source.clone())
			.walk_dir(rel, &mut |info: &FileInfo| {
				if info.path != rel {
					entries.push(info.clone());
				}
				Ok(WalkControl::Continue)
			})
			.await?;
		for entry in entries {
			if entry.is_dir.is_dir() {
				self.driver.mkdir_all(&entry.path).await?;
			} else {
				self.upload_file(&entry.path, &local_path(&self.source, &entry.path)).await?;
			}
		}
		Ok(())
	}

	/// Send one file unless the target already holds this content.
	///
	/// Returns whether anything was transferred.
	async fn upload_file(&self, rel: &str, full: &Path) -> SyncResult<bool> {
		let hash = hash_file(full).await?;
		if self.cache.matches(self.target, rel, &hash) {
			return Ok(false);
		}
		let report = self.driver.write(full, rel).await?;
		let meta = tokio::fs::metadata(full).await.map_err(|e| SyncError::io_at(rel, e))?;
		let times = file_times(&meta);
		self.driver.chtimes(rel, times.a_time, times.m_time).await?;
		self.cache.record(self.target, rel, &hash);
		debug!(
			"{} -> {}: {} bytes, {}/{} chunks",
			rel,
			self.driver.name(),
			report.bytes_sent,
			report.chunks_sent,
			report.chunks_total
		);
		Ok(true)
	}
}


// vim: ts=4
