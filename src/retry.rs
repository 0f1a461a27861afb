//! Bounded, cancellable retry executor
//!
//! [`Retry`] runs a fallible operation up to `1 + count` times with a fixed
//! pause between attempts and reports the outcome through a [`WaitDone`].
//! Each attempt runs behind a panic boundary; a panic counts as a failed
//! attempt. Cancellation is checked between attempts and during the pause,
//! an attempt already in flight is allowed to finish.

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::{RetryConfig, RetryMode};
use crate::error::{SyncError, SyncResult};
use crate::logging::*;
use crate::wait::WaitDone;

/// Retry policy; cheap to clone and shared by every dispatch of a target
#[derive(Debug, Clone)]
pub struct Retry {
	count: u32,
	wait: Duration,
	mode: RetryMode,
	surface_exhaustion: bool,
}

impl Retry {
	pub fn new(count: u32, wait: Duration) -> Self {
		Retry { count, wait, mode: RetryMode::Async, surface_exhaustion: true }
	}

	pub fn from_config(config: &RetryConfig) -> Self {
		Retry {
			count: config.count,
			wait: config.wait(),
			mode: config.mode,
			surface_exhaustion: config.surface_exhaustion,
		}
	}

	pub fn with_mode(mut self, mode: RetryMode) -> Self {
		self.mode = mode;
		self
	}

	/// When false, an exhausted retry completes its WaitDone without error and
	/// the failure is only logged
	pub fn with_surface_exhaustion(mut self, surface: bool) -> Self {
		self.surface_exhaustion = surface;
		self
	}

	pub fn count(&self) -> u32 {
		self.count
	}

	pub fn mode(&self) -> RetryMode {
		self.mode
	}

	/// Run `op` under this policy.
	///
	/// In sync mode every attempt runs before this returns and the WaitDone is
	/// already complete. In async mode the attempts run on a spawned task and
	/// the WaitDone completes later.
	pub async fn execute<F, Fut>(&self, description: &str, token: CancellationToken, op: F) -> WaitDone
	where
		F: FnMut() -> Fut + Send + 'static,
		Fut: Future<Output = SyncResult<()>> + Send + 'static,
	{
		let wd = WaitDone::new();
		match self.mode {
			RetryMode::Sync => {
				let result = self.run(description, &token, op).await;
				wd.complete(result);
			}
			RetryMode::Async => {
				let this = self.clone();
				let description = description.to_string();
				let done = wd.clone();
				tokio::spawn(async move {
					let attempts = AssertUnwindSafe(this.run(&description, &token, op));
					let result = match attempts.catch_unwind().await {
						Ok(result) => result,
						Err(payload) => Err(panicked(&description, payload)),
					};
					done.complete(result);
				});
			}
		}
		wd
	}

	async fn run<F, Fut>(&self, description: &str, token: &CancellationToken, mut op: F) -> SyncResult<()>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = SyncResult<()>>,
	{
		let attempts = self.count.saturating_add(1);
		let mut last = None;
		for attempt in 1..=attempts {
			if token.is_cancelled() {
				debug!("{}: cancelled before attempt {}", description, attempt);
				return Ok(());
			}

			let result = match std::panic::catch_unwind(AssertUnwindSafe(&mut op)) {
				Ok(attempt) => match AssertUnwindSafe(attempt).catch_unwind().await {
					Ok(result) => result,
					Err(payload) => Err(panicked(description, payload)),
				},
				Err(payload) => Err(panicked(description, payload)),
			};

			match result {
				Ok(()) => {
					if attempt > 1 {
						info!("{}: succeeded on attempt {}/{}", description, attempt, attempts);
					}
					return Ok(());
				}
				Err(SyncError::Cancelled) => {
					debug!("{}: operation reported cancellation", description);
					return Ok(());
				}
				Err(e) => {
					warn!("{}: attempt {}/{} failed: {}", description, attempt, attempts, e);
					let retryable = e.is_retryable();
					last = Some(e);
					if !retryable {
						break;
					}
				}
			}

			if attempt < attempts {
				tokio::select! {
					_ = token.cancelled() => {
						debug!("{}: cancelled during backoff", description);
						return Ok(());
					}
					_ = tokio::time::sleep(self.wait) => {}
				}
			}
		}

		self.exhausted(description, attempts, last)
	}

	/// Blocking variant for callers outside the async runtime.
	///
	/// Always runs inline regardless of mode.
	pub fn execute_blocking<F>(&self, description: &str, token: &CancellationToken, mut op: F) -> WaitDone
	where
		F: FnMut() -> SyncResult<()>,
	{
		let attempts = self.count.saturating_add(1);
		let mut last = None;
		for attempt in 1..=attempts {
			if token.is_cancelled() {
				return WaitDone::completed(Ok(()));
			}
			let result = match std::panic::catch_unwind(AssertUnwindSafe(&mut op)) {
				Ok(result) => result,
				Err(payload) => Err(panicked(description, payload)),
			};
			match result {
				Ok(()) => return WaitDone::completed(Ok(())),
				Err(SyncError::Cancelled) => return WaitDone::completed(Ok(())),
				Err(e) => {
					warn!("{}: attempt {}/{} failed: {}", description, attempt, attempts, e);
					let retryable = e.is_retryable();
					last = Some(e);
					if !retryable {
						break;
					}
				}
			}
			if attempt < attempts && !sleep_unless_cancelled(self.wait, token) {
				return WaitDone::completed(Ok(()));
			}
		}
		WaitDone::completed(self.exhausted(description, attempts, last))
	}

	fn exhausted(&self, description: &str, attempts: u32, last: Option<SyncError>) -> SyncResult<()> {
		let last = match last {
			Some(e) => e,
			None => return Ok(()),
		};
		error!("{}: giving up: {}", description, last);
		if !self.surface_exhaustion {
			return Ok(());
		}
		if !last.is_retryable() {
			return Err(last);
		}
		Err(SyncError::RetryExhausted {
			description: description.to_string(),
			attempts,
			last: Box::new(last),
		})
	}
}

impl Default for Retry {
	fn default() -> Self {
		Retry::from_config(&RetryConfig::default())
	}
}

fn panicked(description: &str, payload: Box<dyn std::any::Any + Send>) -> SyncError {
	let message = if let Some(s) = payload.downcast_ref::<&str>() {
		s.to_string()
	} else if let Some(s) = payload.downcast_ref::<String>() {
		s.clone()
	} else {
		"unknown panic".to_string()
	};
	SyncError::Panicked { description: description.to_string(), message }
}

/// Sleep in short slices; false when cancelled first
fn sleep_unless_cancelled(total: Duration, token: &CancellationToken) -> bool {
	let slice = Duration::from_millis(10);
	let mut left = total;
	while !left.is_zero() {
		if token.is_cancelled() {
			return false;
		}
		let step = left.min(slice);
		std::thread::sleep(step);
		left -= step;
	}
	!token.is_cancelled()
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU32, Ordering};
	use std::sync::Arc;

	#[test]
	fn test_blocking_exhaustion_counts_attempts() {
		let retry = Retry::new(2, Duration::from_millis(1));
		let mut calls = 0;
		let wd = retry.execute_blocking("flaky", &CancellationToken::new(), || {
			calls += 1;
			Err(SyncError::from("nope"))
		});
		assert_eq!(calls, 3);
		let err = wd.wait().unwrap_err();
		assert!(matches!(*err, SyncError::RetryExhausted { attempts: 3, .. }));
	}

	#[test]
	fn test_blocking_panic_is_a_failure() {
		let retry = Retry::new(1, Duration::from_millis(1)).with_surface_exhaustion(false);
		let mut calls = 0;
		let wd = retry.execute_blocking("panicky", &CancellationToken::new(), || {
			calls += 1;
			if calls == 1 {
				panic!("first attempt explodes");
			}
			Ok(())
		});
		assert_eq!(calls, 2);
		assert!(wd.wait().is_ok());
	}

	#[tokio::test]
	async fn test_not_found_stops_early() {
		let retry = Retry::new(5, Duration::from_millis(1)).with_mode(RetryMode::Sync);
		let calls = Arc::new(AtomicU32::new(0));
		let c = calls.clone();
		let wd = retry
			.execute("missing", CancellationToken::new(), move || {
				c.fetch_add(1, Ordering::SeqCst);
				async { Err(SyncError::NotFound { path: "x".to_string() }) }
			})
			.await;
		assert_eq!(calls.load(Ordering::SeqCst), 1);
		let err = wd.wait_async().await.unwrap_err();
		assert!(matches!(*err, SyncError::NotFound { .. }));
	}

	#[tokio::test]
	async fn test_zero_count_single_attempt() {
		let retry = Retry::new(0, Duration::from_millis(1)).with_mode(RetryMode::Sync);
		let calls = Arc::new(AtomicU32::new(0));
		let c = calls.clone();
		let wd = retry
			.execute("once", CancellationToken::new(), move || {
				c.fetch_add(1, Ordering::SeqCst);
				async { Err(SyncError::from("fail")) }
			})
			.await;
		assert!(wd.is_done());
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}
}

// vim: ts=4
