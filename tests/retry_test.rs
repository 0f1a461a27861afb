/// Integration tests for the retry executor
use replicr::config::RetryMode;
use replicr::error::SyncError;
use replicr::Retry;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_millis(10);

fn counter() -> Arc<AtomicUsize> {
	Arc::new(AtomicUsize::new(0))
}

#[tokio::test]
async fn test_sync_mode_always_failing_runs_four_times() {
	let calls = counter();
	let c = Arc::clone(&calls);
	let retry = Retry::new(3, WAIT).with_mode(RetryMode::Sync).with_surface_exhaustion(false);

	let wd = retry
		.execute("always failing", CancellationToken::new(), move || {
			let c = Arc::clone(&c);
			async move {
				c.fetch_add(1, Ordering::SeqCst);
				Err(SyncError::from("boom"))
			}
		})
		.await;

	// Sync mode completes before returning
	assert!(wd.is_done());
	assert_eq!(calls.load(Ordering::SeqCst), 4);
	assert!(wd.wait_async().await.is_ok(), "exhaustion is only logged when not surfaced");
}

#[tokio::test]
async fn test_exhaustion_surfaced_by_default() {
	let calls = counter();
	let c = Arc::clone(&calls);
	let retry = Retry::new(3, WAIT);

	let wd = retry
		.execute("always failing", CancellationToken::new(), move || {
			let c = Arc::clone(&c);
			async move {
				c.fetch_add(1, Ordering::SeqCst);
				Err(SyncError::from("boom"))
			}
		})
		.await;

	let err = wd.wait_async().await.unwrap_err();
	match err.as_ref() {
		SyncError::RetryExhausted { attempts, last, .. } => {
			assert_eq!(*attempts, 4);
			assert_eq!(last.to_string(), "boom");
		}
		other => panic!("unexpected error: {}", other),
	}
	assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_fail_twice_then_succeed() {
	for mode in [RetryMode::Sync, RetryMode::Async] {
		let calls = counter();
		let c = Arc::clone(&calls);
		let retry = Retry::new(3, WAIT).with_mode(mode);

		let wd = retry
			.execute("flaky", CancellationToken::new(), move || {
				let c = Arc::clone(&c);
				async move {
					if c.fetch_add(1, Ordering::SeqCst) < 2 {
						Err(SyncError::from("not yet"))
					} else {
						Ok(())
					}
				}
			})
			.await;

		assert!(wd.wait_async().await.is_ok());
		assert_eq!(calls.load(Ordering::SeqCst), 3, "mode {:?}", mode);
	}
}

#[tokio::test]
async fn test_cancel_right_after_dispatch() {
	let calls = counter();
	let c = Arc::clone(&calls);
	let token = CancellationToken::new();
	let retry = Retry::new(3, Duration::from_secs(10));

	let start = Instant::now();
	let wd = retry
		.execute("cancelled", token.clone(), move || {
			let c = Arc::clone(&c);
			async move {
				c.fetch_add(1, Ordering::SeqCst);
				tokio::time::sleep(Duration::from_millis(20)).await;
				Err(SyncError::from("boom"))
			}
		})
		.await;
	token.cancel();

	let result = tokio::time::timeout(Duration::from_secs(2), wd.wait_async())
		.await
		.expect("cancellation must complete the latch promptly");
	assert!(result.is_ok(), "cancellation is not an error");
	assert!(start.elapsed() < Duration::from_secs(2));

	// At most the attempt already in flight ran
	let seen = calls.load(Ordering::SeqCst);
	assert!(seen <= 1, "{} attempts after cancellation", seen);
	tokio::time::sleep(Duration::from_millis(50)).await;
	assert_eq!(calls.load(Ordering::SeqCst), seen);
}

#[tokio::test]
async fn test_panic_counts_as_failed_attempt() {
	let calls = counter();
	let c = Arc::clone(&calls);
	let retry = Retry::new(2, WAIT).with_mode(RetryMode::Sync);

	let wd = retry
		.execute("panicky", CancellationToken::new(), move || {
			let c = Arc::clone(&c);
			async move {
				if c.fetch_add(1, Ordering::SeqCst) == 0 {
					panic!("first attempt blows up");
				}
				Ok(())
			}
		})
		.await;

	assert!(wd.wait_async().await.is_ok());
	assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_panic_while_building_attempt() {
	for mode in [RetryMode::Sync, RetryMode::Async] {
		let calls = counter();
		let c = Arc::clone(&calls);
		let retry = Retry::new(1, WAIT).with_mode(mode);

		let wd = retry
			.execute("eager panic", CancellationToken::new(), move || {
				if c.fetch_add(1, Ordering::SeqCst) == 0 {
					panic!("closure fails before returning a future");
				}
				async { Ok(()) }
			})
			.await;

		let outcome = tokio::time::timeout(Duration::from_secs(2), wd.wait_async()).await;
		assert!(matches!(outcome, Ok(Ok(()))), "mode {:?}", mode);
		assert_eq!(calls.load(Ordering::SeqCst), 2, "mode {:?}", mode);
	}
}

#[tokio::test]
async fn test_not_found_stops_early() {
	let calls = counter();
	let c = Arc::clone(&calls);
	let retry = Retry::new(3, WAIT);

	let wd = retry
		.execute("missing", CancellationToken::new(), move || {
			let c = Arc::clone(&c);
			async move {
				c.fetch_add(1, Ordering::SeqCst);
				Err(SyncError::NotFound { path: "gone.txt".to_string() })
			}
		})
		.await;

	let err = wd.wait_async().await.unwrap_err();
	assert!(matches!(err.as_ref(), SyncError::NotFound { .. }));
	assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_blocking_variant_outside_runtime() {
	let mut calls = 0;
	let retry = Retry::new(3, WAIT);
	let wd = retry.execute_blocking("blocking flaky", &CancellationToken::new(), || {
		calls += 1;
		if calls < 3 {
			Err(SyncError::from("not yet"))
		} else {
			Ok(())
		}
	});
	assert!(wd.wait().is_ok());
	assert_eq!(calls, 3);
}

// vim: ts=4
