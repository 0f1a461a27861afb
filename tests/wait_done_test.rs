/// Integration tests for the WaitDone completion latch
use replicr::error::SyncError;
use replicr::wait::wait_all;
use replicr::WaitDone;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_done_twice_same_as_once() {
	let wd = WaitDone::new();
	assert!(wd.done());
	assert!(!wd.done());
	assert!(wd.wait().is_ok());
}

#[test]
fn test_done_then_error_keeps_success() {
	let wd = WaitDone::new();
	wd.done();
	assert!(!wd.done_with_error(SyncError::from("late")));
	assert!(wd.wait().is_ok());
	assert!(wd.try_result().unwrap().is_ok());
}

#[test]
fn test_wait_after_completion_returns_original_result() {
	let wd = WaitDone::completed(Err(SyncError::from("original")));
	for _ in 0..3 {
		assert_eq!(wd.wait().unwrap_err().to_string(), "original");
	}
}

#[test]
fn test_wait_blocks_until_first_completion() {
	let wd = WaitDone::new();
	let completed = Arc::new(AtomicBool::new(false));

	let waiters: Vec<_> = (0..4)
		.map(|_| {
			let wd = wd.clone();
			let completed = Arc::clone(&completed);
			thread::spawn(move || {
				let result = wd.wait();
				assert!(completed.load(Ordering::SeqCst), "wait returned before completion");
				result.is_err()
			})
		})
		.collect();

	thread::sleep(Duration::from_millis(50));
	completed.store(true, Ordering::SeqCst);
	wd.done_with_error(SyncError::from("first"));
	wd.done();

	for w in waiters {
		assert!(w.join().unwrap());
	}
}

#[tokio::test]
async fn test_wait_async_from_other_task() {
	let wd = WaitDone::new();
	let other = wd.clone();
	let handle = tokio::spawn(async move { other.wait_async().await });

	tokio::time::sleep(Duration::from_millis(20)).await;
	assert!(!handle.is_finished());
	wd.done();
	assert!(handle.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_complete_from_thread_wakes_task() {
	let wd = WaitDone::new();
	let other = wd.clone();
	thread::spawn(move || {
		thread::sleep(Duration::from_millis(20));
		other.complete(Ok(()));
	});
	let result = tokio::time::timeout(Duration::from_secs(2), wd.wait_async()).await.unwrap();
	assert!(result.is_ok());
}

#[tokio::test]
async fn test_wait_all_waits_for_every_latch() {
	let a = WaitDone::new();
	let b = WaitDone::new();
	let (a2, b2) = (a.clone(), b.clone());
	tokio::spawn(async move {
		tokio::time::sleep(Duration::from_millis(10)).await;
		b2.done_with_error(SyncError::from("b failed"));
		tokio::time::sleep(Duration::from_millis(10)).await;
		a2.done();
	});

	let err = wait_all(&[a.clone(), b.clone()]).await.unwrap_err();
	assert_eq!(err.to_string(), "b failed");
	assert!(a.is_done());
}

// vim: ts=4
