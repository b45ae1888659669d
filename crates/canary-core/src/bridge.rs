//! Turns a callback-style operation into something the caller can `.await`.
//!
//! Connections supplied by transport clients report completion through a
//! single callback. Probes are written as straight-line code instead, so each
//! call is wrapped in [`SyncBridge::sync`], which hands the operation a
//! [`Completion`] and suspends until that completion fires.
//!
//! `Completion::complete` takes `self`, so a completion can fire at most once.
//! The value travels over a oneshot channel, so it is kept even when the
//! callback runs before the caller starts waiting.

use std::{backtrace::Backtrace, fmt, io, time::Duration};

use snafu::prelude::*;
use tokio::sync::oneshot;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum BridgeError {
	#[snafu(display("operation did not complete within {after:?}"))]
	TimedOut { after: Duration, backtrace: Backtrace },
	#[snafu(display("completion handler was dropped without being called"))]
	Abandoned { backtrace: Backtrace },
}

impl From<BridgeError> for io::Error {
	fn from(value: BridgeError) -> Self {
		let kind = match value {
			BridgeError::TimedOut { .. } => io::ErrorKind::TimedOut,
			BridgeError::Abandoned { .. } => io::ErrorKind::BrokenPipe,
		};
		io::Error::new(kind, value)
	}
}

/// Single-shot completion handler given to a callback-style operation.
pub struct Completion<T> {
	tx: oneshot::Sender<T>,
}

impl<T> Completion<T> {
	pub fn complete(self, value: T) {
		// The waiter may have timed out already, nobody is left to tell
		let _ = self.tx.send(value);
	}

	/// Whether the waiting side has given up (timeout or dropped future).
	pub fn is_abandoned(&self) -> bool {
		self.tx.is_closed()
	}
}

impl<T> fmt::Debug for Completion<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Completion")
			.field("abandoned", &self.is_abandoned())
			.finish()
	}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncBridge {
	timeout: Option<Duration>,
}

impl SyncBridge {
	/// Without a timeout a silent peer suspends the caller forever.
	pub const fn unbounded() -> Self {
		Self { timeout: None }
	}

	pub const fn with_timeout(timeout: Duration) -> Self {
		Self { timeout: Some(timeout) }
	}

	pub fn timeout(&self) -> Option<Duration> {
		self.timeout
	}

	/// Start `op` and wait for the value it passes to its completion.
	pub async fn sync<T, F>(&self, op: F) -> Result<T, BridgeError>
	where
		F: FnOnce(Completion<T>),
	{
		let (tx, rx) = oneshot::channel();
		op(Completion { tx });

		let received = match self.timeout {
			Some(after) => tokio::time::timeout(after, rx)
				.await
				.map_err(|_| TimedOutSnafu { after }.build())?,
			None => rx.await,
		};
		received.map_err(|_| AbandonedSnafu.build())
	}

	/// Put the same bound on a whole sequence of calls, so a peer answering
	/// just inside the per-call limit still cannot stretch it forever.
	pub async fn bounded<F: Future>(&self, fut: F) -> Result<F::Output, BridgeError> {
		match self.timeout {
			Some(after) => tokio::time::timeout(after, fut)
				.await
				.map_err(|_| TimedOutSnafu { after }.build()),
			None => Ok(fut.await),
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	};

	use super::*;

	#[tokio::test]
	async fn test_completion_from_another_task() {
		let bridge = SyncBridge::with_timeout(Duration::from_secs(5));
		let value = bridge
			.sync(|done| {
				tokio::spawn(async move {
					tokio::time::sleep(Duration::from_millis(10)).await;
					done.complete(42u32);
				});
			})
			.await
			.unwrap();
		assert_eq!(value, 42);
	}

	#[tokio::test]
	async fn test_completion_before_wait_is_not_lost() {
		let bridge = SyncBridge::unbounded();
		let value = bridge.sync(|done| done.complete("early")).await.unwrap();
		assert_eq!(value, "early");
	}

	#[tokio::test]
	async fn test_dropped_completion_is_abandoned() {
		let bridge = SyncBridge::unbounded();
		let err = bridge.sync(|done: Completion<()>| drop(done)).await.unwrap_err();
		assert!(matches!(err, BridgeError::Abandoned { .. }));
	}

	#[tokio::test(start_paused = true)]
	async fn test_silent_operation_times_out() {
		let bridge = SyncBridge::with_timeout(Duration::from_secs(30));
		let mut parked = None;
		let err = bridge
			.sync(|done: Completion<()>| parked = Some(done))
			.await
			.unwrap_err();
		assert!(matches!(err, BridgeError::TimedOut { after, .. } if after == Duration::from_secs(30)));
		assert!(parked.as_ref().unwrap().is_abandoned());
		// Late completion is ignored rather than resuming anyone twice
		parked.unwrap().complete(());

		let io_err: io::Error = err.into();
		assert_eq!(io_err.kind(), io::ErrorKind::TimedOut);
	}

	#[tokio::test(start_paused = true)]
	async fn test_bound_covers_the_whole_sequence() {
		let bridge = SyncBridge::with_timeout(Duration::from_secs(30));
		let mut rounds = 0u32;
		let err = bridge
			.bounded(async {
				while rounds < 10 {
					// Every single call finishes inside the limit
					bridge
						.sync(|done| {
							tokio::spawn(async move {
								tokio::time::sleep(Duration::from_secs(29)).await;
								done.complete(());
							});
						})
						.await
						.unwrap();
					rounds += 1;
				}
			})
			.await
			.unwrap_err();
		assert!(matches!(err, BridgeError::TimedOut { .. }));
		assert_eq!(rounds, 1);
	}

	#[tokio::test]
	async fn test_unbounded_sequence_completes() {
		let value = SyncBridge::unbounded().bounded(async { 7 }).await.unwrap();
		assert_eq!(value, 7);
	}

	#[tokio::test]
	async fn test_each_call_resumes_once() {
		let bridge = SyncBridge::with_timeout(Duration::from_secs(5));
		let calls = Arc::new(AtomicUsize::new(0));
		for i in 0..10usize {
			let calls = calls.clone();
			let got = bridge
				.sync(move |done| {
					calls.fetch_add(1, Ordering::SeqCst);
					tokio::spawn(async move { done.complete(i) });
				})
				.await
				.unwrap();
			assert_eq!(got, i);
		}
		assert_eq!(calls.load(Ordering::SeqCst), 10);
	}
}
