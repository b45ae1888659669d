//! Human readable record of a test run, plus the "tests running" flag.
//!
//! The log is shared between the orchestrator and connection tasks through a
//! cheap [`RunningLog`] handle. Text and flag live behind a single mutex, so
//! appends never interleave and a flag change is ordered with the lines
//! around it.

use std::{
	backtrace::Backtrace,
	sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use snafu::prelude::*;
use tokio::sync::watch;

use crate::info;

#[derive(Debug, Default)]
struct State {
	text:    String,
	running: bool,
}

#[derive(Debug)]
struct Inner {
	state:   Mutex<State>,
	running: watch::Sender<bool>,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub), display("a test batch is already running"))]
pub struct BatchInProgress {
	backtrace: Backtrace,
}

#[derive(Clone, Debug)]
pub struct RunningLog {
	inner: Arc<Inner>,
}

impl Default for RunningLog {
	fn default() -> Self {
		Self::new()
	}
}

impl RunningLog {
	pub fn new() -> Self {
		let (running, _) = watch::channel(false);
		Self {
			inner: Arc::new(Inner {
				state: Mutex::new(State::default()),
				running,
			}),
		}
	}

	fn lock(&self) -> MutexGuard<'_, State> {
		// A panicking writer leaves the text readable, keep going
		self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Append `message` verbatim. Every non-empty line is echoed to tracing.
	pub fn append(&self, message: impl AsRef<str>) {
		let message = message.as_ref();
		self.lock().text.push_str(message);
		for line in message.lines().map(str::trim).filter(|line| !line.is_empty()) {
			info!(target: "[RUN-LOG]", "{line}");
		}
	}

	pub fn text(&self) -> String {
		self.lock().text.clone()
	}

	pub fn tests_running(&self) -> bool {
		self.lock().running
	}

	pub fn set_tests_running(&self, running: bool) {
		let mut state = self.lock();
		state.running = running;
		self.inner.running.send_replace(running);
	}

	/// Mark a batch as started. The flag drops back to `false` when the
	/// returned guard goes out of scope, however the batch ends.
	pub fn begin_batch(&self) -> Result<BatchGuard, BatchInProgress> {
		let mut state = self.lock();
		ensure!(!state.running, BatchInProgressSnafu);
		state.running = true;
		self.inner.running.send_replace(true);
		Ok(BatchGuard { log: self.clone() })
	}

	/// Watch the "tests running" flag.
	pub fn subscribe(&self) -> watch::Receiver<bool> {
		self.inner.running.subscribe()
	}
}

#[derive(Debug)]
#[must_use = "the batch ends as soon as the guard is dropped"]
pub struct BatchGuard {
	log: RunningLog,
}

impl Drop for BatchGuard {
	fn drop(&mut self) {
		self.log.set_tests_running(false);
	}
}
