//! One request/response exchange over an already established connection.
//!
//! The exchange is `Idle -> Sending -> AwaitingResponse -> Validating`, ending
//! in `Success` or `Failure`. There are no retries: every failure is returned
//! to the caller as a [`ProbeError`].

use std::io;

use canary_core::{BridgeError, Connection, RunningLog, SyncBridge, debug};
use snafu::prelude::*;
use tokio_util::bytes::{Bytes, BytesMut};

use crate::{DecodeFailedSnafu, FailureKind, MalformedResponseSnafu, NoResponseSnafu, PayloadMismatchSnafu, ProbeError, SendFailedSnafu};

/// The one request every probe sends.
pub const REQUEST: &[u8] = b"GET / HTTP/1.0\r\n\r\n";

/// The test server ends its response with this marker.
pub const TERMINATOR: &str = "Yeah!\n";

/// Upper bound for a single receive.
pub const CHUNK_SIZE: usize = 1500;

const HEADER_SEPARATOR: &str = "\r\n\r\n";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeState {
	Idle,
	Sending,
	AwaitingResponse,
	Validating,
	Success,
	Failure(FailureKind),
}

pub struct ConnectivityProbe<'a, C: ?Sized> {
	connection: &'a C,
	canary:     Option<&'a str>,
	bridge:     SyncBridge,
	log:        &'a RunningLog,
}

impl<'a, C: Connection + ?Sized> ConnectivityProbe<'a, C> {
	pub fn new(connection: &'a C, bridge: SyncBridge, log: &'a RunningLog) -> Self {
		Self {
			connection,
			canary: None,
			bridge,
			log,
		}
	}

	/// Require the response body to equal `canary` exactly.
	pub fn with_canary(mut self, canary: Option<&'a str>) -> Self {
		self.canary = canary;
		self
	}

	fn enter(&self, state: ProbeState) {
		debug!(target: "[PROBE]", ?state, "probe state");
	}

	/// Run the exchange and return the response payload.
	pub async fn run(&self) -> Result<String, ProbeError> {
		self.log.append("\n📣 Running transport connection test.\n");
		self.enter(ProbeState::Idle);

		let result = self.exchange().await;
		match &result {
			Ok(_) => self.enter(ProbeState::Success),
			Err(err) => {
				if let ProbeError::PayloadMismatch { actual, .. } = err {
					self.log
						.append(format!("\nHere's what we got back instead of what we expected: {actual}\n"));
				}
				self.enter(ProbeState::Failure(err.kind()));
			}
		}
		result
	}

	async fn exchange(&self) -> Result<String, ProbeError> {
		self.enter(ProbeState::Sending);
		self.send().await.context(SendFailedSnafu)?;

		self.enter(ProbeState::AwaitingResponse);
		// A read cut short by the deadline is never judged on partial data
		let buffer = self.read().await.map_err(|_| NoResponseSnafu.build())?;

		self.enter(ProbeState::Validating);
		let payload = parse_payload(&buffer)?;
		validate(payload, self.canary)?;
		Ok(payload.to_owned())
	}

	async fn send(&self) -> io::Result<()> {
		self.bridge
			.sync(|done| self.connection.send(Bytes::from_static(REQUEST), done))
			.await?
	}

	/// Accumulate chunks until the terminator shows up, the peer closes or a
	/// read error occurs, and return what arrived.
	///
	/// The bridge bound applies to the whole read as well as to every single
	/// receive. Running out of time, or losing the completion, is an error.
	pub async fn read(&self) -> Result<BytesMut, BridgeError> {
		let mut buffer = BytesMut::new();
		let filled = self
			.bridge
			.bounded(self.fill(&mut buffer))
			.await
			.and_then(|filled| filled);
		match filled {
			Ok(()) => Ok(buffer),
			Err(err) => {
				self.log.append(format!(
					"\nStopped waiting for data after {} bytes: {err}\n",
					buffer.len()
				));
				Err(err)
			}
		}
	}

	async fn fill(&self, buffer: &mut BytesMut) -> Result<(), BridgeError> {
		loop {
			let received = self
				.bridge
				.sync(|done| self.connection.receive(CHUNK_SIZE, done))
				.await?;
			match received {
				Ok(Some(chunk)) => {
					let scanned = buffer.len();
					buffer.extend_from_slice(&chunk);
					if contains_terminator(&buffer[..], scanned) {
						return Ok(());
					}
					debug!(target: "[PROBE]", len = buffer.len(), "terminator not seen yet");
				}
				Ok(None) => return Ok(()),
				Err(err) => {
					self.log
						.append(format!("\nError reading data for transport connection: {err}\n"));
					return Ok(());
				}
			}
		}
	}
}

/// Look for the terminator, skipping the part of `buffer` before `scanned`
/// that was already searched. The marker may straddle the boundary.
pub fn contains_terminator(buffer: &[u8], scanned: usize) -> bool {
	let marker = TERMINATOR.as_bytes();
	let from = scanned.saturating_sub(marker.len() - 1);
	buffer[from..].windows(marker.len()).any(|window| window == marker)
}

/// Decode the accumulated response and return everything after the headers.
pub fn parse_payload(buffer: &[u8]) -> Result<&str, ProbeError> {
	ensure!(!buffer.is_empty(), NoResponseSnafu);
	let text = std::str::from_utf8(buffer).context(DecodeFailedSnafu { len: buffer.len() })?;
	let (_, payload) = text
		.split_once(HEADER_SEPARATOR)
		.context(MalformedResponseSnafu { response: text })?;
	Ok(payload)
}

pub fn validate(payload: &str, canary: Option<&str>) -> Result<(), ProbeError> {
	if let Some(expected) = canary {
		ensure!(payload == expected, PayloadMismatchSnafu {
			expected,
			actual: payload,
		});
	}
	Ok(())
}
