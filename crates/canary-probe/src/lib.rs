use std::{backtrace::Backtrace, fmt::Display, io, str::Utf8Error};

use snafu::prelude::*;

pub mod probe;

pub use probe::{CHUNK_SIZE, ConnectivityProbe, REQUEST, TERMINATOR};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProbeError {
	#[snafu(display("Failed to send the request: {source}"))]
	SendFailed {
		source:    io::Error,
		backtrace: Backtrace,
	},
	#[snafu(display("We did not receive a response"))]
	NoResponse { backtrace: Backtrace },
	#[snafu(display("Could not decode the {len} byte response as UTF-8: {source}"))]
	DecodeFailed {
		len:       usize,
		source:    Utf8Error,
		backtrace: Backtrace,
	},
	#[snafu(display("Received a response with only headers: {response:?}"))]
	MalformedResponse {
		response:  String,
		backtrace: Backtrace,
	},
	#[snafu(display("Connected but the data did not match, expected {expected:?} and got {actual:?}"))]
	PayloadMismatch {
		expected:  String,
		actual:    String,
		backtrace: Backtrace,
	},
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureKind {
	/// No connection could be opened for the unit
	ConnectFailed,
	SendFailed,
	NoResponse,
	DecodeFailed,
	MalformedResponse,
	PayloadMismatch,
}

impl ProbeError {
	pub fn kind(&self) -> FailureKind {
		match self {
			ProbeError::SendFailed { .. } => FailureKind::SendFailed,
			ProbeError::NoResponse { .. } => FailureKind::NoResponse,
			ProbeError::DecodeFailed { .. } => FailureKind::DecodeFailed,
			ProbeError::MalformedResponse { .. } => FailureKind::MalformedResponse,
			ProbeError::PayloadMismatch { .. } => FailureKind::PayloadMismatch,
		}
	}
}

/// Verdict for one unit of a batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeOutcome {
	pub unit_name: String,
	pub success:   bool,
	pub failure:   Option<FailureKind>,
	pub message:   String,
}

impl ProbeOutcome {
	pub fn from_result(unit_name: impl Into<String>, result: Result<String, ProbeError>) -> Self {
		match result {
			Ok(payload) => Self {
				unit_name: unit_name.into(),
				success:   true,
				failure:   None,
				message:   format!("It works! Received {} byte payload", payload.len()),
			},
			Err(err) => Self::failed(unit_name, err.kind(), err.to_string()),
		}
	}

	pub fn failed(unit_name: impl Into<String>, kind: FailureKind, message: impl Into<String>) -> Self {
		Self {
			unit_name: unit_name.into(),
			success:   false,
			failure:   Some(kind),
			message:   message.into(),
		}
	}
}

impl Display for ProbeOutcome {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self.failure {
			None => write!(f, "💕 🐥 {}: {} 🐥 💕", self.unit_name, self.message),
			Some(kind) => write!(f, "🚫 {}: {:?}: {} 🚫", self.unit_name, kind, self.message),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_outcome_from_success() {
		let outcome = ProbeOutcome::from_result("shadowsocks", Ok("Yeah!\n".to_string()));
		assert!(outcome.success);
		assert_eq!(outcome.failure, None);
		assert!(outcome.to_string().contains("shadowsocks"));
	}

	#[test]
	fn test_outcome_from_mismatch_mentions_both_payloads() {
		let err = PayloadMismatchSnafu {
			expected: "Yeah!\n",
			actual:   "Nope",
		}
		.build();
		let outcome = ProbeOutcome::from_result("replicant", Err(err));
		assert!(!outcome.success);
		assert_eq!(outcome.failure, Some(FailureKind::PayloadMismatch));
		assert!(outcome.message.contains("Yeah!\\n"));
		assert!(outcome.message.contains("Nope"));
	}
}
