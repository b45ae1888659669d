use std::{backtrace::Backtrace, io, net::SocketAddr, path::PathBuf, time::Duration};

use canary_core::{
	BatchInProgress,
	types::{TransportEntry, UnknownTransportKind, WebCheckSpec},
};
use snafu::{IntoError, prelude::*};

pub mod archive;
pub mod interface;
pub mod orchestrator;
pub mod setup;

pub use archive::{Archiver, NoArchive, TarArchiver};
pub use interface::{InterfaceSource, SystemInterfaces};
pub use orchestrator::{BatchReport, TestOrchestrator};

/// Everything one batch needs, already merged from config file and CLI.
#[derive(Debug, Clone)]
pub struct RunConfig {
	pub server_addr:     std::net::IpAddr,
	pub test_count:      u32,
	pub transports:      Vec<TransportEntry>,
	pub web_checks:      Vec<WebCheckSpec>,
	pub resource_dir:    PathBuf,
	pub results_dir:     PathBuf,
	pub interface:       Option<String>,
	pub connect_timeout: Duration,
	/// Bound for every send/receive wait inside a probe
	pub read_timeout:    Duration,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SetupError {
	#[snafu(display("Resource directory does not exist at {}", path.display()))]
	ResourceDirMissing { path: PathBuf, backtrace: Backtrace },
	#[snafu(display("Tried to test a transport that has no config file. Transport name: {name}"))]
	UnknownTransport {
		name:      String,
		source:    UnknownTransportKind,
		backtrace: Backtrace,
	},
	#[snafu(display("{name} config not found at {}", path.display()))]
	ConfigMissing {
		name:      String,
		path:      PathBuf,
		backtrace: Backtrace,
	},
	#[snafu(display("Failed to connect to the transport server at {addr}"))]
	ServerUnreachable {
		addr:      SocketAddr,
		source:    io::Error,
		backtrace: Backtrace,
	},
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum InterfaceError {
	#[snafu(display("Failed to enumerate network interfaces"))]
	Enumerate {
		source:    io::Error,
		backtrace: Backtrace,
	},
	#[snafu(display(
		"Unable to identify a likely interface name among [{}]. Run again with an explicit interface.",
		available.join(", ")
	))]
	NoCandidate {
		available: Vec<String>,
		backtrace: Backtrace,
	},
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RunError {
	#[snafu(display("Test count must be at least 1"))]
	NoIterations { backtrace: Backtrace },
	#[snafu(display("{source}"))]
	Setup {
		#[snafu(backtrace)]
		source: SetupError,
	},
	#[snafu(display("{source}"))]
	Interface {
		#[snafu(backtrace)]
		source: InterfaceError,
	},
	#[snafu(display("{source}"))]
	AlreadyRunning {
		source:    BatchInProgress,
		backtrace: Backtrace,
	},
}

impl From<SetupError> for RunError {
	#[inline(always)]
	fn from(value: SetupError) -> Self {
		SetupSnafu.into_error(value)
	}
}

impl From<InterfaceError> for RunError {
	#[inline(always)]
	fn from(value: InterfaceError) -> Self {
		InterfaceSnafu.into_error(value)
	}
}

impl From<BatchInProgress> for RunError {
	#[inline(always)]
	fn from(value: BatchInProgress) -> Self {
		AlreadyRunningSnafu.into_error(value)
	}
}
