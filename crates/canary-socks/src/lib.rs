//! Connection factories for the units of a batch.
//!
//! - [`direct::DirectConnector`] opens plain TCP to the target, optionally
//!   pinned to the selected interface
//! - [`socks5::Socks5Connector`] goes through the SOCKS5 listener a transport
//!   client exposes locally

use std::{backtrace::Backtrace, io, net::SocketAddr, time::Duration};

use canary_core::types::{TestUnit, UnitTarget};
use snafu::prelude::*;

pub mod direct;
pub mod socks5;

pub use direct::DirectConnector;
pub use socks5::Socks5Connector;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
	#[snafu(display("Failed to resolve {host}"))]
	Resolve {
		host:      String,
		source:    io::Error,
		backtrace: Backtrace,
	},
	#[snafu(display("{host} did not resolve to any address"))]
	NoAddress { host: String, backtrace: Backtrace },
	#[snafu(display("Failed to bind socket to interface {interface}"))]
	BindDevice {
		interface: String,
		source:    io::Error,
		backtrace: Backtrace,
	},
	#[snafu(display("Failed to connect to {addr}"))]
	Connect {
		addr:      SocketAddr,
		source:    io::Error,
		backtrace: Backtrace,
	},
	#[snafu(display("Timed out connecting to {addr} after {after:?}"))]
	ConnectTimeout {
		addr:      String,
		after:     Duration,
		backtrace: Backtrace,
	},
	#[snafu(display("SOCKS5 connection through {proxy} failed"))]
	Socks {
		proxy:     SocketAddr,
		source:    fast_socks5::SocksError,
		backtrace: Backtrace,
	},
}

/// Host and port a direct connection for `unit` should reach.
pub(crate) fn destination(unit: &TestUnit<'_>) -> (String, u16) {
	match unit.target {
		UnitTarget::Transport(spec) => (unit.server.to_string(), spec.port),
		UnitTarget::Web(spec) => (spec.website.clone(), spec.port),
	}
}
