//! Reach a unit's target through the SOCKS5 listener of a transport client.
//!
//! The transport client is expected to listen on `<proxy_host>:<unit port>`.
//! Transport units ask the proxy for `server:port`, web checks for
//! `website:80`.

use std::{
	net::{IpAddr, Ipv4Addr, SocketAddr},
	time::Duration,
};

use canary_core::{
	AbstractConnector, BoxedConnection, StreamConnection, info,
	types::{TestUnit, UnitTarget},
};
use fast_socks5::client::{Config, Socks5Stream};
use snafu::prelude::*;

use crate::{ConnectTimeoutSnafu, SocksSnafu};

const WEB_PORT: u16 = 80;

pub struct Socks5Connector {
	proxy_host:      IpAddr,
	connect_timeout: Duration,
}

impl Default for Socks5Connector {
	fn default() -> Self {
		Self::new(IpAddr::V4(Ipv4Addr::LOCALHOST), Duration::from_secs(10))
	}
}

impl Socks5Connector {
	pub fn new(proxy_host: IpAddr, connect_timeout: Duration) -> Self {
		Self {
			proxy_host,
			connect_timeout,
		}
	}

	pub fn proxy_for(&self, unit: &TestUnit<'_>) -> SocketAddr {
		SocketAddr::new(self.proxy_host, unit.port())
	}
}

/// Destination requested from the proxy.
pub fn socks_target(unit: &TestUnit<'_>) -> (String, u16) {
	match unit.target {
		UnitTarget::Transport(spec) => (unit.server.to_string(), spec.port),
		UnitTarget::Web(spec) => (spec.website.clone(), WEB_PORT),
	}
}

impl AbstractConnector for Socks5Connector {
	type Connection = BoxedConnection;

	async fn connect(&self, unit: &TestUnit<'_>) -> eyre::Result<BoxedConnection> {
		let proxy = self.proxy_for(unit);
		let (host, port) = socks_target(unit);

		let stream = tokio::time::timeout(
			self.connect_timeout,
			Socks5Stream::connect(proxy, host.clone(), port, Config::default()),
		)
		.await
		.map_err(|_| {
			ConnectTimeoutSnafu {
				addr:  proxy.to_string(),
				after: self.connect_timeout,
			}
			.build()
		})?
		.context(SocksSnafu { proxy })?;

		info!(target: "[SOCKS5]", "{proxy} connected to {host}:{port} for {}", unit.name());
		Ok(StreamConnection::boxed(stream))
	}
}
