use std::{net::SocketAddr, time::Duration};

use canary_core::{AbstractConnector, BoxedConnection, StreamConnection, info, types::TestUnit};
use snafu::prelude::*;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::{TcpSocket, TcpStream};

use crate::{ConnectSnafu, ConnectTimeoutSnafu, Error, NoAddressSnafu, ResolveSnafu, destination};

pub struct DirectConnector {
	connect_timeout: Duration,
	/// Pin sockets to the selected interface (`SO_BINDTODEVICE`)
	bind_interface:  bool,
}

impl DirectConnector {
	pub fn new(connect_timeout: Duration, bind_interface: bool) -> Self {
		Self {
			connect_timeout,
			bind_interface,
		}
	}

	async fn open(&self, addr: SocketAddr, interface: &str) -> Result<TcpStream, Error> {
		let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
			.and_then(|socket| socket.set_nonblocking(true).map(|_| socket))
			.context(ConnectSnafu { addr })?;
		if self.bind_interface {
			bind_to_device(&socket, interface)?;
		}
		let socket = TcpSocket::from_std_stream(socket.into());
		socket.connect(addr).await.context(ConnectSnafu { addr })
	}
}

impl AbstractConnector for DirectConnector {
	type Connection = BoxedConnection;

	async fn connect(&self, unit: &TestUnit<'_>) -> eyre::Result<BoxedConnection> {
		let (host, port) = destination(unit);
		let addr = resolve(&host, port).await?;
		let stream = tokio::time::timeout(self.connect_timeout, self.open(addr, unit.interface))
			.await
			.map_err(|_| {
				ConnectTimeoutSnafu {
					addr:  addr.to_string(),
					after: self.connect_timeout,
				}
				.build()
			})??;
		info!(target: "[DIRECT]", "connected to {addr} for {}", unit.name());
		Ok(StreamConnection::boxed(stream))
	}
}

pub(crate) async fn resolve(host: &str, port: u16) -> Result<SocketAddr, Error> {
	tokio::net::lookup_host((host, port))
		.await
		.context(ResolveSnafu { host })?
		.next()
		.context(NoAddressSnafu { host })
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn bind_to_device(socket: &Socket, interface: &str) -> Result<(), Error> {
	socket
		.bind_device(Some(interface.as_bytes()))
		.context(crate::BindDeviceSnafu { interface })
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn bind_to_device(_socket: &Socket, interface: &str) -> Result<(), Error> {
	canary_core::warn!(target: "[DIRECT]", "binding to {interface} is only supported on Linux, ignoring");
	Ok(())
}

#[cfg(test)]
mod tests {
	use canary_core::{
		Bytes, Connection, SyncBridge,
		types::{TransportKind, TransportSpec, UnitTarget, WebCheckSpec},
	};
	use tokio::{
		io::{AsyncReadExt, AsyncWriteExt},
		net::TcpListener,
	};

	use super::*;

	#[tokio::test]
	async fn test_direct_transport_connection() -> eyre::Result<()> {
		let listener = TcpListener::bind("127.0.0.1:0").await?;
		let port = listener.local_addr()?.port();
		tokio::spawn(async move {
			let (mut stream, _) = listener.accept().await?;
			let mut buf = [0u8; 4];
			stream.read_exact(&mut buf).await?;
			stream.write_all(&buf).await?;
			std::io::Result::Ok(())
		});

		let spec = TransportSpec {
			name:   "ss".to_string(),
			port,
			kind:   TransportKind::Shadowsocks,
			canary: None,
		};
		let unit = TestUnit {
			server:    "127.0.0.1".parse()?,
			interface: "lo",
			target:    UnitTarget::Transport(&spec),
		};
		let conn = DirectConnector::new(Duration::from_secs(5), false).connect(&unit).await?;

		let bridge = SyncBridge::with_timeout(Duration::from_secs(5));
		bridge
			.sync(|done| conn.send(Bytes::from_static(b"ping"), done))
			.await??;
		let echoed = bridge
			.sync(|done| conn.receive(1500, done))
			.await??;
		assert_eq!(echoed.as_deref(), Some(&b"ping"[..]));
		Ok(())
	}

	#[tokio::test]
	async fn test_direct_web_check_refused() -> eyre::Result<()> {
		// Grab a free port and close it again so nothing listens there
		let port = TcpListener::bind("127.0.0.1:0").await?.local_addr()?.port();
		let web = WebCheckSpec {
			name:    "local".to_string(),
			port,
			website: "127.0.0.1".to_string(),
		};
		let unit = TestUnit {
			server:    "127.0.0.1".parse()?,
			interface: "lo",
			target:    UnitTarget::Web(&web),
		};
		let result = DirectConnector::new(Duration::from_secs(5), false).connect(&unit).await;
		assert!(result.is_err());
		Ok(())
	}
}
