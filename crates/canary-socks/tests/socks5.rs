//! SOCKS5 connector against a minimal in-process SOCKS5 endpoint

use std::{
	net::{IpAddr, Ipv4Addr, SocketAddr},
	time::Duration,
};

use canary_core::{
	AbstractConnector, Bytes, Connection, SyncBridge,
	types::{TestUnit, TransportKind, TransportSpec, UnitTarget, WebCheckSpec},
};
use canary_socks::Socks5Connector;
use fast_socks5::{server::Socks5ServerProtocol, util::target_addr::TargetAddr};
use tokio::{
	io::{AsyncReadExt, AsyncWriteExt},
	net::TcpListener,
	sync::oneshot,
};

/// Accept one SOCKS5 CONNECT, report the requested target and answer the
/// request itself instead of relaying it.
async fn serve_once(listener: TcpListener, requested: oneshot::Sender<(String, u16)>) -> eyre::Result<()> {
	let (stream, _) = listener.accept().await?;
	let proto = Socks5ServerProtocol::accept_no_auth(stream).await?;
	let (proto, _cmd, target) = proto.read_command().await?;
	let target = match target {
		TargetAddr::Ip(addr) => (addr.ip().to_string(), addr.port()),
		TargetAddr::Domain(domain, port) => (domain, port),
	};
	let _ = requested.send(target);

	let mut inner = proto
		.reply_success(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
		.await?;
	let mut request = [0u8; 18];
	inner.read_exact(&mut request).await?;
	inner.write_all(b"HTTP/1.0 200 OK\r\n\r\nYeah!\n").await?;
	inner.flush().await?;
	Ok(())
}

#[tokio::test]
async fn test_transport_unit_goes_through_local_listener() -> eyre::Result<()> {
	let listener = TcpListener::bind("127.0.0.1:0").await?;
	let port = listener.local_addr()?.port();
	let (tx, rx) = oneshot::channel();
	let server = tokio::spawn(serve_once(listener, tx));

	let spec = TransportSpec {
		name: "replicant".to_string(),
		port,
		kind: TransportKind::Replicant,
		canary: Some("Yeah!\n".to_string()),
	};
	let unit = TestUnit {
		server:    "10.1.2.3".parse()?,
		interface: "eth0",
		target:    UnitTarget::Transport(&spec),
	};
	let connector = Socks5Connector::new(IpAddr::V4(Ipv4Addr::LOCALHOST), Duration::from_secs(5));
	let conn = connector.connect(&unit).await?;

	assert_eq!(rx.await?, ("10.1.2.3".to_string(), port));

	let bridge = SyncBridge::with_timeout(Duration::from_secs(5));
	bridge
		.sync(|done| conn.send(Bytes::from_static(b"GET / HTTP/1.0\r\n\r\n"), done))
		.await??;
	let mut response = Vec::new();
	while let Some(chunk) = bridge.sync(|done| conn.receive(1500, done)).await?? {
		response.extend_from_slice(&chunk);
	}
	assert_eq!(response, b"HTTP/1.0 200 OK\r\n\r\nYeah!\n");
	server.await??;
	Ok(())
}

#[tokio::test]
async fn test_web_check_requests_website_on_port_80() -> eyre::Result<()> {
	let listener = TcpListener::bind("127.0.0.1:0").await?;
	let port = listener.local_addr()?.port();
	let (tx, rx) = oneshot::channel();
	tokio::spawn(serve_once(listener, tx));

	let web = WebCheckSpec {
		name: "example".to_string(),
		port,
		website: "example.com".to_string(),
	};
	let unit = TestUnit {
		server:    "10.1.2.3".parse()?,
		interface: "eth0",
		target:    UnitTarget::Web(&web),
	};
	let _conn = Socks5Connector::new(IpAddr::V4(Ipv4Addr::LOCALHOST), Duration::from_secs(5))
		.connect(&unit)
		.await?;
	assert_eq!(rx.await?, ("example.com".to_string(), 80));
	Ok(())
}

#[tokio::test]
async fn test_missing_proxy_is_an_error() -> eyre::Result<()> {
	let port = TcpListener::bind("127.0.0.1:0").await?.local_addr()?.port();
	let spec = TransportSpec {
		name: "shadowsocks".to_string(),
		port,
		kind: TransportKind::Shadowsocks,
		canary: None,
	};
	let unit = TestUnit {
		server:    "127.0.0.1".parse()?,
		interface: "lo",
		target:    UnitTarget::Transport(&spec),
	};
	let result = Socks5Connector::new(IpAddr::V4(Ipv4Addr::LOCALHOST), Duration::from_secs(5))
		.connect(&unit)
		.await;
	assert!(result.is_err());
	Ok(())
}
