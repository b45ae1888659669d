//! Preconditions that have to hold before any probe is attempted.

use std::{io, net::SocketAddr, path::Path, time::Duration};

use canary_core::{RunningLog, info, types::TransportSpec};
use snafu::prelude::*;
use tokio::net::TcpStream;

use crate::{ConfigMissingSnafu, ResourceDirMissingSnafu, RunConfig, ServerUnreachableSnafu, SetupError, UnknownTransportSnafu};

/// Resolve every configured transport and make sure the batch can run.
///
/// Nothing touches the network until the resource directory and every
/// transport config have been found.
pub async fn check_setup(config: &RunConfig, log: &RunningLog) -> Result<Vec<TransportSpec>, SetupError> {
	log.append("\n🔎 Checking test setup.\n");
	let result = run_checks(config).await;
	if let Err(err) = &result {
		log.append(format!("\n‼️ {err}\n"));
	}
	result
}

async fn run_checks(config: &RunConfig) -> Result<Vec<TransportSpec>, SetupError> {
	let resource_dir = config.resource_dir.as_path();
	ensure!(
		is_dir(resource_dir).await,
		ResourceDirMissingSnafu { path: resource_dir }
	);

	let transports = config
		.transports
		.iter()
		.map(|entry| TransportSpec::from_entry(entry).context(UnknownTransportSnafu { name: &entry.name }))
		.collect::<Result<Vec<_>, _>>()?;

	for spec in &transports {
		let path = spec.config_path(resource_dir);
		ensure!(
			is_file(&path).await,
			ConfigMissingSnafu {
				name: spec.name.as_str(),
				path,
			}
		);
	}

	if let Some(first) = transports.first() {
		let addr = SocketAddr::new(config.server_addr, first.port);
		check_server(addr, config.connect_timeout)
			.await
			.context(ServerUnreachableSnafu { addr })?;
		info!(target: "[SETUP]", "transport server is reachable at {addr}");
	}

	Ok(transports)
}

async fn check_server(addr: SocketAddr, connect_timeout: Duration) -> io::Result<()> {
	let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(addr))
		.await
		.map_err(|_| io::Error::new(io::ErrorKind::TimedOut, format!("no answer within {connect_timeout:?}")))??;
	drop(stream);
	Ok(())
}

async fn is_dir(path: &Path) -> bool {
	tokio::fs::metadata(path)
		.await
		.map(|meta| meta.is_dir())
		.unwrap_or(false)
}

async fn is_file(path: &Path) -> bool {
	tokio::fs::metadata(path)
		.await
		.map(|meta| meta.is_file())
		.unwrap_or(false)
}

#[cfg(test)]
mod tests {
	use std::net::{IpAddr, Ipv4Addr};

	use canary_core::types::{TransportEntry, TransportKind};
	use tokio::net::TcpListener;

	use super::*;

	fn config(resource_dir: &Path, transports: Vec<TransportEntry>) -> RunConfig {
		RunConfig {
			server_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
			test_count: 1,
			transports,
			web_checks: Vec::new(),
			resource_dir: resource_dir.to_path_buf(),
			results_dir: resource_dir.join("results"),
			interface: Some("lo".to_string()),
			connect_timeout: Duration::from_secs(5),
			read_timeout: Duration::from_secs(5),
		}
	}

	fn entry(name: &str, kind: &str, port: u16) -> TransportEntry {
		TransportEntry {
			name: name.to_string(),
			port,
			kind: kind.to_string(),
			canary: None,
		}
	}

	#[tokio::test]
	async fn test_missing_resource_dir() {
		let dir = tempfile::tempdir().unwrap();
		let missing = dir.path().join("nope");
		let err = check_setup(&config(&missing, vec![]), &RunningLog::new())
			.await
			.unwrap_err();
		assert!(matches!(err, SetupError::ResourceDirMissing { .. }));
	}

	#[tokio::test]
	async fn test_unknown_kind_is_rejected() {
		let dir = tempfile::tempdir().unwrap();
		let err = check_setup(&config(dir.path(), vec![entry("obfs", "obfs4", 1)]), &RunningLog::new())
			.await
			.unwrap_err();
		match err {
			SetupError::UnknownTransport { name, .. } => assert_eq!(name, "obfs"),
			other => panic!("unexpected {other}"),
		}
	}

	#[tokio::test]
	async fn test_missing_config_is_logged() {
		let dir = tempfile::tempdir().unwrap();
		let log = RunningLog::new();
		let err = check_setup(&config(dir.path(), vec![entry("replicant", "replicant", 1)]), &log)
			.await
			.unwrap_err();
		assert!(matches!(err, SetupError::ConfigMissing { .. }));
		assert!(log.text().contains("replicant config not found"));
	}

	#[tokio::test]
	async fn test_resolves_in_order_when_server_listens() {
		let dir = tempfile::tempdir().unwrap();
		for kind in TransportKind::ALL {
			std::fs::write(dir.path().join(kind.config_file()), "{}").unwrap();
		}
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let port = listener.local_addr().unwrap().port();

		let specs = check_setup(
			&config(dir.path(), vec![entry("ss", "shadowsocks", port), entry("rep", "Replicant", port)]),
			&RunningLog::new(),
		)
		.await
		.unwrap();
		assert_eq!(specs.len(), 2);
		assert_eq!(specs[0].kind, TransportKind::Shadowsocks);
		assert_eq!(specs[1].kind, TransportKind::Replicant);
	}

	#[tokio::test]
	async fn test_unreachable_server() {
		let dir = tempfile::tempdir().unwrap();
		std::fs::write(dir.path().join(TransportKind::Shadowsocks.config_file()), "{}").unwrap();
		let port = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap().port();

		let err = check_setup(&config(dir.path(), vec![entry("ss", "shadowsocks", port)]), &RunningLog::new())
			.await
			.unwrap_err();
		assert!(matches!(err, SetupError::ServerUnreachable { .. }));
	}
}
