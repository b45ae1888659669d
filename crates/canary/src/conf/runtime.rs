use std::{
	net::IpAddr,
	path::{Path, PathBuf},
};

use canary_core::{AbstractConnector, BoxedConnection, info, types::TestUnit};
use canary_runner::{Archiver, NoArchive, RunConfig, TarArchiver};
use canary_socks::{DirectConnector, Socks5Connector};
use eyre::{OptionExt as _, WrapErr as _};

use super::persistent::{ConnectorConfig, PersistentConfig};
use crate::cli::Cli;

/// Relative to the working directory when nothing else is configured.
const DEFAULT_RESOURCE_DIR: &str = "Sources/Resources";

pub enum Connectors {
	Direct(DirectConnector),
	Socks5(Socks5Connector),
}

impl AbstractConnector for Connectors {
	type Connection = BoxedConnection;

	async fn connect(&self, unit: &TestUnit<'_>) -> eyre::Result<BoxedConnection> {
		match self {
			Connectors::Direct(connector) => connector.connect(unit).await,
			Connectors::Socks5(connector) => connector.connect(unit).await,
		}
	}
}

pub enum Archivers {
	Tar(TarArchiver),
	Keep(NoArchive),
}

impl Archiver for Archivers {
	async fn archive(&self, dir: &Path) -> eyre::Result<PathBuf> {
		match self {
			Archivers::Tar(archiver) => archiver.archive(dir).await,
			Archivers::Keep(archiver) => archiver.archive(dir).await,
		}
	}
}

pub struct Config {
	pub run:       RunConfig,
	pub connector: Connectors,
	pub archiver:  Archivers,
}

impl Config {
	/// Merge the loaded config with command line overrides.
	pub fn from_persist(config: PersistentConfig, cli: &Cli) -> eyre::Result<Self> {
		let server_addr = match cli.server_ip.as_deref() {
			Some(ip) => ip
				.parse::<IpAddr>()
				.wrap_err_with(|| format!("{ip} is not a valid IP address"))?,
			None => config
				.server_addr
				.ok_or_eyre("A transport server IP address is required")?,
		};

		let resource_dir = match cli.resource_dir.clone().or(config.resource_dir) {
			Some(dir) => dir,
			None => {
				let dir = std::env::current_dir()?.join(DEFAULT_RESOURCE_DIR);
				info!(target: "[CONF]", "Using the default resource directory: {}", dir.display());
				dir
			}
		};

		let connector = match config.connector {
			ConnectorConfig::Direct { bind_interface } => {
				Connectors::Direct(DirectConnector::new(config.connect_timeout, bind_interface))
			}
			ConnectorConfig::Socks5 { proxy_host } => {
				Connectors::Socks5(Socks5Connector::new(proxy_host, config.connect_timeout))
			}
		};
		let archiver = if config.archive {
			Archivers::Tar(TarArchiver)
		} else {
			Archivers::Keep(NoArchive)
		};

		Ok(Self {
			run: RunConfig {
				server_addr,
				test_count: cli.test_count.unwrap_or(config.test_count),
				transports: config.transports,
				web_checks: config.web_checks,
				resource_dir,
				results_dir: config.results_dir,
				interface: cli.interface.clone().or(config.interface),
				connect_timeout: config.connect_timeout,
				read_timeout: config.read_timeout,
			},
			connector,
			archiver,
		})
	}
}
