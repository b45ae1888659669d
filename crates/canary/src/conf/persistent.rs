use std::{
	net::{IpAddr, Ipv4Addr},
	path::{Path, PathBuf},
	time::Duration,
};

use canary_core::types::{TransportEntry, WebCheckSpec};
use educe::Educe;
use figment::{
	Figment,
	providers::{Env, Format, Toml, Yaml},
};
use serde::{Deserialize, Serialize};

const DEFAULT_CANARY: &str = "Yeah!\n";

#[derive(Debug, Deserialize, Serialize, Educe)]
#[educe(Default)]
#[serde(default)]
pub struct PersistentConfig {
	/// Transport server, the positional CLI argument takes precedence
	#[educe(Default = None)]
	#[serde(skip_serializing_if = "Option::is_none")]
	pub server_addr: Option<IpAddr>,

	#[educe(Default = None)]
	#[serde(skip_serializing_if = "Option::is_none")]
	pub resource_dir: Option<PathBuf>,

	#[educe(Default(expression = PathBuf::from("results")))]
	pub results_dir: PathBuf,

	#[educe(Default = 1)]
	pub test_count: u32,

	#[educe(Default = None)]
	#[serde(skip_serializing_if = "Option::is_none")]
	pub interface: Option<String>,

	#[serde(with = "humantime_serde")]
	#[educe(Default(expression = Duration::from_secs(10)))]
	pub connect_timeout: Duration,

	#[serde(with = "humantime_serde")]
	#[educe(Default(expression = Duration::from_secs(30)))]
	pub read_timeout: Duration,

	/// Pack every iteration's results with `tar`
	#[educe(Default = true)]
	pub archive: bool,

	pub connector: ConnectorConfig,

	#[educe(Default(expression = default_transports()))]
	pub transports: Vec<TransportEntry>,

	#[educe(Default(expression = Vec::new()))]
	pub web_checks: Vec<WebCheckSpec>,
}

/// How probe connections are opened.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Educe)]
#[educe(Default)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ConnectorConfig {
	/// Plain TCP straight to the target
	#[educe(Default)]
	Direct {
		#[serde(default)]
		bind_interface: bool,
	},
	/// Through the SOCKS5 listener a transport client opens on each unit's port
	Socks5 {
		#[serde(default = "default_proxy_host")]
		proxy_host: IpAddr,
	},
}

fn default_proxy_host() -> IpAddr {
	IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_transports() -> Vec<TransportEntry> {
	[("shadowsocks", 1234), ("replicant", 2222)]
		.into_iter()
		.map(|(name, port)| TransportEntry {
			name: name.to_string(),
			port,
			kind: name.to_string(),
			canary: Some(DEFAULT_CANARY.to_string()),
		})
		.collect()
}

impl PersistentConfig {
	pub fn export_to_file(&self, file_path: &Path, format: &str) -> eyre::Result<()> {
		let content = match format.to_lowercase().as_str() {
			"yaml" => serde_yaml::to_string(&self)?,
			"toml" => toml::to_string_pretty(&self)?,
			_ => return Err(eyre::eyre!("Unsupported file format: {}", format)),
		};
		std::fs::write(file_path, content)?;

		Ok(())
	}

	pub fn load(config_path: Option<String>, config_dir: Option<PathBuf>) -> eyre::Result<Self> {
		Ok(Self::figment(config_path, config_dir).extract()?)
	}

	fn figment(config_path: Option<String>, config_dir: Option<PathBuf>) -> Figment {
		let mut figment = Figment::new();

		let dir = config_dir.unwrap_or_default();
		let config_toml = dir.join("config.toml");
		if config_toml.exists() {
			figment = figment.merge(Toml::file(config_toml));
		}
		let config_yaml = dir.join("config.yaml");
		if config_yaml.exists() {
			figment = figment.merge(Yaml::file(config_yaml));
		}

		if let Some(config_path) = config_path {
			if config_path.ends_with(".yaml") || config_path.ends_with(".yml") {
				figment = figment.merge(Yaml::file(config_path));
			} else {
				// Anything else is read as TOML
				figment = figment.merge(Toml::file(config_path));
			}
		}

		// Environment variables override config files
		figment.merge(Env::prefixed("CANARY_").split("__"))
	}
}
