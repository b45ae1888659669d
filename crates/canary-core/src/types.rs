use std::{
	fmt::Display,
	net::IpAddr,
	path::{Path, PathBuf},
	str::FromStr,
};

use serde::{Deserialize, Serialize};
use snafu::Snafu;

/// Transports the harness knows how to set up.
///
/// Every kind maps to exactly one client config file that has to be present in
/// the resource directory before a batch may start.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
	Shadowsocks,
	Replicant,
}

impl TransportKind {
	pub const ALL: [TransportKind; 2] = [TransportKind::Shadowsocks, TransportKind::Replicant];

	pub const fn name(&self) -> &'static str {
		match self {
			TransportKind::Shadowsocks => "shadowsocks",
			TransportKind::Replicant => "replicant",
		}
	}

	/// Path of the client config, relative to the resource directory.
	pub const fn config_file(&self) -> &'static str {
		match self {
			TransportKind::Shadowsocks => "ShadowSocksClientConfig.json",
			TransportKind::Replicant => "ReplicantClientConfig.json",
		}
	}
}

impl Display for TransportKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.name())
	}
}

#[derive(Debug, Snafu)]
#[snafu(display("no transport kind named {kind:?}"))]
pub struct UnknownTransportKind {
	pub kind: String,
}

impl FromStr for TransportKind {
	type Err = UnknownTransportKind;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		TransportKind::ALL
			.into_iter()
			.find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
			.ok_or_else(|| UnknownTransportKind { kind: s.to_owned() })
	}
}

/// A transport as written in the configuration, before its kind is checked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportEntry {
	pub name:   String,
	pub port:   u16,
	pub kind:   String,
	/// Body the test server is expected to send back through this transport
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub canary: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportSpec {
	pub name:   String,
	pub port:   u16,
	pub kind:   TransportKind,
	pub canary: Option<String>,
}

impl TransportSpec {
	pub fn from_entry(entry: &TransportEntry) -> Result<Self, UnknownTransportKind> {
		Ok(Self {
			name:   entry.name.clone(),
			port:   entry.port,
			kind:   entry.kind.parse()?,
			canary: entry.canary.clone(),
		})
	}

	pub fn config_path(&self, resource_dir: &Path) -> PathBuf {
		resource_dir.join(self.kind.config_file())
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebCheckSpec {
	pub name:    String,
	pub port:    u16,
	pub website: String,
}

#[derive(Clone, Copy, Debug)]
pub enum UnitTarget<'a> {
	Transport(&'a TransportSpec),
	Web(&'a WebCheckSpec),
}

/// One cell of a batch: what the connector needs to open a connection.
#[derive(Clone, Copy, Debug)]
pub struct TestUnit<'a> {
	pub server:    IpAddr,
	pub interface: &'a str,
	pub target:    UnitTarget<'a>,
}

impl<'a> TestUnit<'a> {
	pub fn name(&self) -> &'a str {
		match self.target {
			UnitTarget::Transport(spec) => &spec.name,
			UnitTarget::Web(spec) => &spec.name,
		}
	}

	pub fn port(&self) -> u16 {
		match self.target {
			UnitTarget::Transport(spec) => spec.port,
			UnitTarget::Web(spec) => spec.port,
		}
	}

	/// Web checks never carry a canary, any well formed response passes.
	pub fn canary(&self) -> Option<&'a str> {
		match self.target {
			UnitTarget::Transport(spec) => spec.canary.as_deref(),
			UnitTarget::Web(_) => None,
		}
	}
}

impl Display for TestUnit<'_> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self.target {
			UnitTarget::Transport(spec) => write!(f, "{} ({}) via {}:{}", spec.name, spec.kind, self.server, spec.port),
			UnitTarget::Web(spec) => write!(f, "{} ({}) via port {}", spec.name, spec.website, spec.port),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_kind_from_str() {
		assert_eq!("shadowsocks".parse::<TransportKind>().unwrap(), TransportKind::Shadowsocks);
		assert_eq!("Replicant".parse::<TransportKind>().unwrap(), TransportKind::Replicant);
		let err = "obfs4".parse::<TransportKind>().unwrap_err();
		assert_eq!(err.kind, "obfs4");
	}

	#[test]
	fn test_every_kind_has_distinct_config_file() {
		let files: Vec<_> = TransportKind::ALL.iter().map(|kind| kind.config_file()).collect();
		assert_eq!(files.len(), 2);
		assert_ne!(files[0], files[1]);
	}

	#[test]
	fn test_spec_from_entry() {
		let entry = TransportEntry {
			name:   "ss".to_string(),
			port:   1234,
			kind:   "shadowsocks".to_string(),
			canary: Some("Yeah!\n".to_string()),
		};
		let spec = TransportSpec::from_entry(&entry).unwrap();
		assert_eq!(spec.kind, TransportKind::Shadowsocks);
		assert_eq!(
			spec.config_path(Path::new("/res")),
			PathBuf::from("/res/ShadowSocksClientConfig.json")
		);
	}

	#[test]
	fn test_spec_from_unknown_entry() {
		let entry = TransportEntry {
			name:   "meek".to_string(),
			port:   1,
			kind:   "meek".to_string(),
			canary: None,
		};
		assert!(TransportSpec::from_entry(&entry).is_err());
	}

	#[test]
	fn test_deserialize_entry_without_canary() {
		let entry: TransportEntry = serde_json::from_str(r#"{"name":"r","port":2222,"kind":"replicant"}"#).unwrap();
		assert_eq!(entry.canary, None);
		assert_eq!(entry.port, 2222);
	}

	#[test]
	fn test_web_unit_has_no_canary() {
		let web = WebCheckSpec {
			name:    "web".to_string(),
			port:    80,
			website: "example.com".to_string(),
		};
		let unit = TestUnit {
			server:    "127.0.0.1".parse().unwrap(),
			interface: "eth0",
			target:    UnitTarget::Web(&web),
		};
		assert_eq!(unit.name(), "web");
		assert_eq!(unit.port(), 80);
		assert_eq!(unit.canary(), None);
	}
}
