use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use tracing::Level;

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
pub struct Cli {
	/// IP address of the transport server
	#[arg(value_name = "SERVER_IP")]
	pub server_ip: Option<String>,

	/// Directory holding the transport client configs
	#[arg(long, value_name = "PATH")]
	pub resource_dir: Option<PathBuf>,

	/// How many times to run the whole batch
	#[arg(short = 'n', long, value_parser = clap::value_parser!(u32).range(1..))]
	pub test_count: Option<u32>,

	/// Network interface to test on, guessed when omitted
	#[arg(short, long, value_name = "NAME")]
	pub interface: Option<String>,

	/// Set a custom config
	#[arg(short, visible_short_alias = 'f', long, value_name = "FILE")]
	pub config: Option<String>,

	/// Set configuration directory
	#[arg(short = 'C', visible_short_alias = 'd', long, value_name = "PATH")]
	pub config_dir: Option<PathBuf>,

	#[arg(long, default_value = "info")]
	pub log_level: Level,

	/// Show current version
	#[arg(short = 'v', visible_short_alias = 'V', long, action = ArgAction::SetTrue)]
	pub version: bool,

	#[command(subcommand)]
	pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Initialize a new default configuration file
	Init {
		/// Specify the configuration file format (yaml or toml)
		#[arg(short, long, value_enum, default_value = "yaml")]
		format: ConfigFormat,
	},
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum ConfigFormat {
	Yaml,
	Toml,
}

impl ConfigFormat {
	pub fn extension(self) -> &'static str {
		match self {
			ConfigFormat::Yaml => "yaml",
			ConfigFormat::Toml => "toml",
		}
	}
}
