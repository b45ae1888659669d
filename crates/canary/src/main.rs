use canary_core::{RunningLog, info, warn};
use canary_runner::TestOrchestrator;
use clap::Parser as _;

use crate::{
	cli::{Cli, Commands},
	conf::{persistent::PersistentConfig, runtime::Config},
};

mod cli;
mod conf;
mod log;

#[tokio::main]
async fn main() -> eyre::Result<()> {
	let cli = match Cli::try_parse() {
		Ok(v) => v,
		Err(err) => {
			println!("{:#}", err);
			return Ok(());
		}
	};

	if cli.version {
		const VER: &str = match option_env!("CANARY_OVERRIDE_VERSION") {
			Some(v) => v,
			None => env!("CARGO_PKG_VERSION"),
		};
		println!("canary {VER}");
		return Ok(());
	}

	log::init_log(cli.log_level)?;

	if let Some(Commands::Init { format }) = &cli.command {
		let path = cli
			.config_dir
			.clone()
			.unwrap_or_default()
			.join(format!("config.{}", format.extension()));
		if path.exists() {
			eyre::bail!("{} already exists", path.display());
		}
		PersistentConfig::default().export_to_file(&path, format.extension())?;
		println!("Wrote default configuration to {}", path.display());
		return Ok(());
	}

	let persistent = PersistentConfig::load(cli.config.clone(), cli.config_dir.clone())?;
	let config = Config::from_persist(persistent, &cli)?;
	let results_dir = config.run.results_dir.clone();
	info!(target: "[MAIN]", "Canary starting against {}", config.run.server_addr);

	let log = RunningLog::new();
	let orchestrator = TestOrchestrator::new(config.run, config.connector, config.archiver, log);
	let report = orchestrator.run().await?;

	info!(
		target: "[MAIN]",
		"{} of {} probes succeeded on {} over {} iteration(s), results in {}",
		report.successes(),
		report.outcomes.len(),
		report.interface,
		report.iterations,
		results_dir.display()
	);
	if !report.all_passed() {
		warn!(target: "[MAIN]", "{} probe(s) failed", report.failures());
		eyre::bail!("{} of {} probes failed", report.failures(), report.outcomes.len());
	}

	Ok(())
}
