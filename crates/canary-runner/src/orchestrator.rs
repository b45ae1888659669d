//! Drive a whole batch: gates first, then every unit in fixed order.
//!
//! Each iteration probes the configured transports in declared order followed
//! by the web checks in declared order. A failing unit never stops the batch,
//! it only changes that unit's outcome.

use std::path::{Path, PathBuf};

use canary_core::{
	AbstractConnector, RunningLog, SyncBridge, info,
	running_log::BatchInProgressSnafu,
	types::{TestUnit, UnitTarget},
	warn,
};
use canary_probe::{ConnectivityProbe, FailureKind, ProbeOutcome};
use snafu::prelude::*;

use crate::{
	Archiver, InterfaceSource, NoIterationsSnafu, RunConfig, RunError, SystemInterfaces, interface::resolve_interface,
	setup::check_setup,
};

/// What a finished batch produced.
#[derive(Clone, Debug)]
pub struct BatchReport {
	/// Every unit outcome in execution order
	pub outcomes:   Vec<ProbeOutcome>,
	pub iterations: u32,
	pub interface:  String,
}

impl BatchReport {
	pub fn successes(&self) -> usize {
		self.outcomes.iter().filter(|outcome| outcome.success).count()
	}

	pub fn failures(&self) -> usize {
		self.outcomes.len() - self.successes()
	}

	pub fn all_passed(&self) -> bool {
		self.outcomes.iter().all(|outcome| outcome.success)
	}
}

pub struct TestOrchestrator<C, A, I = SystemInterfaces> {
	config:     RunConfig,
	connector:  C,
	archiver:   A,
	interfaces: I,
	log:        RunningLog,
}

impl<C, A> TestOrchestrator<C, A> {
	pub fn new(config: RunConfig, connector: C, archiver: A, log: RunningLog) -> Self {
		Self {
			config,
			connector,
			archiver,
			interfaces: SystemInterfaces,
			log,
		}
	}
}

impl<C, A, I> TestOrchestrator<C, A, I> {
	/// Replace where interface names are enumerated from.
	pub fn with_interfaces<J>(self, interfaces: J) -> TestOrchestrator<C, A, J> {
		TestOrchestrator {
			config: self.config,
			connector: self.connector,
			archiver: self.archiver,
			interfaces,
			log: self.log,
		}
	}

	pub fn config(&self) -> &RunConfig {
		&self.config
	}

	pub fn log(&self) -> &RunningLog {
		&self.log
	}
}

impl<C, A, I> TestOrchestrator<C, A, I>
where
	C: AbstractConnector,
	A: Archiver,
	I: InterfaceSource,
{
	/// Run `test_count` iterations over every configured unit.
	pub async fn run(&self) -> Result<BatchReport, RunError> {
		let iterations = self.config.test_count;
		ensure!(iterations >= 1, NoIterationsSnafu);
		ensure!(!self.log.tests_running(), BatchInProgressSnafu);

		let transports = check_setup(&self.config, &self.log).await?;
		let interface = resolve_interface(self.config.interface.as_deref(), &self.interfaces, &self.log)?;
		let _batch = self.log.begin_batch()?;

		info!(target: "[BATCH]", "starting {iterations} iteration(s) on {interface}");
		let mut outcomes = Vec::new();
		for iteration in 1..=iterations {
			self.log
				.append(format!("\n🧪 Running test batch {iteration} of {iterations}\n"));

			let targets = transports
				.iter()
				.map(UnitTarget::Transport)
				.chain(self.config.web_checks.iter().map(UnitTarget::Web));
			let mut current = Vec::new();
			for target in targets {
				let unit = TestUnit {
					server: self.config.server_addr,
					interface: &interface,
					target,
				};
				let outcome = self.probe_unit(&unit).await;
				self.log.append(format!("{outcome}\n"));
				current.push(outcome);
			}

			self.finish_iteration(iteration, &current).await;
			outcomes.extend(current);
		}

		self.log.append("\n🏁 Canary tests are complete.\n");
		Ok(BatchReport {
			outcomes,
			iterations,
			interface,
		})
	}

	async fn probe_unit(&self, unit: &TestUnit<'_>) -> ProbeOutcome {
		info!(target: "[BATCH]", "testing {unit}");
		let connection = match self.connector.connect(unit).await {
			Ok(connection) => connection,
			Err(err) => {
				warn!(target: "[BATCH]", "failed to connect for {}: {err:?}", unit.name());
				return ProbeOutcome::failed(unit.name(), FailureKind::ConnectFailed, format!("Failed to connect: {err}"));
			}
		};

		let bridge = SyncBridge::with_timeout(self.config.read_timeout);
		let result = ConnectivityProbe::new(&connection, bridge, &self.log)
			.with_canary(unit.canary())
			.run()
			.await;
		ProbeOutcome::from_result(unit.name(), result)
	}

	/// Persist the iteration's outcomes and hand them to the archiver.
	///
	/// Failures here are logged and never end the batch.
	async fn finish_iteration(&self, iteration: u32, outcomes: &[ProbeOutcome]) {
		let dir = self.config.results_dir.join(format!("iteration-{iteration}"));
		if let Err(err) = write_outcomes(&dir, outcomes).await {
			warn!(target: "[BATCH]", "failed to save results to {}: {err}", dir.display());
			self.log
				.append(format!("\nCould not save results for iteration {iteration}: {err}\n"));
			return;
		}

		match self.archiver.archive(&dir).await {
			Ok(archive) => info!(target: "[BATCH]", "iteration {iteration} results at {}", archive.display()),
			Err(err) => {
				warn!(target: "[BATCH]", "failed to archive {}: {err:?}", dir.display());
				self.log
					.append(format!("\nCould not archive results for iteration {iteration}: {err}\n"));
			}
		}
	}
}

async fn write_outcomes(dir: &Path, outcomes: &[ProbeOutcome]) -> std::io::Result<PathBuf> {
	tokio::fs::create_dir_all(dir).await?;
	let path = dir.join("outcomes.txt");
	let text = outcomes
		.iter()
		.map(|outcome| format!("{outcome}\n"))
		.collect::<String>();
	tokio::fs::write(&path, text).await?;
	Ok(path)
}
