use std::{
	future::Future,
	path::{Path, PathBuf},
};

use canary_core::info;
use eyre::{OptionExt, bail};
use tokio::process::Command;

/// Packs one iteration's results directory once the iteration is over.
pub trait Archiver: Send + Sync {
	/// Returns the path of the produced archive.
	fn archive(&self, dir: &Path) -> impl Future<Output = eyre::Result<PathBuf>> + Send;
}

/// `tar -czf <dir>.tar.gz` next to the directory.
#[derive(Clone, Copy, Debug, Default)]
pub struct TarArchiver;

impl Archiver for TarArchiver {
	async fn archive(&self, dir: &Path) -> eyre::Result<PathBuf> {
		let parent = dir.parent().ok_or_eyre("results directory has no parent")?;
		let name = dir.file_name().ok_or_eyre("results directory has no name")?;

		let mut file_name = name.to_os_string();
		file_name.push(".tar.gz");
		let target = parent.join(file_name);

		let output = Command::new("tar")
			.arg("-czf")
			.arg(&target)
			.arg("-C")
			.arg(parent)
			.arg(name)
			.output()
			.await?;
		if !output.status.success() {
			bail!(
				"tar exited with {}: {}",
				output.status,
				String::from_utf8_lossy(&output.stderr).trim()
			);
		}

		info!(target: "[ARCHIVE]", "archived {} to {}", dir.display(), target.display());
		Ok(target)
	}
}

/// Leaves results where they are.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoArchive;

impl Archiver for NoArchive {
	async fn archive(&self, dir: &Path) -> eyre::Result<PathBuf> {
		Ok(dir.to_path_buf())
	}
}
