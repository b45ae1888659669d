//! Pick the network interface a batch runs on.

use std::io;

use canary_core::{RunningLog, info};
use snafu::prelude::*;

use crate::{EnumerateSnafu, InterfaceError, NoCandidateSnafu};

/// Somewhere to list local interface names from.
pub trait InterfaceSource: Send + Sync {
	fn interface_names(&self) -> io::Result<Vec<String>>;
}

/// Interfaces of the running host.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemInterfaces;

impl InterfaceSource for SystemInterfaces {
	#[cfg(unix)]
	fn interface_names(&self) -> io::Result<Vec<String>> {
		// getifaddrs yields one entry per address, so names repeat
		let mut names = nix::ifaddrs::getifaddrs()
			.map_err(io::Error::from)?
			.map(|ifaddr| ifaddr.interface_name)
			.collect::<Vec<_>>();
		names.sort();
		names.dedup();
		Ok(names)
	}

	#[cfg(not(unix))]
	fn interface_names(&self) -> io::Result<Vec<String>> {
		Err(io::Error::new(
			io::ErrorKind::Unsupported,
			"interface enumeration is not supported on this platform",
		))
	}
}

impl<T: InterfaceSource + ?Sized> InterfaceSource for &T {
	fn interface_names(&self) -> io::Result<Vec<String>> {
		(**self).interface_names()
	}
}

/// The lowest sorted name starting with `e` (`en0`, `eth0`, ...).
pub fn guess_interface<S: AsRef<str>>(names: &[S]) -> Option<String> {
	let mut names = names.iter().map(AsRef::as_ref).collect::<Vec<_>>();
	names.sort_unstable();
	names
		.into_iter()
		.find(|name| name.starts_with('e'))
		.map(str::to_owned)
}

/// Use `explicit` verbatim, otherwise guess from what `source` reports.
pub fn resolve_interface(
	explicit: Option<&str>,
	source: &impl InterfaceSource,
	log: &RunningLog,
) -> Result<String, InterfaceError> {
	if let Some(name) = explicit {
		info!(target: "[IFACE]", "using interface {name} as requested");
		log.append(format!("\nSelected an interface for running test: {name}\n"));
		return Ok(name.to_owned());
	}

	let mut available = source.interface_names().context(EnumerateSnafu)?;
	available.sort();
	available.dedup();
	log.append(format!("\nAvailable interfaces: {}\n", available.join(", ")));

	match guess_interface(available.as_slice()) {
		Some(name) => {
			log.append(format!("Selected an interface for running test: {name}\n"));
			Ok(name)
		}
		None => {
			log.append("\nUnable to guess the interface name. Pass one explicitly with --interface.\n");
			NoCandidateSnafu { available }.fail()
		}
	}
}
