//! Configuration for picosync
//!
//! The configuration follows a priority chain:
//! 1. Built-in defaults (Config::default())
//! 2. Project config file (`picosync.toml` or `picosync.json5` in the
//!    working directory, or the file named by `--config`)
//! 3. CLI flags (highest priority, applied by the binary)
//!
//! Transport selection lives in [`TargetConfig`] and is handed to
//! [`open_store`](crate::remote::open_store); nothing is read from the
//! process environment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::SyncError;
use crate::hash::HashAlgorithm;
use crate::logging::*;

/// Config file names looked up in the working directory, in order
pub const CONFIG_FILE_NAMES: &[&str] = &["picosync.toml", "picosync.json5"];

/// Unified configuration for a picosync run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
	/// Local directory mirrored onto the target
	pub source_dir: PathBuf,

	/// Name of the ignore-rule file inside `source_dir`
	pub ignore_file: String,

	/// Where the files go
	pub target: TargetConfig,

	/// Digest used to compare local and remote content
	pub hash_algorithm: HashAlgorithm,

	/// Report decisions without changing the target
	pub dry_run: bool,

	/// Remove directories left empty after deletions
	pub prune_empty_dirs: bool,

	/// Log level (trace, debug, info, warn, error)
	pub log_level: String,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			source_dir: PathBuf::from("src"),
			ignore_file: ".picoignore".to_string(),
			target: TargetConfig::default(),
			hash_algorithm: HashAlgorithm::Sha256,
			dry_run: false,
			prune_empty_dirs: true,
			log_level: "info".to_string(),
		}
	}
}

/// Target file store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TargetConfig {
	/// MicroPython board on a serial port, driven by `mpremote`
	Serial(SerialTarget),

	/// Locally mounted directory
	Directory { path: PathBuf },
}

impl Default for TargetConfig {
	fn default() -> Self {
		TargetConfig::Serial(SerialTarget::default())
	}
}

/// Serial transport settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SerialTarget {
	/// Serial device of the board
	pub port: String,

	/// Transport helper executable
	pub command: String,

	/// Per-request timeout in seconds
	pub timeout_secs: u64,

	/// Largest raw payload sent in one write request
	pub write_chunk_size: usize,
}

impl Default for SerialTarget {
	fn default() -> Self {
		SerialTarget {
			port: "/dev/ttyACM0".to_string(),
			command: "mpremote".to_string(),
			timeout_secs: 30,
			write_chunk_size: 16 * 1024,
		}
	}
}

impl Config {
	/// Load a config file, choosing the parser by extension
	///
	/// `.json5` and `.json` files are parsed as JSON5, everything else as TOML.
	pub fn from_file(path: &Path) -> Result<Config, SyncError> {
		let text = std::fs::read_to_string(path)
			.map_err(|e| SyncError::config(format!("{}: {}", path.display(), e)))?;
		let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
		let parsed = match ext {
			"json5" | "json" => json5::from_str(&text).map_err(|e| e.to_string()),
			_ => toml::from_str(&text).map_err(|e| e.to_string()),
		};
		parsed.map_err(|e| SyncError::config(format!("{}: {}", path.display(), e)))
	}

	/// Find the project config file in `dir`, if there is one
	pub fn discover(dir: &Path) -> Option<PathBuf> {
		CONFIG_FILE_NAMES.iter().map(|name| dir.join(name)).find(|p| p.is_file())
	}

	/// Defaults overlaid with the explicit file, or the discovered one
	pub fn load(explicit: Option<&Path>, cwd: &Path) -> Result<Config, SyncError> {
		let path = match explicit {
			Some(p) => Some(p.to_path_buf()),
			None => Config::discover(cwd),
		};
		match path {
			Some(p) => {
				debug!("Loading config from {}", p.display());
				Config::from_file(&p)
			}
			None => Ok(Config::default()),
		}
	}

	/// Point the serial target at `port`, switching to serial if needed
	pub fn set_port(&mut self, port: &str) {
		match &mut self.target {
			TargetConfig::Serial(serial) => serial.port = port.to_string(),
			TargetConfig::Directory { .. } => {
				self.target = TargetConfig::Serial(SerialTarget {
					port: port.to_string(),
					..SerialTarget::default()
				})
			}
		}
	}
}


// vim: ts=4
