//! Logging prelude module for convenient access to tracing macros.
//!
//! ```ignore
//! use crate::logging::*;
//!
//! info!("Remote inventory: {} files", count);
//! debug!("hash_of {}", path);
//! ```

pub use tracing::{debug, error, info, warn};

/// Initialize the tracing subscriber with environment filter support.
///
/// `RUST_LOG` takes precedence when set. Otherwise `default_level` is applied to
/// this crate only, so dependencies stay quiet:
///
/// ```bash
/// RUST_LOG=picosync=debug picosync sync
/// RUST_LOG=picosync::remote=trace picosync sync
/// ```
pub fn init_tracing(default_level: &str) {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		tracing_subscriber::EnvFilter::new(format!("warn,picosync={}", default_level))
	});

	// A second init (e.g. from tests) is not an error worth reporting
	let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

/// Map `-v`/`-q` counts onto a level name
pub fn level_for(verbose: u8, quiet: bool) -> &'static str {
	if quiet {
		return "error";
	}
	match verbose {
		0 => "info",
		1 => "debug",
		_ => "trace",
	}
}
