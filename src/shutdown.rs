//! Cooperative cancellation for sync runs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::logging::*;

/// Shared "stop at the next file boundary" flag
///
/// A remote call already in flight is never interrupted; the engine checks
/// the flag between files and between deletions.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn request(&self) {
		self.0.store(true, Ordering::SeqCst);
	}

	pub fn is_requested(&self) -> bool {
		self.0.load(Ordering::SeqCst)
	}
}

/// Set `flag` on SIGINT/SIGTERM; a second signal exits immediately
///
/// Must be called from within a tokio runtime.
pub fn setup_signal_handlers(flag: ShutdownFlag) {
	tokio::spawn(async move {
		loop {
			if !wait_for_signal().await {
				return;
			}
			if flag.is_requested() {
				debug!("Second interrupt, exiting");
				std::process::exit(130); // 128 + SIGINT(2)
			}
			warn!("Interrupted, stopping after the current file (press Ctrl-C again to quit)");
			flag.request();
		}
	});
}

#[cfg(unix)]
async fn wait_for_signal() -> bool {
	use tokio::signal;

	let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
		Ok(stream) => stream,
		Err(e) => {
			warn!("Failed to setup SIGTERM handler: {}", e);
			return false;
		}
	};

	tokio::select! {
		_ = sigterm.recv() => true,
		r = signal::ctrl_c() => r.is_ok(),
	}
}

#[cfg(not(unix))]
async fn wait_for_signal() -> bool {
	tokio::signal::ctrl_c().await.is_ok()
}


// vim: ts=4
