//! Console display of sync events
//!
//! Per-file lines go to stdout as they happen; they are not log records, so
//! `RUST_LOG` never hides them.

pub mod constants;

use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use crate::engine::{SyncDecision, SyncEvent, SyncObserver, SyncReport};

pub use constants::*;

/// Prints one line per event
pub struct ConsoleReporter<W: Write + Send> {
	out: Mutex<W>,
	dry_run: bool,
	show_unchanged: bool,
}

impl ConsoleReporter<std::io::Stdout> {
	pub fn stdout(dry_run: bool) -> Self {
		Self::new(std::io::stdout(), dry_run)
	}
}

impl<W: Write + Send> ConsoleReporter<W> {
	pub fn new(out: W, dry_run: bool) -> Self {
		Self { out: Mutex::new(out), dry_run, show_unchanged: true }
	}

	/// Hide `[SKIP same]` lines
	pub fn hide_unchanged(mut self) -> Self {
		self.show_unchanged = false;
		self
	}

	pub fn into_inner(self) -> W {
		self.out.into_inner().unwrap_or_else(|e| e.into_inner())
	}

	fn line(&self, text: &str) {
		let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
		let prefix = if self.dry_run { DRY_RUN_PREFIX } else { "" };
		let _ = writeln!(out, "{}{}", prefix, text);
		let _ = out.flush();
	}
}

impl<W: Write + Send> SyncObserver for ConsoleReporter<W> {
	fn on_event(&self, event: SyncEvent) {
		match event {
			SyncEvent::InventoryLoaded { .. } => {}
			SyncEvent::FileDecided { entry, decision, .. } => match decision {
				SyncDecision::SkipUnchanged => {
					if self.show_unchanged {
						self.line(&format!("[SKIP same] {}", entry.remote_path));
					}
				}
				SyncDecision::UploadNew | SyncDecision::UploadModified => {
					self.line(&format!(
						"[UPLOAD {}] {} {} {}",
						decision.label(),
						entry.local_path.display(),
						ARROW,
						entry.remote_path
					));
				}
			},
			SyncEvent::Deleted { path } => self.line(&format!("[DELETE] {}", path)),
			SyncEvent::DirectoryRemoved { path } => self.line(&format!("[RMDIR] {}", path)),
		}
	}
}

/// One-paragraph summary of a finished run
pub fn format_summary(report: &SyncReport, source: &Path) -> String {
	let mut text = format!(
		"{} {}: {} new, {} modified, {} unchanged, {} deleted, {} dirs removed ({}) in {:.1}s",
		if report.dry_run { "Dry run of" } else { "Synced" },
		source.display(),
		report.uploaded_new,
		report.uploaded_modified,
		report.skipped,
		report.deleted.len(),
		report.removed_dirs.len(),
		format_bytes(report.bytes_uploaded),
		report.elapsed.as_secs_f64()
	);
	if report.files_excluded + report.dirs_pruned > 0 {
		text.push_str(&format!(
			"; ignored {} files and {} directories",
			report.files_excluded, report.dirs_pruned
		));
	}
	if report.is_noop() && !report.dry_run {
		text.push_str("; target already up to date");
	}
	text
}

/// Human-readable byte count
pub fn format_bytes(bytes: u64) -> String {
	if bytes < BYTES_PER_KB {
		format!("{} B", bytes)
	} else if bytes < BYTES_PER_KB * BYTES_PER_KB {
		format!("{:.1} KiB", bytes as f64 / BYTES_PER_KB as f64)
	} else {
		format!("{:.1} MiB", bytes as f64 / (BYTES_PER_KB * BYTES_PER_KB) as f64)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::scan::FileEntry;
	use std::path::PathBuf;

	fn entry(rel: &str) -> FileEntry {
		FileEntry {
			local_path: PathBuf::from("src").join(rel),
			relative_path: rel.to_string(),
			remote_path: format!("/{}", rel),
		}
	}

	fn render(reporter: ConsoleReporter<Vec<u8>>) -> String {
		String::from_utf8(reporter.into_inner()).unwrap()
	}

	#[test]
	fn test_event_lines() {
		let reporter = ConsoleReporter::new(Vec::new(), false);
		reporter.on_event(SyncEvent::FileDecided {
			entry: entry("a.txt"),
			decision: SyncDecision::UploadNew,
			size: 2,
		});
		reporter.on_event(SyncEvent::FileDecided {
			entry: entry("b.txt"),
			decision: SyncDecision::SkipUnchanged,
			size: 2,
		});
		reporter.on_event(SyncEvent::Deleted { path: "/old.py".to_string() });
		reporter.on_event(SyncEvent::DirectoryRemoved { path: "/lib".to_string() });

		let text = render(reporter);
		let lines: Vec<&str> = text.lines().collect();
		assert_eq!(lines[0], format!("[UPLOAD new] {} → /a.txt", PathBuf::from("src/a.txt").display()));
		assert_eq!(lines[1], "[SKIP same] /b.txt");
		assert_eq!(lines[2], "[DELETE] /old.py");
		assert_eq!(lines[3], "[RMDIR] /lib");
	}

	#[test]
	fn test_dry_run_prefix_and_hidden_skips() {
		let reporter = ConsoleReporter::new(Vec::new(), true).hide_unchanged();
		reporter.on_event(SyncEvent::FileDecided {
			entry: entry("b.txt"),
			decision: SyncDecision::SkipUnchanged,
			size: 2,
		});
		reporter.on_event(SyncEvent::Deleted { path: "/old.py".to_string() });
		assert_eq!(render(reporter), "(dry run) [DELETE] /old.py\n");
	}

	#[test]
	fn test_summary() {
		let report = SyncReport {
			uploaded_new: 2,
			bytes_uploaded: 2048,
			files_excluded: 1,
			..SyncReport::default()
		};
		let text = format_summary(&report, Path::new("src"));
		assert!(text.starts_with("Synced src: 2 new, 0 modified"));
		assert!(text.contains("(2.0 KiB)"));
		assert!(text.contains("ignored 1 files and 0 directories"));

		let noop = format_summary(&SyncReport::default(), Path::new("src"));
		assert!(noop.ends_with("target already up to date"));
	}

	#[test]
	fn test_format_bytes() {
		assert_eq!(format_bytes(12), "12 B");
		assert_eq!(format_bytes(1536), "1.5 KiB");
		assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MiB");
	}
}

// vim: ts=4
