//! One-way mirror of a local tree onto a remote store
//!
//! A run goes through four phases, each finishing before the next starts:
//!
//! 1. Snapshot the remote inventory (one recursive listing)
//! 2. Walk the local tree; hash, classify and upload each file in scan order
//! 3. Delete every inventory path no local file maps to
//! 4. Remove directories left empty
//!
//! Any failed remote request aborts the run. Nothing is retried and nothing
//! already written is rolled back.
//!
//! # Example Usage
//!
//! ```ignore
//! use picosync::engine::{SyncEngine, SyncEvent, SyncOptions};
//! use picosync::remote::MemoryStore;
//!
//! let mut store = MemoryStore::new();
//! let report = SyncEngine::new(&mut store, SyncOptions::default())
//!     .with_observer(|event: SyncEvent| println!("{:?}", event))
//!     .run(Path::new("src"))
//!     .await?;
//! ```

use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::error::SyncError;
use crate::exclusion::IgnoreSet;
use crate::logging::*;
use crate::remote::{ancestors_of, parent_of, RemoteStore};
use crate::scan::{FileEntry, LocalScanner};
use crate::shutdown::ShutdownFlag;

/// Outcome of comparing one local file against the remote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
	/// Remote content hash equals the local one
	SkipUnchanged,

	/// No file at the remote path
	UploadNew,

	/// Remote file exists with different content
	UploadModified,
}

impl SyncDecision {
	pub fn is_upload(self) -> bool {
		!matches!(self, SyncDecision::SkipUnchanged)
	}

	pub fn label(self) -> &'static str {
		match self {
			SyncDecision::SkipUnchanged => "unchanged",
			SyncDecision::UploadNew => "new",
			SyncDecision::UploadModified => "modified",
		}
	}
}

/// Something the engine did (or, in a dry run, would have done)
///
/// Events are emitted one at a time, right after the action completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
	/// Remote snapshot taken
	InventoryLoaded { files: usize },

	/// A local file was classified and, for uploads, written
	FileDecided { entry: FileEntry, decision: SyncDecision, size: u64 },

	/// An unreferenced remote file was removed
	Deleted { path: String },

	/// A remote directory left empty was removed
	DirectoryRemoved { path: String },
}

/// Receives engine events as they happen
pub trait SyncObserver: Send + Sync {
	fn on_event(&self, _event: SyncEvent) {}
}

impl<T: Fn(SyncEvent) + Send + Sync> SyncObserver for T {
	fn on_event(&self, event: SyncEvent) {
		self(event);
	}
}

/// Observer that ignores every event
pub struct NoObserver;

impl SyncObserver for NoObserver {}

/// Knobs for one run
#[derive(Debug, Clone)]
pub struct SyncOptions {
	/// Classify and report, but issue no mutating request
	pub dry_run: bool,

	/// Remove empty remote directories after deletions
	pub prune_empty_dirs: bool,

	/// Rule file name inside the sync root
	pub ignore_file: String,

	/// Checked between files and between deletions
	pub cancel: Option<ShutdownFlag>,
}

impl Default for SyncOptions {
	fn default() -> Self {
		SyncOptions {
			dry_run: false,
			prune_empty_dirs: true,
			ignore_file: ".picoignore".to_string(),
			cancel: None,
		}
	}
}

impl From<&Config> for SyncOptions {
	fn from(config: &Config) -> Self {
		SyncOptions {
			dry_run: config.dry_run,
			prune_empty_dirs: config.prune_empty_dirs,
			ignore_file: config.ignore_file.clone(),
			cancel: None,
		}
	}
}

/// Totals for a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
	pub uploaded_new: usize,
	pub uploaded_modified: usize,
	pub skipped: usize,

	/// Remote files removed, in deletion order
	pub deleted: Vec<String>,

	/// Remote directories removed, in removal order
	pub removed_dirs: Vec<String>,

	/// Payload bytes of every upload (planned ones in a dry run)
	pub bytes_uploaded: u64,

	/// Local directories pruned by an ignore rule
	pub dirs_pruned: usize,

	/// Local files excluded by an ignore rule
	pub files_excluded: usize,

	pub dry_run: bool,
	pub elapsed: Duration,
}

impl SyncReport {
	pub fn uploads(&self) -> usize {
		self.uploaded_new + self.uploaded_modified
	}

	/// Nothing was (or would be) changed on the remote
	pub fn is_noop(&self) -> bool {
		self.uploads() == 0 && self.deleted.is_empty() && self.removed_dirs.is_empty()
	}

	fn record(&mut self, decision: SyncDecision, size: u64) {
		match decision {
			SyncDecision::SkipUnchanged => self.skipped += 1,
			SyncDecision::UploadNew => self.uploaded_new += 1,
			SyncDecision::UploadModified => self.uploaded_modified += 1,
		}
		if decision.is_upload() {
			self.bytes_uploaded += size;
		}
	}
}

/// Mirrors a local tree onto one remote store
pub struct SyncEngine<'a> {
	store: &'a mut dyn RemoteStore,
	options: SyncOptions,
	observer: Box<dyn SyncObserver + 'a>,
}

impl<'a> SyncEngine<'a> {
	pub fn new(store: &'a mut dyn RemoteStore, options: SyncOptions) -> Self {
		Self { store, options, observer: Box::new(NoObserver) }
	}

	pub fn with_observer(mut self, observer: impl SyncObserver + 'a) -> Self {
		self.observer = Box::new(observer);
		self
	}

	pub fn options(&self) -> &SyncOptions {
		&self.options
	}

	/// Mirror `source_root` onto the store
	pub async fn run(&mut self, source_root: &Path) -> Result<SyncReport, SyncError> {
		let started = Instant::now();
		let mut report = SyncReport { dry_run: self.options.dry_run, ..SyncReport::default() };

		let ignore_path = source_root.join(&self.options.ignore_file);
		let ignore = IgnoreSet::load(&ignore_path)?;

		info!("Reading remote inventory from {}", self.store.describe());
		let inventory = self.store.list_all().await?;
		info!("Remote inventory: {} files", inventory.len());
		self.observer.on_event(SyncEvent::InventoryLoaded { files: inventory.len() });

		// Directories known to exist, so ancestors are only created once
		let mut known_dirs: HashSet<String> =
			inventory.iter().flat_map(|p| ancestors_of(p)).collect();
		let mut wanted: BTreeSet<String> = BTreeSet::new();

		let mut scanner = LocalScanner::new(source_root, &ignore).skip_file(&ignore_path);
		for entry in scanner.by_ref() {
			self.check_cancel()?;
			let entry = entry?;
			if !wanted.insert(entry.remote_path.clone()) {
				return Err(SyncError::DuplicateRemotePath { path: entry.remote_path });
			}
			let (decision, size) =
				self.sync_file(&entry, &inventory, &mut known_dirs).await?;
			report.record(decision, size);
			self.observer.on_event(SyncEvent::FileDecided { entry, decision, size });
		}
		report.dirs_pruned = scanner.dirs_pruned();
		report.files_excluded = scanner.files_excluded();

		let stale: Vec<&String> = inventory.difference(&wanted).collect();
		if !stale.is_empty() {
			info!("Deleting {} remote files with no local counterpart", stale.len());
		}
		for path in stale {
			self.check_cancel()?;
			if !self.options.dry_run {
				self.store.delete(path).await?;
			}
			report.deleted.push(path.clone());
			self.observer.on_event(SyncEvent::Deleted { path: path.clone() });
		}

		if self.options.prune_empty_dirs && !self.options.dry_run {
			debug!("Removing empty remote directories");
			for path in self.store.remove_empty_dirs().await? {
				report.removed_dirs.push(path.clone());
				self.observer.on_event(SyncEvent::DirectoryRemoved { path });
			}
		}

		report.elapsed = started.elapsed();
		info!(
			"Sync finished: {} new, {} modified, {} unchanged, {} deleted in {:.1?}",
			report.uploaded_new,
			report.uploaded_modified,
			report.skipped,
			report.deleted.len(),
			report.elapsed
		);
		Ok(report)
	}

	async fn sync_file(
		&mut self,
		entry: &FileEntry,
		inventory: &BTreeSet<String>,
		known_dirs: &mut HashSet<String>,
	) -> Result<(SyncDecision, u64), SyncError> {
		let data = tokio::fs::read(&entry.local_path)
			.await
			.map_err(|e| SyncError::local_io(&entry.local_path, e))?;
		let size = data.len() as u64;
		let local_hash = self.store.hash_algorithm().digest(&data);

		let decision = if !inventory.contains(&entry.remote_path) {
			SyncDecision::UploadNew
		} else {
			match self.store.hash_of(&entry.remote_path).await? {
				None => SyncDecision::UploadNew,
				Some(remote_hash) if remote_hash == local_hash => SyncDecision::SkipUnchanged,
				Some(_) => SyncDecision::UploadModified,
			}
		};
		debug!("{} {} ({})", entry.remote_path, decision.label(), local_hash);

		if decision.is_upload() && !self.options.dry_run {
			let parent_known = match parent_of(&entry.remote_path) {
				Some("/") | None => true,
				Some(parent) => known_dirs.contains(parent),
			};
			if !parent_known {
				self.store.mkdir_ancestors(&entry.remote_path).await?;
				known_dirs.extend(ancestors_of(&entry.remote_path));
			}
			self.store.write(&entry.remote_path, &data).await?;
		}
		Ok((decision, size))
	}

	fn check_cancel(&self) -> Result<(), SyncError> {
		match &self.options.cancel {
			Some(flag) if flag.is_requested() => {
				warn!("Sync interrupted");
				Err(SyncError::Aborted)
			}
			_ => Ok(()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::remote::MemoryStore;
	use std::fs;
	use std::sync::{Arc, Mutex};
	use tempfile::TempDir;

	fn tree(files: &[(&str, &str)]) -> TempDir {
		let dir = TempDir::new().unwrap();
		for (path, content) in files {
			let p = dir.path().join(path);
			fs::create_dir_all(p.parent().unwrap()).unwrap();
			fs::write(p, content).unwrap();
		}
		dir
	}

	#[test]
	fn test_decision_labels() {
		assert!(SyncDecision::UploadNew.is_upload());
		assert!(SyncDecision::UploadModified.is_upload());
		assert!(!SyncDecision::SkipUnchanged.is_upload());
		assert_eq!(SyncDecision::UploadModified.label(), "modified");
	}

	#[tokio::test]
	async fn test_absent_path_is_not_hash_queried() {
		let local = tree(&[("a.txt", "hi")]);
		let mut store = MemoryStore::new();
		let report = SyncEngine::new(&mut store, SyncOptions::default())
			.run(local.path())
			.await
			.unwrap();

		assert_eq!(report.uploaded_new, 1);
		assert_eq!(store.count("hash_of"), 0);
		assert_eq!(store.count("mkdir_ancestors"), 0);
	}

	#[tokio::test]
	async fn test_mkdir_once_per_directory() {
		let local = tree(&[("lib/a.py", "a"), ("lib/b.py", "b"), ("lib/deep/c.py", "c")]);
		let mut store = MemoryStore::new();
		SyncEngine::new(&mut store, SyncOptions::default()).run(local.path()).await.unwrap();

		// lib once, lib/deep once
		assert_eq!(store.count("mkdir_ancestors"), 2);
		assert_eq!(store.count("write"), 3);
	}

	#[tokio::test]
	async fn test_events_in_order() {
		let local = tree(&[("a.txt", "hi")]);
		let mut store = MemoryStore::new().with_file("/old.py", "x");
		let events = Arc::new(Mutex::new(Vec::new()));
		let sink = events.clone();

		SyncEngine::new(&mut store, SyncOptions::default())
			.with_observer(move |e: SyncEvent| sink.lock().unwrap().push(e))
			.run(local.path())
			.await
			.unwrap();

		let events = events.lock().unwrap();
		assert_eq!(events.len(), 3);
		assert_eq!(events[0], SyncEvent::InventoryLoaded { files: 1 });
		assert!(matches!(
			&events[1],
			SyncEvent::FileDecided { decision: SyncDecision::UploadNew, size: 2, .. }
		));
		assert_eq!(events[2], SyncEvent::Deleted { path: "/old.py".to_string() });
	}

	#[tokio::test]
	async fn test_cancel_before_first_file() {
		let local = tree(&[("a.txt", "hi")]);
		let mut store = MemoryStore::new();
		let flag = ShutdownFlag::new();
		flag.request();
		let options = SyncOptions { cancel: Some(flag), ..SyncOptions::default() };

		let err = SyncEngine::new(&mut store, options).run(local.path()).await.unwrap_err();
		assert!(matches!(err, SyncError::Aborted));
		assert_eq!(store.count("write"), 0);
	}

	#[test]
	fn test_options_from_config() {
		let config = Config { dry_run: true, ignore_file: ".ignore".to_string(), ..Config::default() };
		let options = SyncOptions::from(&config);
		assert!(options.dry_run);
		assert_eq!(options.ignore_file, ".ignore");
		assert!(options.prune_empty_dirs);
	}
}

// vim: ts=4
