//! Local tree walk producing upload candidates
//!
//! The walk is lazy and depth-first: a directory is read only when the
//! consumer has drained everything before it. Within a directory, entries are
//! visited in name order, files first, then subdirectories. Excluded
//! directories are dropped before they are ever opened.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::SyncError;
use crate::exclusion::{relative_slash_path, IgnoreSet};
use crate::logging::*;

/// One local file to mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
	/// Path on the local file system
	pub local_path: PathBuf,

	/// Path below the sync root, `/`-separated
	pub relative_path: String,

	/// Absolute path on the remote store
	pub remote_path: String,
}

impl FileEntry {
	fn new(local_path: PathBuf, root: &Path) -> Self {
		let relative_path = relative_slash_path(&local_path, root);
		let remote_path = remote_path_for(&relative_path);
		Self { local_path, relative_path, remote_path }
	}
}

/// Map a root-relative path onto the remote store
pub fn remote_path_for(relative: &str) -> String {
	format!("/{}", relative.trim_start_matches('/'))
}

/// Lazy, single-pass walk of a sync root
pub struct LocalScanner<'a> {
	root: PathBuf,
	ignore: &'a IgnoreSet,

	/// File never offered for upload (the rule file itself)
	skip: Option<PathBuf>,

	/// Directories still to be read, next one on top
	pending_dirs: Vec<PathBuf>,

	/// Files of the directory read last
	pending_files: VecDeque<PathBuf>,

	dirs_pruned: usize,
	files_excluded: usize,
}

impl<'a> LocalScanner<'a> {
	pub fn new(root: impl Into<PathBuf>, ignore: &'a IgnoreSet) -> Self {
		let root = root.into();
		Self {
			pending_dirs: vec![root.clone()],
			root,
			ignore,
			skip: None,
			pending_files: VecDeque::new(),
			dirs_pruned: 0,
			files_excluded: 0,
		}
	}

	/// Never yield `path`, even if no rule excludes it
	pub fn skip_file(mut self, path: impl Into<PathBuf>) -> Self {
		self.skip = Some(path.into());
		self
	}

	/// Start over with a full re-walk
	pub fn restart(&mut self) {
		self.pending_dirs = vec![self.root.clone()];
		self.pending_files.clear();
		self.dirs_pruned = 0;
		self.files_excluded = 0;
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Directories skipped without being read
	pub fn dirs_pruned(&self) -> usize {
		self.dirs_pruned
	}

	/// Files skipped by a rule
	pub fn files_excluded(&self) -> usize {
		self.files_excluded
	}

	fn expand(&mut self, dir: &Path) -> Result<(), SyncError> {
		let mut entries = fs::read_dir(dir)
			.map_err(|e| SyncError::local_io(dir, e))?
			.collect::<Result<Vec<_>, _>>()
			.map_err(|e| SyncError::local_io(dir, e))?;
		entries.sort_by_key(|e| e.file_name());

		let mut subdirs = Vec::new();
		for entry in entries {
			let path = entry.path();
			let mut file_type = entry.file_type().map_err(|e| SyncError::local_io(&path, e))?;
			let is_link = file_type.is_symlink();
			if is_link {
				match fs::metadata(&path) {
					Ok(meta) => file_type = meta.file_type(),
					Err(e) => {
						warn!("Skipping dangling symlink {}: {}", path.display(), e);
						continue;
					}
				}
			}

			if file_type.is_dir() {
				if self.ignore.is_excluded(&path, &self.root) {
					debug!("Pruned {}", path.display());
					self.dirs_pruned += 1;
				} else if is_link {
					debug!("Not following directory symlink {}", path.display());
				} else {
					subdirs.push(path);
				}
			} else if file_type.is_file() {
				if self.ignore.is_excluded(&path, &self.root) {
					debug!("Excluded {}", path.display());
					self.files_excluded += 1;
				} else if self.skip.as_deref() == Some(path.as_path()) {
					debug!("Not uploading rule file {}", path.display());
				} else {
					self.pending_files.push_back(path);
				}
			} else {
				debug!("Skipping special file {}", path.display());
			}
		}

		self.pending_dirs.extend(subdirs.into_iter().rev());
		Ok(())
	}
}

impl Iterator for LocalScanner<'_> {
	type Item = Result<FileEntry, SyncError>;

	fn next(&mut self) -> Option<Self::Item> {
		loop {
			if let Some(path) = self.pending_files.pop_front() {
				return Some(Ok(FileEntry::new(path, &self.root)));
			}
			let dir = self.pending_dirs.pop()?;
			if let Err(e) = self.expand(&dir) {
				return Some(Err(e));
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	fn touch(root: &Path, rel: &str) {
		let path = root.join(rel);
		fs::create_dir_all(path.parent().unwrap()).unwrap();
		fs::write(path, rel.as_bytes()).unwrap();
	}

	fn remote_paths(scanner: LocalScanner) -> Vec<String> {
		scanner.map(|e| e.unwrap().remote_path).collect()
	}

	#[test]
	fn test_depth_first_files_before_subdirs() {
		let dir = TempDir::new().unwrap();
		touch(dir.path(), "z.py");
		touch(dir.path(), "a.py");
		touch(dir.path(), "lib/m.py");
		touch(dir.path(), "lib/deep/n.py");
		touch(dir.path(), "boot/b.py");

		let ignore = IgnoreSet::empty();
		let paths = remote_paths(LocalScanner::new(dir.path(), &ignore));
		assert_eq!(
			paths,
			vec!["/a.py", "/z.py", "/boot/b.py", "/lib/m.py", "/lib/deep/n.py"]
		);
	}

	#[test]
	fn test_entry_fields() {
		let dir = TempDir::new().unwrap();
		touch(dir.path(), "sub/b.txt");

		let ignore = IgnoreSet::empty();
		let entries: Vec<_> =
			LocalScanner::new(dir.path(), &ignore).collect::<Result<_, _>>().unwrap();
		assert_eq!(entries.len(), 1);
		assert_eq!(entries[0].relative_path, "sub/b.txt");
		assert_eq!(entries[0].remote_path, "/sub/b.txt");
		assert_eq!(entries[0].local_path, dir.path().join("sub").join("b.txt"));
	}

	#[test]
	fn test_excluded_directory_is_pruned() {
		let dir = TempDir::new().unwrap();
		touch(dir.path(), "main.py");
		touch(dir.path(), "build/out.bin");
		touch(dir.path(), "build/nested/x.bin");
		touch(dir.path(), "build.txt");

		let ignore = IgnoreSet::from_patterns(["build/"]).unwrap();
		let mut scanner = LocalScanner::new(dir.path(), &ignore);
		let paths: Vec<_> = scanner.by_ref().map(|e| e.unwrap().remote_path).collect();

		assert_eq!(paths, vec!["/build.txt", "/main.py"]);
		assert_eq!(scanner.dirs_pruned(), 1);
	}

	#[cfg(unix)]
	#[test]
	fn test_pruned_directory_is_never_read() {
		use std::os::unix::fs::PermissionsExt;

		let dir = TempDir::new().unwrap();
		touch(dir.path(), "keep.py");
		touch(dir.path(), "secret/x.py");
		// Unreadable, so any attempt to list it would surface an error
		fs::set_permissions(dir.path().join("secret"), fs::Permissions::from_mode(0o000)).unwrap();

		let ignore = IgnoreSet::from_patterns(["secret/"]).unwrap();
		let result: Result<Vec<_>, _> = LocalScanner::new(dir.path(), &ignore).collect();

		fs::set_permissions(dir.path().join("secret"), fs::Permissions::from_mode(0o755)).unwrap();
		assert_eq!(result.unwrap().len(), 1);
	}

	#[test]
	fn test_excluded_files_at_depth() {
		let dir = TempDir::new().unwrap();
		touch(dir.path(), "a.log");
		touch(dir.path(), "sub/dir/b.log");
		touch(dir.path(), "sub/dir/c.py");

		let ignore = IgnoreSet::from_patterns(["*.log"]).unwrap();
		let mut scanner = LocalScanner::new(dir.path(), &ignore);
		let paths: Vec<_> = scanner.by_ref().map(|e| e.unwrap().remote_path).collect();

		assert_eq!(paths, vec!["/sub/dir/c.py"]);
		assert_eq!(scanner.files_excluded(), 2);
	}

	#[test]
	fn test_skip_file() {
		let dir = TempDir::new().unwrap();
		touch(dir.path(), ".picoignore");
		touch(dir.path(), "main.py");

		let ignore = IgnoreSet::empty();
		let scanner = LocalScanner::new(dir.path(), &ignore).skip_file(dir.path().join(".picoignore"));
		assert_eq!(remote_paths(scanner), vec!["/main.py"]);
	}

	#[test]
	fn test_restart_rewalks() {
		let dir = TempDir::new().unwrap();
		touch(dir.path(), "a.py");

		let ignore = IgnoreSet::empty();
		let mut scanner = LocalScanner::new(dir.path(), &ignore);
		assert_eq!(scanner.by_ref().count(), 1);
		assert!(scanner.next().is_none());

		touch(dir.path(), "b.py");
		scanner.restart();
		assert_eq!(scanner.count(), 2);
	}

	#[test]
	fn test_missing_root_is_local_io_error() {
		let dir = TempDir::new().unwrap();
		let ignore = IgnoreSet::empty();
		let mut scanner = LocalScanner::new(dir.path().join("nope"), &ignore);
		assert!(matches!(scanner.next(), Some(Err(SyncError::LocalIo { .. }))));
	}

	#[test]
	fn test_remote_path_for() {
		assert_eq!(remote_path_for("a.txt"), "/a.txt");
		assert_eq!(remote_path_for("sub/b.txt"), "/sub/b.txt");
	}
}
