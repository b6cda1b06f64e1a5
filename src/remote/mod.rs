//! Remote store abstraction
//!
//! The sync engine talks to the target only through [`RemoteStore`]. It makes
//! no assumption about how a store carries out a request, only about the
//! observable result.
//!
//! # Example Usage
//!
//! ```ignore
//! use picosync::remote::{open_store, RemoteStore};
//!
//! let mut store = open_store(&config.target, config.hash_algorithm)?;
//! for path in store.list_all().await? {
//!     println!("{}", path);
//! }
//! ```

pub mod directory;
pub mod error;
pub mod memory;
pub mod messages;
pub mod mpremote;

pub use directory::DirectoryStore;
pub use error::RemoteError;
pub use memory::MemoryStore;
pub use mpremote::MpremoteStore;

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::config::TargetConfig;
use crate::hash::{ContentHash, HashAlgorithm};
use crate::logging::*;

/// Result type for remote operations
pub type RemoteResult<T> = Result<T, RemoteError>;

/// One name inside a remote directory
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RemoteEntry {
	pub name: String,
	pub is_dir: bool,
}

/// Operations the sync engine needs from a target file store
///
/// All paths are absolute and `/`-separated, with `/` as the store root.
#[async_trait]
pub trait RemoteStore: Send + Sync {
	/// Short human-readable description of the target
	fn describe(&self) -> String;

	/// Digest used by [`hash_of`](Self::hash_of)
	fn hash_algorithm(&self) -> HashAlgorithm;

	/// Every file on the store, recursively, sorted
	async fn list_all(&mut self) -> RemoteResult<BTreeSet<String>>;

	/// Content hash of a file, `None` if there is no such file
	async fn hash_of(&mut self, path: &str) -> RemoteResult<Option<ContentHash>>;

	/// Create every missing directory above `path`; succeeds if they exist
	async fn mkdir_ancestors(&mut self, path: &str) -> RemoteResult<()>;

	/// Store `data` at `path`, creating parents and replacing any old content
	async fn write(&mut self, path: &str, data: &[u8]) -> RemoteResult<()>;

	/// Remove a file, or a directory that is already empty
	async fn delete(&mut self, path: &str) -> RemoteResult<()>;

	/// Entries directly inside a directory
	async fn list_dir(&mut self, path: &str) -> RemoteResult<Vec<RemoteEntry>>;

	/// Whole content of a file
	async fn read(&mut self, path: &str) -> RemoteResult<Vec<u8>>;

	/// Remove directories left without entries, deepest first, never `/`
	///
	/// Returns the removed directories in removal order. Stores that can do
	/// this in a single round-trip should override the default, which walks
	/// the tree with [`list_dir`](Self::list_dir).
	async fn remove_empty_dirs(&mut self) -> RemoteResult<Vec<String>> {
		let mut dirs = Vec::new();
		let mut queue = vec!["/".to_string()];
		while let Some(dir) = queue.pop() {
			for entry in self.list_dir(&dir).await? {
				if entry.is_dir {
					let child = join_remote(&dir, &entry.name);
					queue.push(child.clone());
					dirs.push(child);
				}
			}
		}

		// Children before parents, so a parent emptied by the pass is caught too
		dirs.sort_by(|a, b| depth(b).cmp(&depth(a)).then_with(|| a.cmp(b)));

		let mut removed = Vec::new();
		for dir in dirs {
			if self.list_dir(&dir).await?.is_empty() {
				self.delete(&dir).await?;
				removed.push(dir);
			}
		}
		Ok(removed)
	}
}

/// Open the store described by `target`
pub fn open_store(
	target: &TargetConfig,
	algorithm: HashAlgorithm,
) -> RemoteResult<Box<dyn RemoteStore>> {
	match target {
		TargetConfig::Serial(serial) => {
			if algorithm != HashAlgorithm::Sha256 {
				return Err(RemoteError::Unsupported(format!(
					"serial targets only hash with sha256, not {}",
					algorithm
				)));
			}
			info!("Using serial target on {}", serial.port);
			Ok(Box::new(MpremoteStore::new(serial.clone())))
		}
		TargetConfig::Directory { path } => {
			info!("Using directory target {}", path.display());
			Ok(Box::new(DirectoryStore::new(path.clone(), algorithm)))
		}
	}
}

/// Join a directory and a name
pub fn join_remote(dir: &str, name: &str) -> String {
	if dir == "/" {
		format!("/{}", name)
	} else {
		format!("{}/{}", dir.trim_end_matches('/'), name)
	}
}

/// Parent directory, `None` for `/`
pub fn parent_of(path: &str) -> Option<&str> {
	if path == "/" {
		return None;
	}
	let trimmed = path.trim_end_matches('/');
	match trimmed.rfind('/') {
		Some(0) => Some("/"),
		Some(idx) => Some(&trimmed[..idx]),
		None => None,
	}
}

/// Directories above `path`, outermost first, `/` excluded
pub fn ancestors_of(path: &str) -> Vec<String> {
	let mut out = Vec::new();
	let mut current = parent_of(path);
	while let Some(dir) = current {
		if dir == "/" {
			break;
		}
		out.push(dir.to_string());
		current = parent_of(dir);
	}
	out.reverse();
	out
}

/// Reject relative paths and `.`/`..` or empty components
pub fn check_path(path: &str) -> RemoteResult<()> {
	if !path.starts_with('/') {
		return Err(RemoteError::InvalidPath(path.to_string()));
	}
	if path == "/" {
		return Ok(());
	}
	let bad = path[1..].split('/').any(|part| part.is_empty() || part == "." || part == "..");
	if bad {
		return Err(RemoteError::InvalidPath(path.to_string()));
	}
	Ok(())
}

fn depth(path: &str) -> usize {
	path.matches('/').count()
}


// vim: ts=4
