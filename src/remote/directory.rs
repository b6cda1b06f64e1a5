//! Remote store backed by a locally mounted directory
//!
//! Boards that expose their flash as USB mass storage show up as a plain
//! directory; this store mirrors onto it with ordinary file operations.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::io;
use std::path::PathBuf;
use tokio::fs as afs;

use super::{check_path, join_remote, RemoteEntry, RemoteError, RemoteResult, RemoteStore};
use crate::hash::{ContentHash, HashAlgorithm};
use crate::logging::*;

/// Store rooted at a local directory
#[derive(Debug, Clone)]
pub struct DirectoryStore {
	root: PathBuf,
	algorithm: HashAlgorithm,
}

impl DirectoryStore {
	pub fn new(root: impl Into<PathBuf>, algorithm: HashAlgorithm) -> Self {
		Self { root: root.into(), algorithm }
	}

	pub fn root(&self) -> &std::path::Path {
		&self.root
	}

	fn local(&self, remote: &str) -> RemoteResult<PathBuf> {
		check_path(remote)?;
		Ok(self.root.join(remote.trim_start_matches('/')))
	}
}

#[async_trait]
impl RemoteStore for DirectoryStore {
	fn describe(&self) -> String {
		format!("directory {}", self.root.display())
	}

	fn hash_algorithm(&self) -> HashAlgorithm {
		self.algorithm
	}

	async fn list_all(&mut self) -> RemoteResult<BTreeSet<String>> {
		let mut files = BTreeSet::new();
		let mut stack = vec![(self.root.clone(), "/".to_string())];

		while let Some((dir, remote_dir)) = stack.pop() {
			let mut entries = afs::read_dir(&dir).await?;
			while let Some(entry) = entries.next_entry().await? {
				let name = entry.file_name().to_string_lossy().into_owned();
				let remote = join_remote(&remote_dir, &name);
				if entry.file_type().await?.is_dir() {
					stack.push((entry.path(), remote));
				} else {
					files.insert(remote);
				}
			}
		}
		debug!("list_all {}: {} files", self.root.display(), files.len());
		Ok(files)
	}

	async fn hash_of(&mut self, path: &str) -> RemoteResult<Option<ContentHash>> {
		let local = self.local(path)?;
		debug!("hash_of {}", path);
		match afs::metadata(&local).await {
			Ok(meta) if meta.is_file() => {}
			Ok(_) => return Ok(None),
			Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
			Err(e) => return Err(e.into()),
		}
		let data = afs::read(&local).await?;
		Ok(Some(self.algorithm.digest(&data)))
	}

	async fn mkdir_ancestors(&mut self, path: &str) -> RemoteResult<()> {
		let local = self.local(path)?;
		debug!("mkdir_ancestors {}", path);
		if let Some(parent) = local.parent() {
			afs::create_dir_all(parent).await?;
		}
		Ok(())
	}

	async fn write(&mut self, path: &str, data: &[u8]) -> RemoteResult<()> {
		debug!("write {} ({} bytes)", path, data.len());
		self.mkdir_ancestors(path).await?;
		afs::write(self.local(path)?, data).await?;
		Ok(())
	}

	async fn delete(&mut self, path: &str) -> RemoteResult<()> {
		if path == "/" {
			return Err(RemoteError::InvalidPath("refusing to delete the store root".to_string()));
		}
		let local = self.local(path)?;
		debug!("delete {}", path);
		let meta = afs::symlink_metadata(&local).await?;
		if meta.is_dir() {
			// Fails unless empty
			afs::remove_dir(&local).await?;
		} else {
			afs::remove_file(&local).await?;
		}
		Ok(())
	}

	async fn list_dir(&mut self, path: &str) -> RemoteResult<Vec<RemoteEntry>> {
		let local = self.local(path)?;
		debug!("list_dir {}", path);
		let mut out = Vec::new();
		let mut entries = afs::read_dir(&local).await?;
		while let Some(entry) = entries.next_entry().await? {
			out.push(RemoteEntry {
				name: entry.file_name().to_string_lossy().into_owned(),
				is_dir: entry.file_type().await?.is_dir(),
			});
		}
		out.sort();
		Ok(out)
	}

	async fn read(&mut self, path: &str) -> RemoteResult<Vec<u8>> {
		let local = self.local(path)?;
		debug!("read {}", path);
		match afs::read(&local).await {
			Ok(data) => Ok(data),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Err(RemoteError::NotFound(path.to_string())),
			Err(e) => Err(e.into()),
		}
	}
}
