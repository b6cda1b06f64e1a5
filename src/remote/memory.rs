//! In-process remote store
//!
//! Holds the whole target in memory and records every request it serves, so
//! tests can assert on round-trips. It can also be told to fail a given
//! request, to exercise abort handling.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};

use super::{ancestors_of, check_path, parent_of, RemoteEntry, RemoteError, RemoteResult, RemoteStore};
use crate::hash::{ContentHash, HashAlgorithm};
use crate::logging::*;

/// One served request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryOp {
	ListAll,
	HashOf(String),
	MkdirAncestors(String),
	Write(String),
	Delete(String),
	ListDir(String),
	Read(String),
}

impl MemoryOp {
	pub fn name(&self) -> &'static str {
		match self {
			MemoryOp::ListAll => "list_all",
			MemoryOp::HashOf(_) => "hash_of",
			MemoryOp::MkdirAncestors(_) => "mkdir_ancestors",
			MemoryOp::Write(_) => "write",
			MemoryOp::Delete(_) => "delete",
			MemoryOp::ListDir(_) => "list_dir",
			MemoryOp::Read(_) => "read",
		}
	}
}

#[derive(Debug, Clone)]
struct FailPoint {
	operation: &'static str,
	nth: usize,
}

/// Remote store kept in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
	files: BTreeMap<String, Vec<u8>>,
	dirs: BTreeSet<String>,
	algorithm: HashAlgorithm,
	log: Vec<MemoryOp>,
	fail: Option<FailPoint>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_algorithm(algorithm: HashAlgorithm) -> Self {
		Self { algorithm, ..Self::default() }
	}

	/// Seed a file (and its directories) without logging
	pub fn with_file(mut self, path: &str, data: impl Into<Vec<u8>>) -> Self {
		for dir in ancestors_of(path) {
			self.dirs.insert(dir);
		}
		self.files.insert(path.to_string(), data.into());
		self
	}

	/// Seed an empty directory (and its parents) without logging
	pub fn with_dir(mut self, path: &str) -> Self {
		for dir in ancestors_of(path) {
			self.dirs.insert(dir);
		}
		self.dirs.insert(path.to_string());
		self
	}

	/// Fail the `nth` (1-based) request named `operation`
	pub fn fail_on(mut self, operation: &'static str, nth: usize) -> Self {
		self.fail = Some(FailPoint { operation, nth });
		self
	}

	pub fn files(&self) -> &BTreeMap<String, Vec<u8>> {
		&self.files
	}

	pub fn file_paths(&self) -> Vec<&str> {
		self.files.keys().map(String::as_str).collect()
	}

	pub fn dirs(&self) -> &BTreeSet<String> {
		&self.dirs
	}

	pub fn contents(&self, path: &str) -> Option<&[u8]> {
		self.files.get(path).map(Vec::as_slice)
	}

	/// Every request served so far
	pub fn ops(&self) -> &[MemoryOp] {
		&self.log
	}

	/// Number of requests named `operation`
	pub fn count(&self, operation: &str) -> usize {
		self.log.iter().filter(|op| op.name() == operation).count()
	}

	pub fn clear_log(&mut self) {
		self.log.clear();
	}

	fn record(&mut self, op: MemoryOp) -> RemoteResult<()> {
		let name = op.name();
		debug!("memory {:?}", op);
		self.log.push(op);
		if let Some(fail) = &self.fail {
			if fail.operation == name && self.count(name) == fail.nth {
				return Err(RemoteError::Transport {
					status: Some(1),
					stderr: format!("injected failure on {} #{}", name, fail.nth),
				});
			}
		}
		Ok(())
	}

	fn is_dir(&self, path: &str) -> bool {
		path == "/" || self.dirs.contains(path)
	}

	fn create_ancestors(&mut self, path: &str) -> RemoteResult<()> {
		for dir in ancestors_of(path) {
			if self.files.contains_key(&dir) {
				return Err(RemoteError::Device(format!("ENOTDIR: {}", dir)));
			}
			self.dirs.insert(dir);
		}
		Ok(())
	}

	fn children(&self, dir: &str) -> Vec<RemoteEntry> {
		let files = self.files.keys().map(|p| (p, false));
		let dirs = self.dirs.iter().map(|p| (p, true));
		let mut out: Vec<_> = files
			.chain(dirs)
			.filter(|(p, _)| parent_of(p) == Some(dir))
			.map(|(p, is_dir)| RemoteEntry {
				name: p.rsplit('/').next().unwrap_or(p.as_str()).to_string(),
				is_dir,
			})
			.collect();
		out.sort();
		out
	}
}

#[async_trait]
impl RemoteStore for MemoryStore {
	fn describe(&self) -> String {
		format!("memory ({} files)", self.files.len())
	}

	fn hash_algorithm(&self) -> HashAlgorithm {
		self.algorithm
	}

	async fn list_all(&mut self) -> RemoteResult<BTreeSet<String>> {
		self.record(MemoryOp::ListAll)?;
		Ok(self.files.keys().cloned().collect())
	}

	async fn hash_of(&mut self, path: &str) -> RemoteResult<Option<ContentHash>> {
		self.record(MemoryOp::HashOf(path.to_string()))?;
		check_path(path)?;
		Ok(self.files.get(path).map(|data| self.algorithm.digest(data)))
	}

	async fn mkdir_ancestors(&mut self, path: &str) -> RemoteResult<()> {
		self.record(MemoryOp::MkdirAncestors(path.to_string()))?;
		check_path(path)?;
		self.create_ancestors(path)
	}

	async fn write(&mut self, path: &str, data: &[u8]) -> RemoteResult<()> {
		self.record(MemoryOp::Write(path.to_string()))?;
		check_path(path)?;
		if self.is_dir(path) {
			return Err(RemoteError::Device(format!("EISDIR: {}", path)));
		}
		self.create_ancestors(path)?;
		self.files.insert(path.to_string(), data.to_vec());
		Ok(())
	}

	async fn delete(&mut self, path: &str) -> RemoteResult<()> {
		self.record(MemoryOp::Delete(path.to_string()))?;
		check_path(path)?;
		if self.files.remove(path).is_some() {
			return Ok(());
		}
		if path == "/" {
			return Err(RemoteError::Device("EPERM: cannot remove /".to_string()));
		}
		if self.dirs.contains(path) {
			if !self.children(path).is_empty() {
				return Err(RemoteError::Device(format!("ENOTEMPTY: {}", path)));
			}
			self.dirs.remove(path);
			return Ok(());
		}
		Err(RemoteError::Device(format!("ENOENT: {}", path)))
	}

	async fn list_dir(&mut self, path: &str) -> RemoteResult<Vec<RemoteEntry>> {
		self.record(MemoryOp::ListDir(path.to_string()))?;
		check_path(path)?;
		if !self.is_dir(path) {
			return Err(RemoteError::Device(format!("ENOENT: {}", path)));
		}
		Ok(self.children(path))
	}

	async fn read(&mut self, path: &str) -> RemoteResult<Vec<u8>> {
		self.record(MemoryOp::Read(path.to_string()))?;
		check_path(path)?;
		self.files
			.get(path)
			.cloned()
			.ok_or_else(|| RemoteError::NotFound(path.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_write_creates_parents() {
		let mut store = MemoryStore::new();
		store.write("/a/b/c.py", b"x").await.unwrap();

		assert_eq!(store.file_paths(), vec!["/a/b/c.py"]);
		assert!(store.dirs().contains("/a"));
		assert!(store.dirs().contains("/a/b"));
	}

	#[tokio::test]
	async fn test_delete_non_empty_dir_fails() {
		let mut store = MemoryStore::new().with_file("/sub/b.txt", "yo");
		assert!(store.delete("/sub").await.is_err());
		store.delete("/sub/b.txt").await.unwrap();
		store.delete("/sub").await.unwrap();
		assert!(store.dirs().is_empty());
	}

	#[tokio::test]
	async fn test_list_dir() {
		let mut store = MemoryStore::new().with_file("/a.py", "1").with_dir("/lib");
		let entries = store.list_dir("/").await.unwrap();
		assert_eq!(
			entries,
			vec![
				RemoteEntry { name: "a.py".into(), is_dir: false },
				RemoteEntry { name: "lib".into(), is_dir: true },
			]
		);
	}

	#[tokio::test]
	async fn test_default_prune_removes_nested_empty_dirs() {
		let mut store = MemoryStore::new()
			.with_dir("/x/y/z")
			.with_file("/keep/k.py", "k")
			.with_dir("/keep/empty");

		let removed = store.remove_empty_dirs().await.unwrap();
		assert_eq!(removed, vec!["/x/y/z", "/keep/empty", "/x/y", "/x"]);
		assert_eq!(store.dirs().iter().collect::<Vec<_>>(), vec!["/keep"]);
	}

	#[tokio::test]
	async fn test_read_missing_is_not_found() {
		let mut store = MemoryStore::new().with_dir("/lib");
		assert!(matches!(store.read("/nope.py").await, Err(RemoteError::NotFound(p)) if p == "/nope.py"));
	}

	#[tokio::test]
	async fn test_fail_on_nth_request() {
		let mut store = MemoryStore::new().fail_on("hash_of", 2);
		assert!(store.hash_of("/a").await.is_ok());
		assert!(matches!(store.hash_of("/b").await, Err(RemoteError::Transport { .. })));
		assert!(store.hash_of("/c").await.is_ok());
		assert_eq!(store.count("hash_of"), 3);
	}
}
