//! Remote store on a MicroPython board, driven through `mpremote`
//!
//! Every request is one `mpremote connect <port> exec <script>` invocation.
//! The script is the fixed agent in `agent.py` followed by a call carrying
//! the base64-encoded request, so no path is ever spliced into code.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::messages::{parse_reply, AgentReply, RemoteRequest};
use super::{check_path, RemoteEntry, RemoteError, RemoteResult, RemoteStore};
use crate::config::SerialTarget;
use crate::hash::{ContentHash, HashAlgorithm};
use crate::logging::*;

const AGENT: &str = include_str!("agent.py");

/// Board reachable over a serial port
#[derive(Debug, Clone)]
pub struct MpremoteStore {
	target: SerialTarget,
}

impl MpremoteStore {
	pub fn new(target: SerialTarget) -> Self {
		Self { target }
	}

	pub fn port(&self) -> &str {
		&self.target.port
	}

	/// Soft-reset the board
	pub async fn reset(&self) -> RemoteResult<()> {
		let args = vec!["connect".to_string(), self.target.port.clone(), "reset".to_string()];
		self.run(&args, "reset").await?;
		Ok(())
	}

	async fn call(&self, req: &RemoteRequest) -> RemoteResult<AgentReply> {
		let script = build_script(req)?;
		let args = vec![
			"connect".to_string(),
			self.target.port.clone(),
			"exec".to_string(),
			script,
		];
		debug!("{} {} on {}", req.operation(), req.path().unwrap_or("/"), self.target.port);
		let stdout = self.run(&args, req.operation()).await?;
		parse_reply(&stdout)?.into_result()
	}

	async fn run(&self, args: &[String], operation: &'static str) -> RemoteResult<String> {
		let child = Command::new(&self.target.command)
			.args(args)
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true)
			.spawn()
			.map_err(|e| RemoteError::Spawn { command: self.target.command.clone(), source: e })?;

		let secs = self.target.timeout_secs;
		let output = tokio::time::timeout(Duration::from_secs(secs), child.wait_with_output())
			.await
			.map_err(|_| RemoteError::Timeout { operation, secs })??;

		if !output.status.success() {
			return Err(RemoteError::Transport {
				status: output.status.code(),
				stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
			});
		}
		Ok(String::from_utf8_lossy(&output.stdout).into_owned())
	}
}

/// Agent source plus the call for one request
pub fn build_script(req: &RemoteRequest) -> RemoteResult<String> {
	Ok(format!("{}\n_main('{}')\n", AGENT, req.encode()?))
}

/// Split `data` into write requests of at most `chunk_size` raw bytes
///
/// The first request truncates, the rest append. An empty file is a single
/// truncating write.
pub fn write_requests(path: &str, data: &[u8], chunk_size: usize) -> Vec<RemoteRequest> {
	if data.is_empty() {
		return vec![RemoteRequest::write(path, data, false)];
	}
	data.chunks(chunk_size.max(1))
		.enumerate()
		.map(|(i, chunk)| RemoteRequest::write(path, chunk, i > 0))
		.collect()
}

#[async_trait]
impl RemoteStore for MpremoteStore {
	fn describe(&self) -> String {
		format!("board on {}", self.target.port)
	}

	fn hash_algorithm(&self) -> HashAlgorithm {
		HashAlgorithm::Sha256
	}

	async fn list_all(&mut self) -> RemoteResult<BTreeSet<String>> {
		let reply = self.call(&RemoteRequest::ListAll).await?;
		Ok(reply.files.into_iter().collect())
	}

	async fn hash_of(&mut self, path: &str) -> RemoteResult<Option<ContentHash>> {
		check_path(path)?;
		let reply = self.call(&RemoteRequest::HashOf { path: path.to_string() }).await?;
		Ok(reply.hash.as_deref().map(ContentHash::from_hex))
	}

	async fn mkdir_ancestors(&mut self, path: &str) -> RemoteResult<()> {
		check_path(path)?;
		self.call(&RemoteRequest::MkdirAncestors { path: path.to_string() }).await?;
		Ok(())
	}

	async fn write(&mut self, path: &str, data: &[u8]) -> RemoteResult<()> {
		check_path(path)?;
		let requests = write_requests(path, data, self.target.write_chunk_size);
		if requests.len() > 1 {
			debug!("writing {} in {} chunks", path, requests.len());
		}
		for req in &requests {
			self.call(req).await?;
		}
		Ok(())
	}

	async fn delete(&mut self, path: &str) -> RemoteResult<()> {
		check_path(path)?;
		if path == "/" {
			return Err(RemoteError::InvalidPath("refusing to delete the store root".to_string()));
		}
		self.call(&RemoteRequest::Delete { path: path.to_string() }).await?;
		Ok(())
	}

	async fn list_dir(&mut self, path: &str) -> RemoteResult<Vec<RemoteEntry>> {
		check_path(path)?;
		let reply = self.call(&RemoteRequest::ListDir { path: path.to_string() }).await?;
		let mut entries: Vec<RemoteEntry> = reply
			.entries
			.into_iter()
			.map(|e| RemoteEntry { name: e.name, is_dir: e.dir })
			.collect();
		entries.sort();
		Ok(entries)
	}

	async fn read(&mut self, path: &str) -> RemoteResult<Vec<u8>> {
		check_path(path)?;
		let reply = self.call(&RemoteRequest::Read { path: path.to_string() }).await?;
		if reply.missing {
			return Err(RemoteError::NotFound(path.to_string()));
		}
		reply.decode_data()
	}

	async fn remove_empty_dirs(&mut self) -> RemoteResult<Vec<String>> {
		let reply = self.call(&RemoteRequest::PruneEmptyDirs).await?;
		Ok(reply.removed)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn target(command: &str) -> SerialTarget {
		SerialTarget { command: command.to_string(), timeout_secs: 5, ..SerialTarget::default() }
	}

	#[test]
	fn test_script_has_single_literal() {
		let req = RemoteRequest::HashOf { path: "/it's \"odd\".py".to_string() };
		let script = build_script(&req).unwrap();
		let call = script.lines().last().unwrap();
		assert!(call.starts_with("_main('"));
		assert!(call.ends_with("')"));
		assert_eq!(call.matches('\'').count(), 2);
		assert!(!script.contains("it's"));
	}

	#[test]
	fn test_write_requests_chunking() {
		let data = vec![7u8; 10];
		let reqs = write_requests("/a.bin", &data, 4);
		assert_eq!(reqs.len(), 3);
		let appends: Vec<bool> = reqs
			.iter()
			.map(|r| match r {
				RemoteRequest::Write { append, .. } => *append,
				_ => panic!("not a write"),
			})
			.collect();
		assert_eq!(appends, vec![false, true, true]);
	}

	#[test]
	fn test_write_requests_empty_file() {
		let reqs = write_requests("/empty.py", b"", 4);
		assert_eq!(reqs, vec![RemoteRequest::write("/empty.py", b"", false)]);
	}

	#[tokio::test]
	async fn test_missing_command_is_spawn_error() {
		let mut store = MpremoteStore::new(target("picosync-no-such-helper"));
		let err = store.list_all().await.unwrap_err();
		assert!(matches!(err, RemoteError::Spawn { .. }));
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn test_failing_command_is_transport_error() {
		let mut store = MpremoteStore::new(target("false"));
		let err = store.list_all().await.unwrap_err();
		assert!(matches!(err, RemoteError::Transport { status: Some(1), .. }));
	}

	#[tokio::test]
	async fn test_rejects_bad_path_before_spawning() {
		let mut store = MpremoteStore::new(target("picosync-no-such-helper"));
		let err = store.hash_of("relative.py").await.unwrap_err();
		assert!(matches!(err, RemoteError::InvalidPath(_)));
	}
}

// vim: ts=4
