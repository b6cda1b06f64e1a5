//! Structured requests and replies for the on-device agent
//!
//! A request is data, never code: it is serialized to JSON, wrapped in
//! base64, and handed to a fixed agent program. Base64 text has no quote or
//! backslash characters, so file names containing `'` or `"` cannot change
//! what runs on the board.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::error::RemoteError;
use super::RemoteResult;

/// Prefix of the single reply line the agent prints
pub const REPLY_MARKER: &str = "@@picosync ";

/// One operation for the agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RemoteRequest {
	/// Every file below `/`, recursively
	ListAll,

	/// SHA-256 of one file, or null if it does not exist
	HashOf { path: String },

	/// Create the directories above `path`
	MkdirAncestors { path: String },

	/// Store base64 `data` at `path`; `append` continues a chunked write
	Write { path: String, data: String, append: bool },

	/// Remove a file, or a directory that is already empty
	Delete { path: String },

	/// Names directly inside `path`
	ListDir { path: String },

	/// Whole content of one file
	Read { path: String },

	/// Remove empty directories bottom-up, keeping `/`
	PruneEmptyDirs,
}

impl RemoteRequest {
	pub fn write(path: &str, data: &[u8], append: bool) -> Self {
		RemoteRequest::Write { path: path.to_string(), data: BASE64.encode(data), append }
	}

	/// Short operation name for logs and timeouts
	pub fn operation(&self) -> &'static str {
		match self {
			RemoteRequest::ListAll => "list_all",
			RemoteRequest::HashOf { .. } => "hash_of",
			RemoteRequest::MkdirAncestors { .. } => "mkdir_ancestors",
			RemoteRequest::Write { .. } => "write",
			RemoteRequest::Delete { .. } => "delete",
			RemoteRequest::ListDir { .. } => "list_dir",
			RemoteRequest::Read { .. } => "read",
			RemoteRequest::PruneEmptyDirs => "prune_empty_dirs",
		}
	}

	/// Target path, if the operation has one
	pub fn path(&self) -> Option<&str> {
		match self {
			RemoteRequest::HashOf { path }
			| RemoteRequest::MkdirAncestors { path }
			| RemoteRequest::Write { path, .. }
			| RemoteRequest::Delete { path }
			| RemoteRequest::ListDir { path }
			| RemoteRequest::Read { path } => Some(path.as_str()),
			RemoteRequest::ListAll | RemoteRequest::PruneEmptyDirs => None,
		}
	}

	/// JSON wrapped in base64, ready to be embedded as a string literal
	pub fn encode(&self) -> RemoteResult<String> {
		let json = serde_json::to_vec(self)?;
		Ok(BASE64.encode(json))
	}
}

/// One name in a directory listing
#[derive(Debug, Clone, Deserialize)]
pub struct AgentEntry {
	pub name: String,
	#[serde(default)]
	pub dir: bool,
}

/// Reply line printed by the agent
///
/// Only the fields relevant to the request are present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AgentReply {
	pub ok: bool,
	pub error: Option<String>,
	pub files: Vec<String>,
	pub hash: Option<String>,
	pub entries: Vec<AgentEntry>,
	pub data: Option<String>,
	pub removed: Vec<String>,

	/// Set by `read` when the path does not exist
	pub missing: bool,
}

impl AgentReply {
	/// Turn an `ok: false` reply into an error
	pub fn into_result(self) -> RemoteResult<Self> {
		if self.ok {
			Ok(self)
		} else {
			Err(RemoteError::Device(self.error.unwrap_or_else(|| "unknown error".to_string())))
		}
	}

	/// Decode the `data` field of a read reply
	pub fn decode_data(&self) -> RemoteResult<Vec<u8>> {
		let data = self
			.data
			.as_deref()
			.ok_or_else(|| RemoteError::Malformed("reply has no data field".to_string()))?;
		// b2a_base64 output may carry a trailing newline
		let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
		Ok(BASE64.decode(cleaned)?)
	}
}

/// Find and parse the reply line in captured agent output
///
/// Anything else the board prints (boot banners, stray `print`s in
/// `boot.py`) is ignored. The last marker line wins.
pub fn parse_reply(stdout: &str) -> RemoteResult<AgentReply> {
	let line = stdout
		.lines()
		.rev()
		.find_map(|l| l.trim_end_matches('\r').strip_prefix(REPLY_MARKER))
		.ok_or_else(|| {
			RemoteError::Malformed(format!("no reply line in output: {:?}", truncate(stdout, 200)))
		})?;
	Ok(serde_json::from_str(line)?)
}

fn truncate(s: &str, max: usize) -> &str {
	match s.char_indices().nth(max) {
		Some((idx, _)) => &s[..idx],
		None => s,
	}
}
