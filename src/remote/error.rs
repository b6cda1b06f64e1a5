//! Remote store error types

use std::fmt;
use std::io;

/// Failure of a single remote operation
#[derive(Debug)]
pub enum RemoteError {
	/// Transport helper could not be started
	Spawn { command: String, source: io::Error },

	/// No reply within the configured time
	Timeout { operation: &'static str, secs: u64 },

	/// Transport helper exited unsuccessfully (board unplugged, port busy, ...)
	Transport { status: Option<i32>, stderr: String },

	/// The target ran the request and reported a failure
	Device(String),

	/// The target has no file at the requested path
	NotFound(String),

	/// Reply could not be understood
	Malformed(String),

	/// Remote path is not absolute or escapes the store root
	InvalidPath(String),

	/// Operation or setting not available on this store
	Unsupported(String),

	/// I/O error on a locally mounted store
	Io(io::Error),
}

impl fmt::Display for RemoteError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RemoteError::Spawn { command, source } => {
				write!(f, "Failed to spawn '{}': {}", command, source)
			}
			RemoteError::Timeout { operation, secs } => {
				write!(f, "{} timed out after {}s", operation, secs)
			}
			RemoteError::Transport { status, stderr } => match status {
				Some(code) => write!(f, "Transport exited with status {}: {}", code, stderr.trim()),
				None => write!(f, "Transport terminated by signal: {}", stderr.trim()),
			},
			RemoteError::Device(msg) => write!(f, "Target error: {}", msg),
			RemoteError::NotFound(path) => write!(f, "No such file on target: {}", path),
			RemoteError::Malformed(msg) => write!(f, "Malformed reply: {}", msg),
			RemoteError::InvalidPath(path) => write!(f, "Invalid remote path: {}", path),
			RemoteError::Unsupported(msg) => write!(f, "Unsupported: {}", msg),
			RemoteError::Io(e) => write!(f, "I/O error: {}", e),
		}
	}
}

impl std::error::Error for RemoteError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			RemoteError::Spawn { source, .. } => Some(source),
			RemoteError::Io(e) => Some(e),
			_ => None,
		}
	}
}

impl From<io::Error> for RemoteError {
	fn from(e: io::Error) -> Self {
		RemoteError::Io(e)
	}
}

impl From<serde_json::Error> for RemoteError {
	fn from(e: serde_json::Error) -> Self {
		RemoteError::Malformed(e.to_string())
	}
}

impl From<base64::DecodeError> for RemoteError {
	fn from(e: base64::DecodeError) -> Self {
		RemoteError::Malformed(format!("base64: {}", e))
	}
}

// vim: ts=4
