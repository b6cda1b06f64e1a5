//! Error types for picosync operations

use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::remote::RemoteError;

/// Main error type for sync operations
#[derive(Debug)]
pub enum SyncError {
	/// Ignore-rule file or config file present but unusable
	Config { message: String },

	/// A remote operation did not complete; the run is aborted
	RemoteUnavailable(RemoteError),

	/// A local file or directory could not be read
	LocalIo { path: PathBuf, source: io::Error },

	/// Two local files mapped onto the same remote path
	DuplicateRemotePath { path: String },

	/// Operation aborted by user
	Aborted,
}

impl SyncError {
	pub(crate) fn local_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
		SyncError::LocalIo { path: path.into(), source }
	}

	pub(crate) fn config(message: impl Into<String>) -> Self {
		SyncError::Config { message: message.into() }
	}
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncError::Config { message } => write!(f, "Invalid configuration: {}", message),
			SyncError::RemoteUnavailable(e) => write!(f, "Remote unavailable: {}", e),
			SyncError::LocalIo { path, source } => {
				write!(f, "Cannot read {}: {}", path.display(), source)
			}
			SyncError::DuplicateRemotePath { path } => {
				write!(f, "More than one local file maps to remote path {}", path)
			}
			SyncError::Aborted => write!(f, "Operation aborted by user"),
		}
	}
}

impl Error for SyncError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			SyncError::RemoteUnavailable(e) => Some(e),
			SyncError::LocalIo { source, .. } => Some(source),
			_ => None,
		}
	}
}

impl From<RemoteError> for SyncError {
	fn from(e: RemoteError) -> Self {
		SyncError::RemoteUnavailable(e)
	}
}


// vim: ts=4
