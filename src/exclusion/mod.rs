//! Exclusion rules
//!
//! Provides the pattern compiler and the per-root rule set used to prune the
//! local scan.

mod ignore;
mod patterns;

pub use ignore::{parse_contents, relative_slash_path, IgnoreSet};
pub use patterns::{compile_pattern, translate, IgnoreRule};

use crate::error::SyncError;

/// Errors that can occur during exclusion processing
#[derive(Debug)]
pub enum ExclusionError {
	/// Pattern could not be compiled
	InvalidPattern(String),

	/// Failed to read an ignore file
	IgnoreFileError(String),
}

impl std::fmt::Display for ExclusionError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ExclusionError::InvalidPattern(msg) => {
				write!(f, "Invalid exclusion pattern: {}", msg)
			}
			ExclusionError::IgnoreFileError(msg) => {
				write!(f, "Ignore file error: {}", msg)
			}
		}
	}
}

impl std::error::Error for ExclusionError {}

impl From<ExclusionError> for SyncError {
	fn from(e: ExclusionError) -> Self {
		SyncError::Config { message: e.to_string() }
	}
}

// vim: ts=4
