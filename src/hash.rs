//! Content digests used to detect changed files without transferring them

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Digest algorithm shared by the local side and the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum HashAlgorithm {
	/// SHA-256; the only digest MicroPython boards provide
	#[default]
	Sha256,
	Blake3,
}

impl HashAlgorithm {
	/// Digest `data`
	pub fn digest(self, data: &[u8]) -> ContentHash {
		let hex = match self {
			HashAlgorithm::Sha256 => hex::encode(Sha256::digest(data)),
			HashAlgorithm::Blake3 => blake3::hash(data).to_hex().to_string(),
		};
		ContentHash(hex)
	}

	pub fn name(self) -> &'static str {
		match self {
			HashAlgorithm::Sha256 => "sha256",
			HashAlgorithm::Blake3 => "blake3",
		}
	}
}

impl fmt::Display for HashAlgorithm {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

impl std::str::FromStr for HashAlgorithm {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
			"blake3" => Ok(HashAlgorithm::Blake3),
			other => Err(format!("Unknown hash algorithm: {}", other)),
		}
	}
}

/// Lower-case hex digest
///
/// Equal digests are treated as equal content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(String);

impl ContentHash {
	/// Wrap a hex digest reported by a remote store
	///
	/// Surrounding whitespace is dropped and case is folded, so `ABCD\n` and
	/// `abcd` compare equal.
	pub fn from_hex(hex: &str) -> Self {
		ContentHash(hex.trim().to_ascii_lowercase())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for ContentHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_sha256_known_vector() {
		let h = HashAlgorithm::Sha256.digest(b"hi");
		assert_eq!(h.as_str(), "8f434346648f6b96df89dda901c5176b10a6d83961dd3c1ac88b59b2dc327aa4");
	}

	#[test]
	fn test_blake3_differs_from_sha256() {
		let a = HashAlgorithm::Sha256.digest(b"same");
		let b = HashAlgorithm::Blake3.digest(b"same");
		assert_ne!(a, b);
		assert_eq!(b.as_str().len(), 64);
	}

	#[test]
	fn test_from_hex_normalizes() {
		let a = ContentHash::from_hex("  ABCDEF01\n");
		assert_eq!(a, ContentHash::from_hex("abcdef01"));
	}

	#[test]
	fn test_parse_algorithm() {
		assert_eq!("SHA256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
		assert_eq!("blake3".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Blake3);
		assert!("md5".parse::<HashAlgorithm>().is_err());
	}
}
