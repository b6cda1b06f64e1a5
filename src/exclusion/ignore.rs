//! Ignore-rule file parsing and path matching

use std::io;
use std::path::{Component, Path};

use super::patterns::{compile_pattern, IgnoreRule};
use super::ExclusionError;
use crate::logging::*;

/// Compiled exclusion rules for one sync root
#[derive(Debug, Clone, Default)]
pub struct IgnoreSet {
	rules: Vec<IgnoreRule>,
}

impl IgnoreSet {
	/// A set that excludes nothing
	pub fn empty() -> Self {
		Self { rules: Vec::new() }
	}

	/// Compile already-cleaned pattern lines
	pub fn from_patterns<I, S>(patterns: I) -> Result<Self, ExclusionError>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let rules = patterns
			.into_iter()
			.map(|p| compile_pattern(p.as_ref()))
			.collect::<Result<Vec<_>, _>>()?;
		Ok(Self { rules })
	}

	/// Compile the contents of a rule file
	pub fn from_contents(contents: &str) -> Result<Self, ExclusionError> {
		Self::from_patterns(parse_contents(contents))
	}

	/// Load a rule file
	///
	/// A missing file means "no exclusions". A file that exists but cannot be
	/// read (permissions, invalid UTF-8, a directory in its place) is an error:
	/// falling back to an empty set would sync files the user meant to keep off
	/// the target.
	pub fn load(path: &Path) -> Result<Self, ExclusionError> {
		match std::fs::read_to_string(path) {
			Ok(contents) => {
				let set = Self::from_contents(&contents)?;
				info!("Loaded {} ignore rules from {}", set.len(), path.display());
				Ok(set)
			}
			Err(e) if e.kind() == io::ErrorKind::NotFound => {
				debug!("No ignore file at {}", path.display());
				Ok(Self::empty())
			}
			Err(e) => Err(ExclusionError::IgnoreFileError(format!(
				"Failed to read {}: {}",
				path.display(),
				e
			))),
		}
	}

	/// Check whether `path` (somewhere under `root`) is excluded
	///
	/// The path is made root-relative and `/`-separated first. A rule matches if
	/// it matches either that relative path or the bare final component, so
	/// `*.log` catches log files at any depth.
	pub fn is_excluded(&self, path: &Path, root: &Path) -> bool {
		if self.rules.is_empty() {
			return false;
		}
		self.is_excluded_relative(&relative_slash_path(path, root))
	}

	/// Same as [`is_excluded`](Self::is_excluded) for an already-normalized path
	pub fn is_excluded_relative(&self, rel: &str) -> bool {
		let basename = rel.rsplit('/').next().unwrap_or(rel);
		self.rules.iter().any(|rule| rule.matches(rel) || rule.matches(basename))
	}

	/// Pattern strings in file order
	pub fn patterns(&self) -> impl Iterator<Item = &str> {
		self.rules.iter().map(|r| r.pattern())
	}

	pub fn len(&self) -> usize {
		self.rules.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rules.is_empty()
	}
}

/// Strip blank and `#` comment lines, trimming what remains
pub fn parse_contents(contents: &str) -> Vec<String> {
	contents
		.lines()
		.filter_map(|line| {
			let line = line.trim();
			if line.is_empty() || line.starts_with('#') {
				return None;
			}
			Some(line.to_string())
		})
		.collect()
}

/// Root-relative path with `/` separators
///
/// `root` itself becomes `"."`. A path outside `root` is used as given.
/// Backslashes inside names are folded to `/` as well, so the same string is
/// produced on every platform.
pub fn relative_slash_path(path: &Path, root: &Path) -> String {
	let rel = path.strip_prefix(root).unwrap_or(path);
	let joined = rel
		.components()
		.filter_map(|c| match c {
			Component::Normal(s) => Some(s.to_string_lossy()),
			Component::ParentDir => Some("..".into()),
			_ => None,
		})
		.collect::<Vec<_>>()
		.join("/");

	if joined.is_empty() {
		".".to_string()
	} else {
		joined.replace('\\', "/")
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	#[test]
	fn test_parse_ignore_contents() {
		let contents = r#"
# This is a comment
*.log
   build/

# Another comment
	lib/**/test_*.py
"#;

		let patterns = parse_contents(contents);
		assert_eq!(patterns, vec!["*.log", "build/", "lib/**/test_*.py"]);
	}

	#[test]
	fn test_basename_match_at_any_depth() {
		let set = IgnoreSet::from_patterns(["*.log"]).unwrap();
		let root = Path::new("/proj/src");

		assert!(set.is_excluded(Path::new("/proj/src/a.log"), root));
		assert!(set.is_excluded(Path::new("/proj/src/sub/dir/b.log"), root));
		assert!(!set.is_excluded(Path::new("/proj/src/sub/b.txt"), root));
	}

	#[test]
	fn test_directory_rule_and_sibling_file() {
		let set = IgnoreSet::from_patterns(["build/"]).unwrap();
		let root = Path::new("/r");

		assert!(set.is_excluded(Path::new("/r/build"), root));
		assert!(set.is_excluded(Path::new("/r/build/x.bin"), root));
		assert!(set.is_excluded(Path::new("/r/nested/build"), root));
		assert!(!set.is_excluded(Path::new("/r/build.txt"), root));
	}

	#[test]
	fn test_relative_path_rule() {
		let set = IgnoreSet::from_patterns(["lib/secrets.py"]).unwrap();
		assert!(set.is_excluded_relative("lib/secrets.py"));
		assert!(!set.is_excluded_relative("other/lib/secrets.py"));
		assert!(!set.is_excluded_relative("secrets.py"));
	}

	#[test]
	fn test_empty_set_excludes_nothing() {
		let set = IgnoreSet::empty();
		assert!(set.is_empty());
		assert!(!set.is_excluded(Path::new("/r/anything"), Path::new("/r")));
	}

	#[test]
	fn test_relative_slash_path() {
		let root = Path::new("/a/b");
		assert_eq!(relative_slash_path(Path::new("/a/b/c/d.py"), root), "c/d.py");
		assert_eq!(relative_slash_path(Path::new("/a/b"), root), ".");
		assert_eq!(relative_slash_path(Path::new("x/y"), root), "x/y");
	}

	#[test]
	fn test_load_missing_file_is_empty() {
		let temp_dir = TempDir::new().unwrap();
		let set = IgnoreSet::load(&temp_dir.path().join(".picoignore")).unwrap();
		assert!(set.is_empty());
	}

	#[test]
	fn test_load_file() {
		let temp_dir = TempDir::new().unwrap();
		let path = temp_dir.path().join(".picoignore");
		fs::write(&path, "# comment\n\n*.tmp\n__pycache__/\n").unwrap();

		let set = IgnoreSet::load(&path).unwrap();
		assert_eq!(set.patterns().collect::<Vec<_>>(), vec!["*.tmp", "__pycache__/"]);
	}

	#[test]
	fn test_load_unreadable_file_is_error() {
		let temp_dir = TempDir::new().unwrap();
		// A directory where the rule file should be cannot be read as text
		let path = temp_dir.path().join(".picoignore");
		fs::create_dir(&path).unwrap();

		let err = IgnoreSet::load(&path).unwrap_err();
		assert!(matches!(err, ExclusionError::IgnoreFileError(_)));
	}

	#[test]
	fn test_load_invalid_utf8_is_error() {
		let temp_dir = TempDir::new().unwrap();
		let path = temp_dir.path().join(".picoignore");
		fs::write(&path, [0xff, 0xfe, b'\n']).unwrap();

		assert!(IgnoreSet::load(&path).is_err());
	}
}
