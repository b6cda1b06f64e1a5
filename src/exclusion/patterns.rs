//! Compilation of gitignore-style patterns into anchored path matchers
//!
//! Wildcards follow the usual ignore-file conventions:
//!
//! | pattern | matches |
//! |---------|---------|
//! | `*`     | any run of characters except `/` |
//! | `?`     | exactly one character except `/` |
//! | `**`    | any run of characters, `/` included |
//! | `dir/`  | the directory `dir` and everything below it, but not a file named `dir.x` |
//!
//! Every other character is literal. The resulting expression is anchored at
//! both ends and is matched against a `/`-separated path relative to the sync
//! root (see [`IgnoreSet`](super::IgnoreSet)).

use regex::Regex;

use super::ExclusionError;

/// Regex fragment for a single `*`
const STAR: &str = "[^/]*";

/// Regex fragment for `?`
const QUESTION: &str = "[^/]";

/// Regex fragment for `**`
const DOUBLE_STAR: &str = ".*";

/// Suffix appended to directory-scoped rules
const DIR_SUFFIX: &str = "(?:/.*)?";

/// One compiled exclusion rule
#[derive(Debug, Clone)]
pub struct IgnoreRule {
	/// Pattern text as written in the rule file
	pattern: String,

	/// Anchored matcher
	regex: Regex,

	/// Trailing-slash rule: matches the directory and anything under it
	dir_scoped: bool,
}

impl IgnoreRule {
	/// Original pattern text
	pub fn pattern(&self) -> &str {
		&self.pattern
	}

	/// Whether the rule was written with a trailing `/`
	pub fn is_dir_scoped(&self) -> bool {
		self.dir_scoped
	}

	/// Source of the compiled expression
	pub fn as_regex(&self) -> &str {
		self.regex.as_str()
	}

	/// Test a normalized, root-relative path (or a bare file name)
	pub fn matches(&self, path: &str) -> bool {
		self.regex.is_match(path)
	}
}

/// Compile one pattern line
///
/// The line must already be trimmed and must not be blank or a comment. Any
/// text is a valid pattern; the only possible failure is an expression too
/// large for the regex engine's size limit.
pub fn compile_pattern(raw: &str) -> Result<IgnoreRule, ExclusionError> {
	let (source, dir_scoped) = translate(raw);
	let regex = Regex::new(&source)
		.map_err(|e| ExclusionError::InvalidPattern(format!("{}: {}", raw, e)))?;

	Ok(IgnoreRule { pattern: raw.to_string(), regex, dir_scoped })
}

/// Translate pattern text into an anchored regex source
///
/// Returns the expression and the directory-scoped flag. Literal runs are
/// escaped before wildcards are substituted, and `**` is recognised before
/// `*`, so a double star is never consumed as two single stars.
pub fn translate(raw: &str) -> (String, bool) {
	let normalized = raw.replace('\\', "/");
	let (body, dir_scoped) = match normalized.strip_suffix('/') {
		Some(body) => (body, true),
		None => (normalized.as_str(), false),
	};

	// (?s) lets `**` cross any character, newlines in odd file names included
	let mut out = String::with_capacity(body.len() * 2 + 16);
	out.push_str("(?s)^");

	let mut literal = String::new();
	let mut chars = body.chars().peekable();
	while let Some(c) = chars.next() {
		let fragment = match c {
			'*' if chars.peek() == Some(&'*') => {
				chars.next();
				DOUBLE_STAR
			}
			'*' => STAR,
			'?' => QUESTION,
			other => {
				literal.push(other);
				continue;
			}
		};
		out.push_str(&regex::escape(&literal));
		literal.clear();
		out.push_str(fragment);
	}
	out.push_str(&regex::escape(&literal));

	if dir_scoped {
		out.push_str(DIR_SUFFIX);
	}
	out.push('$');

	(out, dir_scoped)
}
