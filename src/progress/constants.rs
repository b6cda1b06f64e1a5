//! Progress display constants

/// Separator between local and remote path in upload lines
pub const ARROW: &str = "→";

/// Marks every line of a dry run
pub const DRY_RUN_PREFIX: &str = "(dry run) ";

/// Bytes per kibibyte for display conversions
pub const BYTES_PER_KB: u64 = 1024;
