//! # picosync - Mirror a Source Tree onto a MicroPython Board
//!
//! picosync makes a remote file store match a local directory: files whose
//! content hash differs are uploaded, remote files with no local counterpart
//! are deleted, and directories left empty are removed. Paths matched by the
//! `.picoignore` file in the source root are neither uploaded nor walked.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use picosync::config::Config;
//! use picosync::engine::{SyncEngine, SyncOptions};
//! use picosync::remote::open_store;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let mut store = open_store(&config.target, config.hash_algorithm)?;
//!     let report = SyncEngine::new(store.as_mut(), SyncOptions::from(&config))
//!         .run(&config.source_dir)
//!         .await?;
//!     println!("Uploaded {} files", report.uploads());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod exclusion;
pub mod hash;
pub mod logging;
pub mod progress;
pub mod remote;
pub mod scan;
pub mod shutdown;

// Re-export commonly used types and functions
pub use config::{Config, SerialTarget, TargetConfig};
pub use engine::{SyncDecision, SyncEngine, SyncEvent, SyncObserver, SyncOptions, SyncReport};
pub use error::SyncError;
pub use exclusion::{IgnoreRule, IgnoreSet};
pub use hash::{ContentHash, HashAlgorithm};
pub use remote::{RemoteError, RemoteStore};
pub use scan::{FileEntry, LocalScanner};

// vim: ts=4
