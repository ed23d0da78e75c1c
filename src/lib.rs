//! # Timefind
//!
//! Incremental time-range index over directories of time-stamped data files.
//! Answers "which files hold records between these two instants?" without
//! reading any file contents at query time.
//!
//! ## Features
//!
//! - **Incremental updates**: only new or modified files are re-read
//! - **Pluggable processors**: one extractor per declared data type
//! - **Two backends**: per-directory CSV files or a single SQLite table
//! - **Crash-safe writes**: atomic file replacement / one transaction
//!
//! ## Modules
//!
//! - [`index`]: Index tree, update and time-range query
//! - [`storage`]: Time codec, record types and persistence backends
//! - [`processor`]: Interval extraction from data files
//! - [`config`]: Data source configuration
//! - [`logging`]: Subscriber setup for the binaries
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use timefind::{Configuration, Index, ProcessorRegistry};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Configuration::new("web", "log")
//!         .index_dir("/var/lib/timefind/web")
//!         .path("/var/log/web")
//!         .include("*.log")
//!         .finalize()?;
//!
//!     let registry = ProcessorRegistry::with_builtins()?;
//!     let mut index = Index::open(Arc::new(config), &registry)?;
//!     index.update()?;
//!     index.write_out()?;
//!
//!     let start = chrono::Utc::now() - chrono::Duration::hours(1);
//!     for record in index.find_logs(&start, &chrono::Utc::now())? {
//!         println!("{}", record.path);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod index;
pub mod logging;
pub mod processor;
pub mod storage;

// Re-export top-level types for convenience
pub use config::{ConfigError, Configuration, FileMatcher, StorageKind};

pub use index::{Entry, Index, IndexError, IndexResult, IndexStats};

pub use processor::{parse_timestamp, Processor, ProcessorError, ProcessorRegistry};

pub use storage::{EntryState, IndexRecord, Interval, StorageError, StorageResult};
