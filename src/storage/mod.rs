//! Timefind Persistence
//!
//! This module provides the durable side of an index:
//!
//! - **codec**: Canonical text form of timestamps
//! - **types**: Core data structures (Interval, EntryState, IndexRecord)
//! - **flat_file**: One CSV index file per directory, replaced atomically
//! - **database**: One SQLite table for a whole data source
//! - **error**: Error types
//!
//! # Architecture
//!
//! ```text
//! Flat-file backend:
//!   index_dir/<name>.csv            (root directory)
//!   index_dir/2024-01/<name>.csv    (one per subdirectory)
//!
//! Database backend:
//!   index_db → timefind(begin_time, end_time, last_mod_time, filename)
//! ```

pub mod codec;
pub mod database;
pub mod error;
pub mod flat_file;
pub mod types;

// Re-export commonly used types
pub use codec::CodecError;
pub use database::IndexDatabase;
pub use error::{StorageError, StorageResult};
pub use flat_file::{FlatFile, FlatFileContents};
pub use types::{EntryState, IndexRecord, Interval};
