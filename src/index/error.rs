//! Index error types
//!
//! Configuration problems abort work on a data source. Storage errors come
//! from loading or writing the persisted index. Problems with individual data
//! files never show up here; they are logged and the file is skipped.

use crate::config::ConfigError;
use crate::storage::StorageError;
use thiserror::Error;

/// Errors that can occur while building, updating or querying an index
#[derive(Error, Debug)]
pub enum IndexError {
    /// No processor is registered for the configured data type
    #[error("Configuration specified unknown data type: {0}")]
    UnknownProcessor(String),

    /// Configuration is unusable
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Persisted index could not be read or written
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;
