//! Persistence error types
//!
//! Defines all errors that can occur while reading or writing an index.

use crate::storage::codec::CodecError;
use thiserror::Error;

/// Errors that can occur in the persistence backends
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Flat-file record could not be read or written
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// SQLite statement or transaction failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Persisted record has the wrong shape
    #[error("Bad formatting in index {0}")]
    Format(String),

    /// Persisted timestamp could not be decoded
    #[error("Bad timestamp: {0}")]
    Codec(#[from] CodecError),
}

impl From<tempfile::PersistError> for StorageError {
    fn from(err: tempfile::PersistError) -> Self {
        StorageError::Io(err.error)
    }
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
