use std::path::PathBuf;

use thiserror::Error;

/// Storage-specific error types for the pillbox consumption log.
///
/// These errors represent failures while reading, serializing or durably
/// writing daily logs and captured frames.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A persisted log could not be parsed
    #[error("Corrupt log file {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// Data validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Date/time parsing or formatting error
    #[error("DateTime error: {0}")]
    DateTime(String),

    /// Write rejected by the store (used by the in-memory store to simulate
    /// a full or read-only medium)
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StorageError {
    /// Create a corrupt-file error.
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Specialized result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
