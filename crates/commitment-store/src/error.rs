//! Ledger errors.

use commitment_core::Cpid;
use thiserror::Error;

/// Errors from any ledger implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// `replace` named a record the ledger does not hold.
    #[error("record not found: {0}")]
    NotFound(Cpid),

    /// A record with this identifier already exists.
    #[error("duplicate record: {0}")]
    Duplicate(Cpid),

    /// Stored identifier does not match the packet contents.
    #[error("identifier mismatch: stored {stored}, computed {computed}")]
    IdMismatch { stored: Cpid, computed: Cpid },

    /// A stored value is out of range for its Rust type.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// The schema cannot be brought to the supported version.
    #[error("migration error: {0}")]
    Migration(String),

    /// A lock guarding ledger state was poisoned by a panicking writer.
    #[error("ledger lock poisoned: {0}")]
    Poisoned(String),

    /// A blocking task failed to complete.
    #[error("background task failed: {0}")]
    Task(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        StoreError::Task(e.to_string())
    }
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, StoreError>;
