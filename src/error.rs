//! Error types for LStore
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

use crate::page::Value;

/// Result type alias using LStoreError
pub type Result<T> = std::result::Result<T, LStoreError>;

/// Unified error type for LStore operations
#[derive(Debug, Error)]
pub enum LStoreError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Record Errors
    // -------------------------------------------------------------------------
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Key {0} is locked by another operation")]
    Locked(Value),

    #[error("Malformed request: {0}")]
    Malformed(String),

    // -------------------------------------------------------------------------
    // Merge Errors
    // -------------------------------------------------------------------------
    #[error("Merge step for tail ordinal {ordinal} failed: {reason}")]
    MergeStep { ordinal: u64, reason: String },

    // -------------------------------------------------------------------------
    // Persistence Errors
    // -------------------------------------------------------------------------
    #[error("Corrupt data file: {0}")]
    Corruption(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration / Session Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Table {0} already exists")]
    TableExists(String),

    #[error("Table {0} does not exist")]
    NoSuchTable(String),
}

impl LStoreError {
    /// True for a missing key or RID
    pub fn is_not_found(&self) -> bool {
        matches!(self, LStoreError::NotFound(_))
    }

    /// True when a key lock was already held
    pub fn is_locked(&self) -> bool {
        matches!(self, LStoreError::Locked(_))
    }
}

impl From<bincode::Error> for LStoreError {
    fn from(err: bincode::Error) -> Self {
        LStoreError::Serialization(err.to_string())
    }
}
