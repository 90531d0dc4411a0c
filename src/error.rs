//! Error types for AtlasDoc
//!
//! Provides a unified error type for all operations.
//!
//! There is no "not found" variant: the engine reports a missing record as
//! `None` or `false`.

use thiserror::Error;

/// Result type alias using DocError
pub type Result<T> = std::result::Result<T, DocError>;

/// Unified error type for AtlasDoc operations
#[derive(Debug, Error)]
pub enum DocError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Field name '{0}' is reserved for the record identifier")]
    ReservedField(String),

    #[error("Invalid record id '{id}': {reason}")]
    InvalidRecordId { id: String, reason: &'static str },

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption at line {line}: {reason}")]
    WalCorruption { line: u64, reason: String },

    // -------------------------------------------------------------------------
    // Index Errors
    // -------------------------------------------------------------------------
    #[error("Index error: {0}")]
    Index(String),

    #[error("Index corruption detected: {0}")]
    IndexCorruption(String),

    #[error("Index entry for '{expected}' addresses record '{found}'; run compact()")]
    StaleIndex { expected: String, found: String },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DocError {
    /// True for failures caused by stored bytes that cannot be decoded
    /// into what they claim to be. I/O failures return false.
    pub fn is_codec_failure(&self) -> bool {
        matches!(
            self,
            DocError::Codec(_)
                | DocError::ReservedField(_)
                | DocError::InvalidRecordId { .. }
                | DocError::WalCorruption { .. }
                | DocError::IndexCorruption(_)
                | DocError::StaleIndex { .. }
        )
    }
}

impl From<serde_json::Error> for DocError {
    fn from(err: serde_json::Error) -> Self {
        DocError::Codec(err.to_string())
    }
}

impl From<bincode::Error> for DocError {
    fn from(err: bincode::Error) -> Self {
        DocError::IndexCorruption(err.to_string())
    }
}
