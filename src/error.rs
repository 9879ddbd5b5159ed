//! Error types for the feedrank library.
//!
//! All fallible operations return [`Result`], whose error side is the
//! [`FeedrankError`] enum. The four ranking-specific variants
//! (`IndexUnavailable`, `CorruptStats`, `InvalidQuery`, `EmptyFeedbackSet`)
//! carry the failure semantics callers are expected to branch on; the rest
//! wrap lower-level failures.
//!
//! # Examples
//!
//! ```
//! use feedrank::error::{FeedrankError, Result};
//!
//! fn parse_something(text: &str) -> Result<()> {
//!     if text.is_empty() {
//!         return Err(FeedrankError::invalid_query("empty query"));
//!     }
//!     Ok(())
//! }
//!
//! assert!(parse_something("").is_err());
//! ```

use std::io;

use thiserror::Error;

/// The main error type for feedrank operations.
#[derive(Error, Debug)]
pub enum FeedrankError {
    /// I/O errors (file operations, lock files, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The index snapshot is missing or the read handle has been closed.
    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    /// A statistics side field could not be decoded.
    #[error("Corrupt statistics: {0}")]
    CorruptStats(String),

    /// The query text could not be parsed.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A feedback request referenced no usable documents.
    #[error("Feedback set contains no valid document references")]
    EmptyFeedbackSet,

    /// Index-related errors (writer lock, bad document, etc.)
    #[error("Index error: {0}")]
    Index(String),

    /// Analysis-related errors (tokenization, filtering, etc.)
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A caller-supplied deadline elapsed before an operation finished
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Binary (de)serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for operations that may fail with FeedrankError.
pub type Result<T> = std::result::Result<T, FeedrankError>;

impl FeedrankError {
    /// Create a new index-unavailable error.
    pub fn unavailable<S: Into<String>>(msg: S) -> Self {
        FeedrankError::IndexUnavailable(msg.into())
    }

    /// Create a new corrupt-statistics error.
    pub fn corrupt_stats<S: Into<String>>(msg: S) -> Self {
        FeedrankError::CorruptStats(msg.into())
    }

    /// Create a new invalid-query error.
    pub fn invalid_query<S: Into<String>>(msg: S) -> Self {
        FeedrankError::InvalidQuery(msg.into())
    }

    /// Create a new index error.
    pub fn index<S: Into<String>>(msg: S) -> Self {
        FeedrankError::Index(msg.into())
    }

    /// Create a new analysis error.
    pub fn analysis<S: Into<String>>(msg: S) -> Self {
        FeedrankError::Analysis(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        FeedrankError::Storage(msg.into())
    }

    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        FeedrankError::Config(msg.into())
    }

    /// Create a new timeout error.
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        FeedrankError::Timeout(msg.into())
    }

    /// Create a new serialization error.
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        FeedrankError::Serialization(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        FeedrankError::Other(msg.into())
    }

    /// Whether this error means the index handle cannot serve the request.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, FeedrankError::IndexUnavailable(_))
    }
}

impl From<bincode::Error> for FeedrankError {
    fn from(err: bincode::Error) -> Self {
        FeedrankError::serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = FeedrankError::unavailable("closed");
        assert_eq!(error.to_string(), "Index unavailable: closed");
        assert!(error.is_unavailable());

        let error = FeedrankError::invalid_query("unbalanced quote");
        assert_eq!(error.to_string(), "Invalid query: unbalanced quote");
        assert!(!error.is_unavailable());

        let error = FeedrankError::EmptyFeedbackSet;
        assert_eq!(
            error.to_string(),
            "Feedback set contains no valid document references"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let error = FeedrankError::from(io_error);

        match error {
            FeedrankError::Io(_) => {}
            _ => panic!("Expected IO error variant"),
        }
    }
}
