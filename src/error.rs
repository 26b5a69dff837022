//! Error types for AtlasDoc
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using AtlasError
pub type Result<T> = std::result::Result<T, AtlasError>;

/// Unified error type for AtlasDoc operations
#[derive(Debug, Error)]
pub enum AtlasError {
    // -------------------------------------------------------------------------
    // Open Errors
    // -------------------------------------------------------------------------
    /// The store file could not be opened (missing without create, bad
    /// format, or I/O failure while opening)
    #[error("Failed to open {}: {reason}", path.display())]
    Open { path: PathBuf, reason: String },

    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    /// No live entry exists for the requested id (absent or deleted)
    #[error("Document not found")]
    NotFound,

    // -------------------------------------------------------------------------
    // Engine Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Caller Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------
    /// Visitor-requested stop. Raised inside the engine's iteration loop and
    /// translated back into a successful walk; never a failure for callers.
    #[error("Iteration cancelled")]
    Cancelled,

    #[error("Store is closed")]
    Closed,
}

impl AtlasError {
    /// True for the visitor-requested stop signal
    pub fn is_cancel(&self) -> bool {
        matches!(self, AtlasError::Cancelled)
    }

    /// True when the id has no live entry
    pub fn is_not_found(&self) -> bool {
        matches!(self, AtlasError::NotFound)
    }

    pub(crate) fn open(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        AtlasError::Open {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<bincode::Error> for AtlasError {
    fn from(err: bincode::Error) -> Self {
        AtlasError::Serialization(err.to_string())
    }
}
