//! Error types for the cache controller.
//!
//! Store, configuration and state errors surface as `CacheError`. Network
//! failures have their own type in `network::error` because the router
//! treats them differently from internal faults.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt cache entry {path}: {reason}")]
    CorruptEntry { path: PathBuf, reason: String },

    #[error("Invalid cache version name: {0}")]
    InvalidVersion(String),

    #[error("No active cache version")]
    NoActiveCache,

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptEntry {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
