//! Error types for the cache's disk layer.
//!
//! These never leave the crate: every failure is logged and treated as a
//! cache miss.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading or writing persisted entries.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem failure
    #[error("cache I/O failed at {path}: {source}")]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Metadata file could not be decoded
    #[error("corrupt cache entry at {path}: {source}")]
    Corrupt {
        /// Metadata file
        path: PathBuf,
        /// Decoding error
        #[source]
        source: serde_json::Error,
    },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
