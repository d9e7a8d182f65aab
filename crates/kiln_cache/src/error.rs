//! Error types for cache operations.

use std::path::PathBuf;

/// Errors that can occur during cache operations.
///
/// The public fetch and store paths never hand these to the caller: fetch
/// folds them into [`CacheResult`](crate::CacheResult) and store logs and
/// swallows them. This enum is used for internal error propagation within
/// the cache subsystem and for construction failures.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading or writing cache files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A metadata record is structurally malformed.
    #[error("corrupt metadata: {reason}")]
    CorruptMetadata {
        /// Description of the structural problem.
        reason: String,
    },

    /// A metadata mapping cannot be represented in the binary record format.
    #[error("metadata too large: {reason}")]
    MetadataTooLarge {
        /// Which key or value exceeded its length prefix.
        reason: String,
    },
}

impl CacheError {
    /// Wraps an I/O error with the path it occurred at.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if this is an I/O error for a file that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }

    /// Renders a one-line diagnostic naming the error class and message.
    pub fn diagnostic(&self) -> String {
        let class = match self {
            Self::Io { source, .. } => format!("{:?}", source.kind()),
            Self::CorruptMetadata { .. } => "CorruptMetadata".to_string(),
            Self::MetadataTooLarge { .. } => "MetadataTooLarge".to_string(),
        };
        format!("{class}: {self}")
    }
}
