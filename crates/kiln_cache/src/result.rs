//! Outcome of a cache fetch.

use std::fmt;

use crate::metadata::Metadata;

/// Result of looking up an artifact in the cache.
///
/// Both [`Miss`](CacheResult::Miss) and [`Error`](CacheResult::Error) mean
/// the caller should proceed as if no cache existed. An error carries a
/// diagnostic for the build log but must never fail the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheResult {
    /// The artifact was found and copied to the requested destination.
    Hit {
        /// Name of the cache that served the artifact.
        cache_name: String,
        /// Metadata recorded when the artifact was stored.
        metadata: Metadata,
    },
    /// No complete entry exists for the key.
    Miss,
    /// The entry exists but could not be read.
    Error {
        /// Name of the cache that failed.
        cache_name: String,
        /// Error class and message.
        diagnostic: String,
    },
}

impl CacheResult {
    /// Returns `true` for a hit.
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit { .. })
    }

    /// Returns the fetched metadata, if this is a hit.
    pub fn metadata(&self) -> Option<&Metadata> {
        match self {
            Self::Hit { metadata, .. } => Some(metadata),
            _ => None,
        }
    }

    /// Returns the name of the cache that produced this result, if any.
    pub fn cache_name(&self) -> Option<&str> {
        match self {
            Self::Hit { cache_name, .. } | Self::Error { cache_name, .. } => Some(cache_name),
            Self::Miss => None,
        }
    }
}

impl fmt::Display for CacheResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hit { .. } => f.write_str("hit"),
            Self::Miss => f.write_str("miss"),
            Self::Error { diagnostic, .. } => write!(f, "error ({diagnostic})"),
        }
    }
}
