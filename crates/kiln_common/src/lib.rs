//! Shared foundational types used across the Kiln artifact cache.
//!
//! This crate provides content hashes, validated cache keys and
//! human-readable byte sizes.

#![warn(missing_docs)]

pub mod hash;
pub mod key;
pub mod size;

pub use hash::ContentHash;
pub use key::{CacheKey, ParseCacheKeyError, METADATA_SUFFIX, TEMP_SUFFIX};
pub use size::{ByteSize, ParseByteSizeError};
