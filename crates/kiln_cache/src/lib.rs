//! Local, directory-backed artifact cache.
//!
//! Build outputs are stored under content-derived keys as an artifact file
//! plus a small binary metadata record. Writes are staged in temporary files
//! and renamed into place so that an interrupted or concurrent process never
//! sees a partial artifact as valid, and disk usage is held under an optional
//! cap by evicting the least recently accessed files.

#![warn(missing_docs)]

pub mod error;
pub mod eviction;
pub mod metadata;
pub mod result;
pub mod store;

pub use error::CacheError;
pub use eviction::{plan_eviction, CacheFile, TrimReport};
pub use metadata::Metadata;
pub use result::CacheResult;
pub use store::{CacheSettings, DirArtifactCache, StoreHandle, StoreReport};
