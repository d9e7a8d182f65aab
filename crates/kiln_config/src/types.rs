//! Configuration types deserialized from `kiln.toml`.

use std::path::{Path, PathBuf};

use kiln_cache::CacheSettings;
use kiln_common::ByteSize;
use serde::Deserialize;

/// The top-level configuration parsed from `kiln.toml`.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
pub struct KilnConfig {
    /// Directory cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// The `[cache]` section.
#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct CacheConfig {
    /// Display name reported in fetch results and logs.
    #[serde(default = "default_name")]
    pub name: String,
    /// Cache root. Relative paths resolve against the config file's directory.
    #[serde(default = "default_dir")]
    pub dir: String,
    /// Whether the cache accepts new artifacts.
    #[serde(default)]
    pub mode: CacheMode,
    /// Upper bound on the cache root's size. Absent means unbounded.
    #[serde(default)]
    pub max_size: Option<ByteSize>,
}

fn default_name() -> String {
    "dir".to_string()
}

fn default_dir() -> String {
    ".kiln/cache".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            dir: default_dir(),
            mode: CacheMode::default(),
            max_size: None,
        }
    }
}

impl CacheConfig {
    /// Returns the cache root, resolving a relative `dir` against `base_dir`.
    pub fn resolved_dir(&self, base_dir: &Path) -> PathBuf {
        let dir = Path::new(&self.dir);
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            base_dir.join(dir)
        }
    }

    /// Builds the construction settings for a directory cache.
    pub fn settings(&self, base_dir: &Path) -> CacheSettings {
        CacheSettings {
            name: self.name.clone(),
            root: self.resolved_dir(base_dir),
            store_enabled: self.mode == CacheMode::ReadWrite,
            max_size: self.max_size.map(|s| s.bytes()),
        }
    }
}

/// Access mode of the directory cache.
#[derive(Debug, Default, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    /// Fetch and store.
    #[default]
    ReadWrite,
    /// Fetch only; stores are no-ops.
    ReadOnly,
}
