//! Configuration file discovery, loading and validation.

use crate::error::ConfigError;
use crate::types::KilnConfig;
use std::path::{Path, PathBuf};

/// Name of the configuration file.
pub const CONFIG_FILE: &str = "kiln.toml";

/// Walks up from `start` looking for the nearest `kiln.toml`.
///
/// Returns the path of the file itself, or `None` if no ancestor has one.
pub fn find_config(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE))
        .find(|candidate| candidate.is_file())
}

/// Loads and validates `<project_dir>/kiln.toml`.
pub fn load_config(project_dir: &Path) -> Result<KilnConfig, ConfigError> {
    load_config_file(&project_dir.join(CONFIG_FILE))
}

/// Loads and validates a configuration file at an explicit path.
pub fn load_config_file(path: &Path) -> Result<KilnConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    load_config_from_str(&content)
}

/// Parses and validates a `kiln.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<KilnConfig, ConfigError> {
    let config: KilnConfig = toml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &KilnConfig) -> Result<(), ConfigError> {
    if config.cache.name.is_empty() {
        return Err(ConfigError::EmptyField("cache.name"));
    }
    if config.cache.dir.is_empty() {
        return Err(ConfigError::EmptyField("cache.dir"));
    }
    if config.cache.max_size.is_some_and(|s| s.bytes() == 0) {
        return Err(ConfigError::Invalid {
            field: "cache.max_size",
            reason: "must be greater than zero",
        });
    }
    Ok(())
}
