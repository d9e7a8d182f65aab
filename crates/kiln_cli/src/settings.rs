//! Resolves cache settings from `kiln.toml` and command-line overrides.

use std::path::{Path, PathBuf};

use kiln_cache::CacheSettings;
use kiln_config::{find_config, load_config_file, KilnConfig};
use tracing::debug;

use crate::GlobalArgs;

/// Builds the cache settings for this invocation.
///
/// Uses `--config` if given, otherwise the nearest `kiln.toml` above the
/// current directory, otherwise the defaults. Command-line flags win over
/// the file.
pub fn resolve(global: &GlobalArgs) -> Result<CacheSettings, Box<dyn std::error::Error>> {
    let cwd = std::env::current_dir()?;
    let config_path = global.config.clone().or_else(|| find_config(&cwd));

    let (config, base_dir) = match config_path {
        Some(path) => {
            debug!("using configuration {}", path.display());
            let config = load_config_file(&path)?;
            (config, config_dir(&path, &cwd))
        }
        None => {
            debug!("no {} found, using defaults", kiln_config::CONFIG_FILE);
            (KilnConfig::default(), cwd)
        }
    };

    Ok(apply_overrides(config.cache.settings(&base_dir), global))
}

/// Returns the directory a config file's relative paths resolve against.
fn config_dir(path: &Path, cwd: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => cwd.join(parent),
        _ => cwd.to_path_buf(),
    }
}

/// Applies command-line overrides on top of file settings.
fn apply_overrides(mut settings: CacheSettings, global: &GlobalArgs) -> CacheSettings {
    if let Some(dir) = &global.cache_dir {
        settings.root = dir.clone();
    }
    if let Some(size) = global.max_size {
        settings.max_size = Some(size.bytes());
    }
    if global.read_only {
        settings.store_enabled = false;
    }
    settings
}
