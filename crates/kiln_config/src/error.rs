//! Error types for configuration loading and validation.

use std::path::PathBuf;

/// Errors that can occur when loading or validating a `kiln.toml` configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        /// The file that was being read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not valid TOML, or a value has the wrong shape.
    #[error("invalid kiln.toml: {0}")]
    Parse(#[from] toml::de::Error),

    /// A string setting was present but empty.
    #[error("`{0}` must not be empty")]
    EmptyField(&'static str),

    /// A setting parsed but is outside its allowed range.
    #[error("`{field}` {reason}")]
    Invalid {
        /// Dotted name of the setting.
        field: &'static str,
        /// What is wrong with its value.
        reason: &'static str,
    },
}
