//! Errors raised while reading `qou.toml`.

use std::path::PathBuf;

/// Why a project configuration could not be produced.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `qou.toml` could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// The configuration file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not valid TOML or does not match the schema.
    #[error("invalid qou.toml: {0}")]
    ParseError(String),

    /// A value that has no default is absent or empty.
    #[error("qou.toml is missing {0}")]
    MissingField(String),

    /// A value is present but out of range.
    #[error("invalid setting: {0}")]
    ValidationError(String),

    /// A `QOU_INDEX_*` variable holds an unusable value.
    #[error("environment override {var}={value:?} is invalid")]
    InvalidEnvOverride {
        /// Variable name.
        var: String,
        /// Rejected value.
        value: String,
    },
}
