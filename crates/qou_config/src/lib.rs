//! Parsing and validation of `qou.toml` project configuration files.
//!
//! This crate reads the project configuration file and produces a strongly-typed
//! [`ProjectConfig`] covering the index connection, connection pool, retry
//! policy, artifact generation, packaging, and catalog seeding.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{apply_env_overrides, load_config, load_config_from_str, CONFIG_FILE};
pub use types::*;
