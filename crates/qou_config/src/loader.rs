//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::{Credentials, ProjectConfig};
use std::path::Path;

/// Name of the configuration file at the project root.
pub const CONFIG_FILE: &str = "qou.toml";

/// Loads and validates a `qou.toml` configuration from a project directory.
///
/// Reads `<project_dir>/qou.toml`, parses it, applies `QOU_INDEX_*`
/// environment overrides, and validates the result.
pub fn load_config(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE);
    let content = std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Io {
        path: config_path.clone(),
        source,
    })?;
    let mut config = parse(&content)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config)?;
    Ok(config)
}

/// Parses and validates a `qou.toml` configuration from a string.
///
/// Environment overrides are not applied. Useful for testing without
/// filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<ProjectConfig, ConfigError> {
    let config = parse(content)?;
    validate_config(&config)?;
    Ok(config)
}

fn parse(content: &str) -> Result<ProjectConfig, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Overrides index connection settings from the environment.
///
/// Recognizes `QOU_INDEX_HOST`, `QOU_INDEX_PORT` and `QOU_INDEX_CREDENTIALS`.
/// `lookup` resolves a variable name to its value.
pub fn apply_env_overrides(
    config: &mut ProjectConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(host) = lookup("QOU_INDEX_HOST") {
        config.index.host = host;
    }
    if let Some(port) = lookup("QOU_INDEX_PORT") {
        config.index.port = port
            .parse()
            .map_err(|_| ConfigError::InvalidEnvOverride {
                var: "QOU_INDEX_PORT".to_string(),
                value: port.clone(),
            })?;
    }
    if let Some(credentials) = lookup("QOU_INDEX_CREDENTIALS") {
        config.index.credentials = Some(Credentials::from(credentials));
    }
    Ok(())
}

/// Validates that required fields are present and values are consistent.
fn validate_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    if config.project.name.is_empty() {
        return Err(ConfigError::MissingField("project.name".to_string()));
    }
    if config.generate.command.is_empty() {
        return Err(ConfigError::MissingField("generate.command".to_string()));
    }
    if config.generate.output.as_os_str().is_empty() {
        return Err(ConfigError::MissingField("generate.output".to_string()));
    }
    if config.package.name.is_empty() {
        return Err(ConfigError::MissingField("package.name".to_string()));
    }
    if config.index.host.is_empty() {
        return Err(ConfigError::MissingField("index.host".to_string()));
    }
    if !matches!(config.index.scheme.as_str(), "http" | "https") {
        return Err(ConfigError::ValidationError(format!(
            "index.scheme must be 'http' or 'https', got '{}'",
            config.index.scheme
        )));
    }
    if config.pool.max_connections == 0 {
        return Err(ConfigError::ValidationError(
            "pool.max_connections must be at least 1".to_string(),
        ));
    }
    if config.retry.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "retry.max_attempts must be at least 1".to_string(),
        ));
    }
    if config.seed.batch_size == 0 {
        return Err(ConfigError::ValidationError(
            "seed.batch_size must be at least 1".to_string(),
        ));
    }
    Ok(())
}
