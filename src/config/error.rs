//! Configuration error types.

use thiserror::Error;

/// Errors that abort loading a configuration document.
///
/// A failed load never produces a partial configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse JSON configuration.
    #[error("failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to parse YAML configuration.
    #[error("failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
