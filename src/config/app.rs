//! Agent configuration document.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use super::value::{ConfigMap, ConfigValue, coerce_to_int};
use crate::collector::DEFAULT_COLLECTION_INTERVAL;
use crate::server::DEFAULT_PORT;

/// Top-level agent configuration.
///
/// Loaded once at startup and treated as read-only afterwards. Unknown
/// top-level keys are ignored; absent keys leave their field empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Prefix prepended to every metric name by handlers.
    #[serde(default)]
    pub prefix: String,

    /// Default collection interval in seconds (number or numeric string).
    #[serde(default)]
    pub interval: ConfigValue,

    /// Directory holding external diamond-style collectors.
    #[serde(default)]
    pub diamond_collectors_path: String,

    /// External diamond-style collector sections, keyed by instance name.
    #[serde(default)]
    pub diamond_collectors: BTreeMap<String, ConfigMap>,

    /// Handler (forwarder) sections, keyed by instance name.
    #[serde(default)]
    pub handlers: BTreeMap<String, ConfigMap>,

    /// Collector sections, keyed by instance name.
    ///
    /// An instance name is the registered collector type, optionally followed
    /// by whitespace and a disambiguating suffix (`"ProcStatus nginx"`).
    #[serde(default)]
    pub collectors: BTreeMap<String, ConfigMap>,

    /// Dimensions attached to every metric by handlers.
    #[serde(default, rename = "defaultDimensions")]
    pub default_dimensions: BTreeMap<String, String>,

    /// Port of the internal metrics endpoint, as a string.
    #[serde(default, rename = "internalMetricsPort")]
    pub internal_metrics_port: String,
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Files ending in `.json` are parsed as JSON; anything else goes through
    /// the YAML parser, which also accepts JSON documents.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        tracing::info!(path = %path.display(), "Reading configuration file");

        let content = std::fs::read_to_string(path)
            .inspect_err(|e| tracing::error!(error = %e, "Config file error"))?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    /// Parse a JSON configuration document.
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content)
            .inspect_err(|e| tracing::error!(error = %e, "Invalid JSON in config"))
            .map_err(ConfigError::from)
    }

    /// Parse a YAML configuration document.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content)
            .inspect_err(|e| tracing::error!(error = %e, "Invalid YAML in config"))
            .map_err(ConfigError::from)
    }

    /// Default collection interval in seconds.
    ///
    /// Falls back to the collector default when the value is missing, not
    /// numeric, or not positive.
    pub fn interval(&self) -> u64 {
        let fallback = DEFAULT_COLLECTION_INTERVAL;
        match coerce_to_int(&self.interval, fallback as i64) {
            secs if secs > 0 => secs as u64,
            _ => fallback,
        }
    }

    /// Port of the internal metrics endpoint.
    pub fn internal_metrics_port(&self) -> u16 {
        if self.internal_metrics_port.is_empty() {
            return DEFAULT_PORT;
        }
        let port = coerce_to_int(
            &ConfigValue::String(self.internal_metrics_port.clone()),
            i64::from(DEFAULT_PORT),
        );
        u16::try_from(port)
            .ok()
            .filter(|p| *p != 0)
            .unwrap_or(DEFAULT_PORT)
    }

    /// Configuration section for a collector instance.
    pub fn collector_config(&self, name: &str) -> Option<&ConfigMap> {
        self.collectors.get(name)
    }

    /// Configuration section for a handler instance.
    pub fn handler_config(&self, name: &str) -> Option<&ConfigMap> {
        self.handlers.get(name)
    }
}
