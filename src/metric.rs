//! Metric values carried on collector conduits.
//!
//! The core only transports metrics and reads their name and dimensions for
//! blacklist checks; what a handler does with the rest is its own business.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Dimension key/value pairs attached to a metric.
pub type Dimensions = BTreeMap<String, String>;

/// How a metric's value should be interpreted downstream.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum MetricType {
    /// Point-in-time value.
    #[default]
    Gauge,
    /// Delta since the previous report.
    Counter,
    /// Monotonically increasing total; handlers derive rates from it.
    CumulativeCounter,
}

/// A single metric data point.
///
/// # Example
///
/// ```
/// use gatherd::{Metric, MetricType};
///
/// let metric = Metric::new("disk.used", 42.0)
///     .with_type(MetricType::Gauge)
///     .with_dimension("device", "sda1");
/// assert_eq!(metric.dimensions["device"], "sda1");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Metric name, including any collector prefix once emitted.
    pub name: String,
    /// Numeric value.
    pub value: f64,
    /// Value interpretation.
    #[serde(default)]
    pub metric_type: MetricType,
    /// Dimensions for filtering and routing.
    #[serde(default)]
    pub dimensions: Dimensions,
}

impl Metric {
    /// Create a gauge with no dimensions.
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            metric_type: MetricType::Gauge,
            dimensions: Dimensions::new(),
        }
    }

    pub fn with_type(mut self, metric_type: MetricType) -> Self {
        self.metric_type = metric_type;
        self
    }

    /// Add (or replace) one dimension.
    pub fn with_dimension(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.dimensions.insert(key.into(), value.into());
        self
    }

    /// Add dimensions that are not already set on the metric.
    pub fn add_dimensions(&mut self, dimensions: &Dimensions) {
        for (key, value) in dimensions {
            self.dimensions
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }

    /// Value of a dimension, if present.
    pub fn dimension(&self, key: &str) -> Option<&str> {
        self.dimensions.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_metric_type_from_str() {
        assert_eq!(MetricType::from_str("gauge").unwrap(), MetricType::Gauge);
        assert_eq!(MetricType::from_str("COUNTER").unwrap(), MetricType::Counter);
        assert_eq!(
            MetricType::from_str("cumulative_counter").unwrap(),
            MetricType::CumulativeCounter
        );
        assert!(MetricType::from_str("histogram").is_err());
    }

    #[test]
    fn test_metric_type_display() {
        assert_eq!(MetricType::CumulativeCounter.to_string(), "cumulative_counter");
        assert_eq!(MetricType::Gauge.as_ref(), "gauge");
    }

    #[test]
    fn test_add_dimensions_keeps_existing() {
        let mut metric = Metric::new("load", 1.5).with_dimension("host", "web1");

        let mut defaults = Dimensions::new();
        defaults.insert("host".to_string(), "ignored".to_string());
        defaults.insert("region".to_string(), "us-west".to_string());
        metric.add_dimensions(&defaults);

        assert_eq!(metric.dimension("host"), Some("web1"));
        assert_eq!(metric.dimension("region"), Some("us-west"));
        assert_eq!(metric.dimension("missing"), None);
    }

    #[test]
    fn test_serde_defaults() {
        let metric: Metric = serde_json::from_str(r#"{"name": "x", "value": 2.0}"#).unwrap();
        assert_eq!(metric.metric_type, MetricType::Gauge);
        assert!(metric.dimensions.is_empty());
    }
}
