//! Forwarder contract as seen by the internal metrics layer.
//!
//! Handlers ship metrics to external backends and live outside this crate.
//! The only thing asked of them here is a stable name and a snapshot of their
//! own counters and gauges.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Self-observability counters and gauges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InternalMetrics {
    /// Monotonically reported accumulations.
    pub counters: BTreeMap<String, f64>,
    /// Point-in-time values.
    pub gauges: BTreeMap<String, f64>,
}

impl InternalMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_counter(mut self, name: impl Into<String>, value: f64) -> Self {
        self.counters.insert(name.into(), value);
        self
    }

    pub fn with_gauge(mut self, name: impl Into<String>, value: f64) -> Self {
        self.gauges.insert(name.into(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty() && self.gauges.is_empty()
    }
}

/// A metric forwarder that reports its own health.
///
/// `internal_metrics` is called synchronously from the internal server and
/// must return promptly; a slow handler delays every snapshot.
pub trait Handler: Send + Sync {
    /// Stable handler name, used as the key in snapshots.
    fn name(&self) -> &str;

    /// Current counters and gauges of this handler.
    fn internal_metrics(&self) -> InternalMetrics;
}
