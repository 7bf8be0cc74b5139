//! Snapshot assembly for the internal metrics endpoint.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::runtime::runtime_metrics;
use crate::handler::{Handler, InternalMetrics};

/// One internal metrics snapshot.
///
/// Serialized as:
///
/// ```json
/// {
///   "Memory": {"Counters": {"active_tasks": 12.0}, "Gauges": {"allocated": 23.4}},
///   "Handlers": {
///     "somehandler": {"Counters": {"totalEmissions": 12332.0}, "Gauges": {}}
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetricsSnapshot {
    /// Process runtime statistics.
    pub memory: InternalMetrics,
    /// Self-reported metrics of each handler, keyed by handler name.
    pub handlers: BTreeMap<String, InternalMetrics>,
}

/// Build a fresh snapshot.
///
/// Handlers are queried one after another in slice order; a slow handler
/// delays the whole snapshot.
pub fn build_snapshot(handlers: &[Arc<dyn Handler>]) -> MetricsSnapshot {
    let memory = runtime_metrics();

    let mut handler_stats = BTreeMap::new();
    for handler in handlers {
        handler_stats.insert(handler.name().to_string(), handler.internal_metrics());
    }

    MetricsSnapshot {
        memory,
        handlers: handler_stats,
    }
}
