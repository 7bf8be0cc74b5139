//! Internal metrics: the agent's view of its own health.
//!
//! - [`runtime_metrics`]: task and allocator statistics of this process
//! - [`build_snapshot`]: runtime statistics plus every handler's self-report

mod aggregator;
mod runtime;

pub use aggregator::{MetricsSnapshot, build_snapshot};
pub use runtime::{mark_started, runtime_metrics};
