//! Heartbeat collector.
//!
//! Emits a constant gauge every cycle so downstream systems can tell the agent
//! is alive.

use crate::collector::{Collector, CollectorError, CollectorState};
use crate::config::ConfigMap;
use crate::metric::Metric;

/// Registered type name.
pub const HEARTBEAT_COLLECTOR: &str = "heartbeat";

/// Name of the emitted metric.
const HEARTBEAT_METRIC: &str = "heartbeat";

/// Collector emitting `heartbeat = 1.0` tagged with its canonical name.
#[derive(Debug)]
pub struct HeartbeatCollector {
    state: CollectorState,
}

impl HeartbeatCollector {
    pub fn new(state: CollectorState) -> Self {
        Self { state }
    }

    /// Factory suitable for [`CollectorRegistry::register`](crate::collector::CollectorRegistry::register).
    pub fn factory(state: CollectorState) -> Box<dyn Collector> {
        Box::new(Self::new(state))
    }
}

#[async_trait::async_trait]
impl Collector for HeartbeatCollector {
    fn configure(&mut self, config: &ConfigMap) {
        self.state.configure_common_params(config);
    }

    async fn collect(&mut self) -> Result<(), CollectorError> {
        let metric = Metric::new(HEARTBEAT_METRIC, 1.0)
            .with_dimension("collector", self.state.canonical_name());
        self.state.emit(metric).await?;
        Ok(())
    }

    fn state(&self) -> &CollectorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CollectorState {
        &mut self.state
    }
}
