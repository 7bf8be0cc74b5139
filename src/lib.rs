//! gatherd - metrics collection agent core
//!
//! This crate provides the plugin framework of the gatherd agent. It can be
//! used as a library by programs that bring their own collectors and
//! handlers, or run as the standalone `gatherd` binary.
//!
//! # Architecture
//!
//! - **Config**: JSON/YAML document plus loosely-typed collector sections
//! - **Collectors**: registry of factories, shared collector state, blacklist
//!   filtering and an unbuffered per-collector conduit
//! - **Handlers**: the forwarder contract used for self-observability
//! - **Internal metrics**: runtime and handler statistics served over HTTP
//!
//! # Example
//!
//! ```rust,no_run
//! use gatherd::{CollectorRegistry, Config, HeartbeatCollector};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load("configs/gatherd.json")?;
//!
//! let mut registry = CollectorRegistry::new();
//! registry.register("heartbeat", HeartbeatCollector::factory);
//!
//! for mut collector in registry.build_all(&config.collectors) {
//!     let Some(metrics) = collector.state_mut().take_channel() else { continue };
//!     tokio::spawn(async move { while metrics.recv_async().await.is_ok() {} });
//!     collector.collect().await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod collector;
pub mod config;
pub mod handler;
pub mod internal;
pub mod metric;
pub mod server;

pub use collector::{
    Collector, CollectorError, CollectorRegistry, CollectorState, HeartbeatCollector,
    MetricReceiver, MetricSender, RegistryError,
};
pub use config::{Config, ConfigError, ConfigMap, ConfigValue};
pub use handler::{Handler, InternalMetrics};
pub use internal::{MetricsSnapshot, build_snapshot};
pub use metric::{Dimensions, Metric, MetricType};
pub use server::{InternalServer, ServerError, create_router};
