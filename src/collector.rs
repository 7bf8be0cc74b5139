//! Collector Layer
//!
//! Plugin framework for metric collectors. Each collector instance owns an
//! unbuffered conduit that a dispatcher drains; a send blocks the collector
//! until the dispatcher takes the value.
//!
//! # Architecture
//!
//! - [`Collector`]: the two behaviors a concrete collector implements
//! - [`CollectorState`]: shared fields, common-parameter merging and
//!   blacklist checks every collector composes
//! - [`CollectorRegistry`]: type name to factory mapping
//!
//! # Example
//!
//! ```rust,no_run
//! use gatherd::collector::{CollectorRegistry, HeartbeatCollector};
//!
//! let mut registry = CollectorRegistry::new();
//! registry.register("heartbeat", HeartbeatCollector::factory);
//!
//! // Two instances of one type, told apart by their canonical names.
//! let a = registry.create("heartbeat a").unwrap();
//! let b = registry.create("heartbeat b").unwrap();
//! assert_ne!(a.state().canonical_name(), b.state().canonical_name());
//! ```

mod heartbeat;
mod registry;
mod state;
mod traits;

pub use heartbeat::{HEARTBEAT_COLLECTOR, HeartbeatCollector};
pub use registry::{CollectorFactory, CollectorRegistry, RegistryError};
pub use state::{
    CollectorState, DEFAULT_COLLECTOR_TYPE, MetricReceiver, MetricSender, metric_channel,
};
pub use traits::{Collector, CollectorError, DEFAULT_COLLECTION_INTERVAL};
