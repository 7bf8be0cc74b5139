//! Core collector trait and types.

use thiserror::Error;

use crate::collector::CollectorState;
use crate::config::ConfigMap;

/// Interval to collect on unless overridden by a collector's configuration
/// (10 seconds).
pub const DEFAULT_COLLECTION_INTERVAL: u64 = 10;

/// Errors that can occur during collection.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// Every receiver of the collector's conduit has been dropped.
    #[error("metric channel closed")]
    ChannelClosed,

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),
}

/// Behavior every concrete collector supplies.
///
/// Shared bookkeeping (interval, prefix, blacklists, conduit, identity) lives
/// in a [`CollectorState`] the collector owns and exposes through
/// [`state`](Collector::state) / [`state_mut`](Collector::state_mut). The two
/// behavior methods are the only ones a collector really implements.
///
/// # Scheduling contract
///
/// `collect` is called repeatedly by an external scheduler on the collector's
/// own interval. Different collectors run concurrently; a single collector is
/// never run concurrently with itself, which is why `collect` takes
/// `&mut self`.
///
/// # Error Handling
///
/// A target that cannot be observed is not an error: the collector should
/// simply emit nothing (or a failure metric) and return `Ok(())`. `Err` is
/// reserved for conditions that stop the collector from working at all, such
/// as its conduit being closed.
#[async_trait::async_trait]
pub trait Collector: Send + Sync + 'static {
    /// Apply a configuration section.
    ///
    /// Implementations normally start with
    /// `self.state_mut().configure_common_params(config)` and then read their
    /// own keys.
    fn configure(&mut self, config: &ConfigMap);

    /// Perform one collection cycle, emitting metrics through the state.
    async fn collect(&mut self) -> Result<(), CollectorError>;

    /// Shared state of this instance.
    fn state(&self) -> &CollectorState;

    /// Mutable shared state of this instance.
    fn state_mut(&mut self) -> &mut CollectorState;
}
