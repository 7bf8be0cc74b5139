//! Shared state composed by every collector.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;

use crate::collector::{CollectorError, DEFAULT_COLLECTION_INTERVAL};
use crate::config::{ConfigMap, coerce_to_int, coerce_to_mapping, coerce_to_sequence};
use crate::metric::{Dimensions, Metric};

/// Classification given to collectors that do not set their own.
pub const DEFAULT_COLLECTOR_TYPE: &str = "collector";

/// Sending half of a collector's metric conduit.
pub type MetricSender = flume::Sender<Metric>;

/// Receiving half of a collector's metric conduit.
pub type MetricReceiver = flume::Receiver<Metric>;

/// Create an unbuffered metric conduit.
///
/// A send completes only once a receiver has taken the value, so a stalled
/// consumer stalls the producing collector instead of losing metrics.
pub fn metric_channel() -> (MetricSender, MetricReceiver) {
    flume::bounded(0)
}

/// Dimension blacklist entry with its pattern compiled up front.
#[derive(Debug, Clone)]
struct DimensionRule {
    key: String,
    pattern: Result<Regex, regex::Error>,
}

/// Fields and accessors shared by all collectors.
///
/// Concrete collectors hold one of these and hand it out through
/// [`Collector::state`](crate::collector::Collector::state). The canonical
/// name is fixed at construction; only the registry may overwrite it.
///
/// The receiving half of the conduit is handed out once, through
/// [`take_channel`](Self::take_channel). Once every receiver is dropped,
/// [`emit`](Self::emit) fails with `ChannelClosed`.
#[derive(Debug)]
pub struct CollectorState {
    name: String,
    canonical_name: String,
    collector_type: String,
    interval: u64,
    prefix: String,
    blacklist: Vec<String>,
    dimensions_blacklist: BTreeMap<String, String>,
    dimension_rules: Vec<DimensionRule>,
    sender: MetricSender,
    receiver: Option<MetricReceiver>,
    span: tracing::Span,
}

impl CollectorState {
    /// Create state for a collector of registered type `name`, identified by
    /// `canonical_name`, with a fresh conduit and logging span.
    pub fn new(name: impl Into<String>, canonical_name: impl Into<String>, interval: u64) -> Self {
        let name = name.into();
        let canonical_name = canonical_name.into();
        let (sender, receiver) = metric_channel();
        let span = tracing::info_span!("collector", app = "gatherd", collector = %canonical_name);

        let interval = if interval == 0 {
            DEFAULT_COLLECTION_INTERVAL
        } else {
            interval
        };

        Self {
            name,
            canonical_name,
            collector_type: DEFAULT_COLLECTOR_TYPE.to_string(),
            interval,
            prefix: String::new(),
            blacklist: Vec::new(),
            dimensions_blacklist: BTreeMap::new(),
            dimension_rules: Vec::new(),
            sender,
            receiver: Some(receiver),
            span,
        }
    }

    /// Merge the configuration keys every collector understands.
    ///
    /// Only `interval`, `prefix`, `metrics_blacklist` and
    /// `dimensions_blacklist` are read. Keys absent from `config` keep their
    /// current value.
    pub fn configure_common_params(&mut self, config: &ConfigMap) {
        if let Some(value) = config.get("interval") {
            let interval = coerce_to_int(value, self.interval as i64);
            if interval > 0 {
                self.interval = interval as u64;
            } else {
                tracing::warn!(parent: &self.span, interval, "Ignoring non-positive interval");
            }
        }

        if let Some(prefix) = config.get("prefix").and_then(|v| v.as_str()) {
            self.prefix = prefix.to_string();
        }

        if let Some(value) = config.get("metrics_blacklist") {
            self.set_blacklist(coerce_to_sequence(value));
        }

        if let Some(value) = config.get("dimensions_blacklist") {
            self.set_dimensions_blacklist(coerce_to_mapping(value));
        }
    }

    /// Whether any dimension matches its blacklist pattern.
    ///
    /// A key missing from `dimensions` is matched as the empty string. If a
    /// pattern fails to compile, evaluation stops there and the metric is
    /// reported as not blacklisted, so one bad pattern cannot suppress
    /// everything.
    pub fn contains_blacklisted_dimension(&self, dimensions: &Dimensions) -> bool {
        for rule in &self.dimension_rules {
            let value = dimensions.get(&rule.key).map_or("", String::as_str);
            match &rule.pattern {
                Ok(re) if re.is_match(value) => return true,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(parent: &self.span, key = %rule.key, error = %e, "Invalid dimension blacklist pattern");
                    break;
                }
            }
        }
        false
    }

    /// Whether a metric name is in the blacklist.
    pub fn is_blacklisted(&self, metric_name: &str) -> bool {
        self.blacklist.iter().any(|name| name == metric_name)
    }

    /// Prefix, filter and send one metric.
    ///
    /// Returns `Ok(false)` when the metric was filtered out and `Ok(true)`
    /// once a consumer has received it. The send waits for a consumer.
    ///
    /// # Errors
    /// `CollectorError::ChannelClosed` if every receiver is gone.
    pub async fn emit(&self, mut metric: Metric) -> Result<bool, CollectorError> {
        if !self.prefix.is_empty() {
            metric.name = format!("{}{}", self.prefix, metric.name);
        }

        if self.is_blacklisted(&metric.name)
            || self.contains_blacklisted_dimension(&metric.dimensions)
        {
            tracing::trace!(parent: &self.span, metric = %metric.name, "Metric blacklisted");
            return Ok(false);
        }

        self.sender
            .send_async(metric)
            .await
            .map_err(|_| CollectorError::ChannelClosed)?;
        Ok(true)
    }

    // --- Accessors ---

    /// Registered type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full configured identity of this instance.
    pub fn canonical_name(&self) -> &str {
        &self.canonical_name
    }

    /// Take the receiving half of this collector's conduit.
    ///
    /// Returns `None` after the first call. The consumer owns the receiver
    /// from then on; dropping it closes the conduit.
    pub fn take_channel(&mut self) -> Option<MetricReceiver> {
        self.receiver.take()
    }

    /// Sending half of the conduit, for collectors that push from their own
    /// threads instead of calling [`emit`](Self::emit).
    pub fn sender(&self) -> &MetricSender {
        &self.sender
    }

    pub(crate) fn set_canonical_name(&mut self, canonical_name: impl Into<String>) {
        self.canonical_name = canonical_name.into();
        self.span = tracing::info_span!("collector", app = "gatherd", collector = %self.canonical_name);
    }

    /// Collection interval in seconds.
    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Set the collection interval; zero is rejected.
    pub fn set_interval(&mut self, interval: u64) {
        if interval == 0 {
            tracing::warn!(parent: &self.span, "Ignoring zero interval");
            return;
        }
        self.interval = interval;
    }

    /// Classification of this collector, `"collector"` unless the factory
    /// set another.
    pub fn collector_type(&self) -> &str {
        &self.collector_type
    }

    /// Override the classification. An empty value is replaced by the
    /// default when the registry builds the collector.
    pub fn set_collector_type(&mut self, collector_type: impl Into<String>) {
        self.collector_type = collector_type.into();
    }

    /// Text prepended to every emitted metric name.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Replace the metric name prefix.
    pub fn set_prefix(&mut self, prefix: impl Into<String>) {
        self.prefix = prefix.into();
    }

    /// Metric names (after prefixing) that are never emitted.
    pub fn blacklist(&self) -> &[String] {
        &self.blacklist
    }

    /// Replace the metric name blacklist.
    pub fn set_blacklist(&mut self, blacklist: Vec<String>) {
        self.blacklist = blacklist;
    }

    /// Dimension key to regex pattern, in key order.
    pub fn dimensions_blacklist(&self) -> &BTreeMap<String, String> {
        &self.dimensions_blacklist
    }

    /// Replace the dimension blacklist (dimension key -> regex pattern).
    pub fn set_dimensions_blacklist(&mut self, blacklist: BTreeMap<String, String>) {
        self.dimension_rules = blacklist
            .iter()
            .map(|(key, pattern)| DimensionRule {
                key: key.clone(),
                pattern: Regex::new(pattern),
            })
            .collect();
        self.dimensions_blacklist = blacklist;
    }

    /// Logging span carrying this collector's identity.
    pub fn span(&self) -> &tracing::Span {
        &self.span
    }
}

impl fmt::Display for CollectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Collector", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigValue;
    use std::time::Duration;

    fn dims(pairs: &[(&str, &str)]) -> Dimensions {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn blacklist(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        dims(pairs)
    }

    #[test]
    fn test_new_defaults() {
        let state = CollectorState::new("Test", "Test extra", 0);
        assert_eq!(state.name(), "Test");
        assert_eq!(state.canonical_name(), "Test extra");
        assert_eq!(state.collector_type(), DEFAULT_COLLECTOR_TYPE);
        assert_eq!(state.interval(), DEFAULT_COLLECTION_INTERVAL);
        assert_eq!(state.prefix(), "");
        assert!(state.blacklist().is_empty());
        assert!(state.dimensions_blacklist().is_empty());
        assert_eq!(state.to_string(), "TestCollector");
    }

    #[test]
    fn test_configure_common_params() {
        let mut state = CollectorState::new("Test", "Test", 10);

        let mut config = ConfigMap::new();
        config.insert("interval".to_string(), "30".into());
        config.insert("prefix".to_string(), "custom.".into());
        config.insert("metrics_blacklist".to_string(), vec!["foo", "bar"].into());
        config.insert(
            "dimensions_blacklist".to_string(),
            ConfigValue::Map(
                [("host".to_string(), ConfigValue::from("^db"))]
                    .into_iter()
                    .collect(),
            ),
        );
        config.insert("unrelated".to_string(), ConfigValue::Bool(true));
        state.configure_common_params(&config);

        assert_eq!(state.interval(), 30);
        assert_eq!(state.prefix(), "custom.");
        assert_eq!(state.blacklist(), ["foo", "bar"]);
        assert_eq!(state.dimensions_blacklist()["host"], "^db");
    }

    #[test]
    fn test_configure_leaves_absent_keys() {
        let mut state = CollectorState::new("Test", "Test", 10);
        state.set_blacklist(vec!["keep".to_string()]);
        state.set_prefix("p.");
        state.set_interval(20);

        let mut config = ConfigMap::new();
        config.insert("interval".to_string(), "soon".into());
        config.insert("prefix".to_string(), ConfigValue::Int(5));
        state.configure_common_params(&config);

        assert_eq!(state.interval(), 20);
        assert_eq!(state.prefix(), "p.");
        assert_eq!(state.blacklist(), ["keep"]);
    }

    #[test]
    fn test_configure_interval_float_and_non_positive() {
        let mut state = CollectorState::new("Test", "Test", 10);

        let mut config = ConfigMap::new();
        config.insert("interval".to_string(), ConfigValue::Float(12.7));
        state.configure_common_params(&config);
        assert_eq!(state.interval(), 12);

        config.insert("interval".to_string(), ConfigValue::Int(-1));
        state.configure_common_params(&config);
        assert_eq!(state.interval(), 12);

        state.set_interval(0);
        assert_eq!(state.interval(), 12);
    }

    #[test]
    fn test_contains_blacklisted_dimension() {
        let mut state = CollectorState::new("Test", "Test", 10);
        let metric_dims = dims(&[("host", "db1")]);

        state.set_dimensions_blacklist(blacklist(&[("host", "^db")]));
        assert!(state.contains_blacklisted_dimension(&metric_dims));

        state.set_dimensions_blacklist(blacklist(&[("host", "^web")]));
        assert!(!state.contains_blacklisted_dimension(&metric_dims));
    }

    #[test]
    fn test_blacklisted_dimension_missing_key_matches_empty() {
        let mut state = CollectorState::new("Test", "Test", 10);
        state.set_dimensions_blacklist(blacklist(&[("region", "^$")]));
        assert!(state.contains_blacklisted_dimension(&dims(&[("host", "db1")])));

        state.set_dimensions_blacklist(blacklist(&[("region", "us")]));
        assert!(!state.contains_blacklisted_dimension(&dims(&[("host", "db1")])));
    }

    #[test]
    fn test_invalid_pattern_fails_open() {
        let mut state = CollectorState::new("Test", "Test", 10);
        // "a" sorts before "host", so the broken pattern is evaluated first
        // and stops evaluation before the matching rule is reached.
        state.set_dimensions_blacklist(blacklist(&[("a", "("), ("host", "^db")]));
        assert!(!state.contains_blacklisted_dimension(&dims(&[("host", "db1")])));

        // A match found before the broken pattern still counts.
        state.set_dimensions_blacklist(blacklist(&[("host", "^db"), ("zone", "[")]));
        assert!(state.contains_blacklisted_dimension(&dims(&[("host", "db1")])));
    }

    #[tokio::test]
    async fn test_emit_applies_prefix_and_filters() {
        let mut state = CollectorState::new("Test", "Test", 10);
        state.set_prefix("app.");
        state.set_blacklist(vec!["app.noisy".to_string()]);
        state.set_dimensions_blacklist(blacklist(&[("host", "^db")]));

        let receiver = state.take_channel().unwrap();
        let consumer = tokio::spawn(async move { receiver.recv_async().await.unwrap() });

        assert!(!state.emit(Metric::new("noisy", 1.0)).await.unwrap());
        assert!(
            !state
                .emit(Metric::new("quiet", 1.0).with_dimension("host", "db1"))
                .await
                .unwrap()
        );
        assert!(state.emit(Metric::new("quiet", 2.0)).await.unwrap());

        let received = consumer.await.unwrap();
        assert_eq!(received.name, "app.quiet");
        assert_eq!(received.value, 2.0);
    }

    #[tokio::test]
    async fn test_emit_waits_for_consumer() {
        let mut state = CollectorState::new("Test", "Test", 10);
        let receiver = state.take_channel().unwrap();

        let rejected = state.sender().try_send(Metric::new("blocked", 1.0));
        assert!(matches!(rejected, Err(flume::TrySendError::Full(_))));

        let pending = tokio::time::timeout(
            Duration::from_millis(50),
            state.emit(Metric::new("blocked", 1.0)),
        )
        .await;
        assert!(pending.is_err(), "send must not complete without a consumer");
        assert!(receiver.is_empty());

        let consumer = tokio::spawn(async move { receiver.recv_async().await.unwrap() });
        assert!(state.emit(Metric::new("delivered", 1.0)).await.unwrap());
        assert_eq!(consumer.await.unwrap().name, "delivered");
    }

    #[test]
    fn test_channel_preserves_order() {
        let mut state = CollectorState::new("Test", "Test", 10);
        let receiver = state.take_channel().unwrap();
        let sender = state.sender().clone();

        let producer = std::thread::spawn(move || {
            for i in 0..5 {
                sender.send(Metric::new("seq", f64::from(i))).unwrap();
            }
        });

        let values: Vec<f64> = (0..5).map(|_| receiver.recv().unwrap().value).collect();
        producer.join().unwrap();
        assert_eq!(values, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_take_channel_once() {
        let mut state = CollectorState::new("Test", "Test", 10);
        assert!(state.take_channel().is_some());
        assert!(state.take_channel().is_none());
    }

    #[tokio::test]
    async fn test_emit_fails_once_consumers_are_gone() {
        let mut state = CollectorState::new("Test", "Test", 10);
        drop(state.take_channel());

        let result = tokio::time::timeout(
            Duration::from_millis(200),
            state.emit(Metric::new("orphan", 1.0)),
        )
        .await
        .expect("emit must not wait without receivers");
        assert!(matches!(result, Err(CollectorError::ChannelClosed)));

        // Filtered metrics never touch the conduit.
        state.set_blacklist(vec!["orphan".to_string()]);
        assert!(!state.emit(Metric::new("orphan", 1.0)).await.unwrap());
    }

    #[tokio::test]
    async fn test_pending_emit_fails_when_consumer_drops() {
        let mut state = CollectorState::new("Test", "Test", 10);
        let receiver = state.take_channel().unwrap();

        let dropper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            drop(receiver);
        });

        let result = tokio::time::timeout(
            Duration::from_secs(1),
            state.emit(Metric::new("stranded", 1.0)),
        )
        .await
        .expect("a pending send must be released when the receiver drops");
        assert!(matches!(result, Err(CollectorError::ChannelClosed)));
        dropper.await.unwrap();
    }

    #[test]
    fn test_set_canonical_name_updates_identity() {
        let mut state = CollectorState::new("Test", "Test", 10);
        state.set_canonical_name("Test renamed");
        assert_eq!(state.canonical_name(), "Test renamed");
        assert_eq!(state.name(), "Test");
    }
}
