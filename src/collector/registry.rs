//! Collector registry mapping type names to factories.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use thiserror::Error;

use crate::collector::{
    Collector, CollectorState, DEFAULT_COLLECTION_INTERVAL, DEFAULT_COLLECTOR_TYPE,
};
use crate::config::ConfigMap;

/// Constructor for one collector type.
///
/// The factory receives a ready [`CollectorState`] carrying the output
/// conduit, the default interval and the logging span, and wraps it in the
/// concrete collector.
pub type CollectorFactory = Arc<dyn Fn(CollectorState) -> Box<dyn Collector> + Send + Sync>;

/// Errors from registry lookups.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No factory registered under the requested type name.
    #[error("cannot create collector: {0}")]
    UnknownCollector(String),
}

/// Registry of collector factories.
///
/// Built once at startup and passed to whatever needs to instantiate
/// collectors. Instance names may carry a suffix after the type name
/// (`"ProcStatus nginx"`), which lets several differently configured
/// instances of one type run side by side.
pub struct CollectorRegistry {
    factories: HashMap<String, CollectorFactory>,
    default_interval: u64,
}

impl Default for CollectorRegistry {
    fn default() -> Self {
        Self {
            factories: HashMap::new(),
            default_interval: DEFAULT_COLLECTION_INTERVAL,
        }
    }
}

impl std::fmt::Debug for CollectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorRegistry")
            .field("collectors", &self.names())
            .field("default_interval", &self.default_interval)
            .finish()
    }
}

impl CollectorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the interval (seconds) new collectors start with before their
    /// own configuration is applied. Zero keeps the current default.
    #[must_use]
    pub fn with_default_interval(mut self, interval: u64) -> Self {
        if interval > 0 {
            self.default_interval = interval;
        }
        self
    }

    pub fn default_interval(&self) -> u64 {
        self.default_interval
    }

    /// Register a factory under a type name. A later registration of the
    /// same name replaces the earlier one.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(CollectorState) -> Box<dyn Collector> + Send + Sync + 'static,
    {
        let name = name.into();
        if self
            .factories
            .insert(name.clone(), Arc::new(factory))
            .is_some()
        {
            tracing::debug!(collector = %name, "Replaced collector factory");
        }
    }

    /// Instantiate the collector for `name`, logging and returning `None`
    /// when its type is not registered.
    pub fn create(&self, name: &str) -> Option<Box<dyn Collector>> {
        self.try_create(name)
            .inspect_err(|e| tracing::error!(error = %e, "Collector lookup failed"))
            .ok()
    }

    /// Instantiate the collector for `name`.
    ///
    /// The text up to the first whitespace selects the factory; the whole
    /// string becomes the instance's canonical name. Both hold regardless of
    /// what the factory did: an empty collector type is reset to
    /// `"collector"` and the canonical name is restored.
    ///
    /// # Errors
    /// `RegistryError::UnknownCollector` when the type is not registered.
    pub fn try_create(&self, name: &str) -> Result<Box<dyn Collector>, RegistryError> {
        let type_name = type_name(name);
        let factory = self
            .factories
            .get(type_name)
            .ok_or_else(|| RegistryError::UnknownCollector(type_name.to_string()))?;

        let state = CollectorState::new(type_name, name, self.default_interval);
        let mut collector = factory(state);

        let state = collector.state_mut();
        if state.collector_type().is_empty() {
            state.set_collector_type(DEFAULT_COLLECTOR_TYPE);
        }
        if state.canonical_name() != name {
            tracing::debug!(
                collector = %name,
                found = %state.canonical_name(),
                "Factory changed canonical name, restoring"
            );
            state.set_canonical_name(name);
        }
        Ok(collector)
    }

    /// Create and configure a collector for every section, in key order.
    ///
    /// Sections whose type is unknown are logged and skipped.
    pub fn build_all(&self, sections: &BTreeMap<String, ConfigMap>) -> Vec<Box<dyn Collector>> {
        sections
            .iter()
            .filter_map(|(name, config)| {
                let mut collector = self.create(name)?;
                collector.configure(config);
                tracing::info!(
                    collector = %collector.state().canonical_name(),
                    interval = collector.state().interval(),
                    "Collector created"
                );
                Some(collector)
            })
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered type names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

/// Registered type portion of an instance name.
fn type_name(name: &str) -> &str {
    name.split(char::is_whitespace).next().unwrap_or(name)
}
