//! Configuration module for the agent.
//!
//! Provides JSON/YAML configuration loading plus the loosely-typed value
//! model used by collector and handler sections:
//! - [`Config`]: the top-level document
//! - [`ConfigValue`] / [`ConfigMap`]: dynamically-typed section values
//! - `coerce_to_*`: total conversions from a [`ConfigValue`]

mod app;
mod error;
mod value;

pub use app::Config;
pub use error::ConfigError;
pub use value::{
    ConfigMap, ConfigValue, coerce_to_float, coerce_to_int, coerce_to_mapping, coerce_to_sequence,
};
