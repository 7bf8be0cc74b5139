//! Loosely-typed configuration values and the coercion rules that read them.
//!
//! Collector and handler sections of the configuration document are free-form
//! mappings. Every value in them is a [`ConfigValue`], and the functions in
//! this module are the only way the rest of the crate turns one into a
//! concrete number, string, sequence or mapping. None of them can fail: a
//! value of the wrong shape produces the caller's default (or an empty
//! result) and, where the value was clearly meant to be used, a warning.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// String-keyed configuration mapping (one collector or handler section).
pub type ConfigMap = BTreeMap<String, ConfigValue>;

/// A dynamically-typed configuration value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// Explicit `null` or an absent value.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<ConfigValue>),
    Map(ConfigMap),
}

impl ConfigValue {
    /// Short name of the value's shape, used in warnings.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Borrow the value as a string, without coercion.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Render a scalar as a plain string. Lists, maps and null have no
    /// scalar rendering.
    fn scalar_string(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Null | Self::List(_) | Self::Map(_) => None,
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::List(items) => write!(f, "<list of {}>", items.len()),
            Self::Map(map) => write!(f, "<map of {}>", map.len()),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<ConfigValue>> From<Vec<T>> for ConfigValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl From<ConfigMap> for ConfigValue {
    fn from(map: ConfigMap) -> Self {
        Self::Map(map)
    }
}

/// Coerce a value to an integer.
///
/// Strings must parse completely as a base-10 integer, integers pass through
/// unchanged and floats truncate toward zero. Anything else yields `default`.
pub fn coerce_to_int(value: &ConfigValue, default: i64) -> i64 {
    match value {
        ConfigValue::String(s) => match s.parse::<i64>() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(value = %s, default, error = %e, "Failed to convert value to an integer");
                default
            }
        },
        ConfigValue::Int(i) => *i,
        // `as` saturates at the integer bounds and maps NaN to zero.
        ConfigValue::Float(f) => f.trunc() as i64,
        _ => default,
    }
}

/// Coerce a value to a float.
///
/// Strings must parse completely as a decimal float. Floats pass through;
/// integers widen, since numeric literals without a fractional part are
/// still numbers in the document. Anything else yields `default`.
pub fn coerce_to_float(value: &ConfigValue, default: f64) -> f64 {
    match value {
        ConfigValue::String(s) => match s.parse::<f64>() {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!(value = %s, default, "Failed to convert value to a float, falling back to default");
                default
            }
        },
        ConfigValue::Float(f) => *f,
        ConfigValue::Int(i) => *i as f64,
        _ => default,
    }
}

/// Coerce a value to an ordered sequence of strings.
///
/// Only lists qualify. Scalar elements are rendered as strings; nested lists,
/// maps and nulls are skipped.
pub fn coerce_to_sequence(value: &ConfigValue) -> Vec<String> {
    match value {
        ConfigValue::List(items) => items
            .iter()
            .filter_map(|item| {
                let rendered = item.scalar_string();
                if rendered.is_none() {
                    tracing::warn!(element = %item, "Skipping non-scalar list element");
                }
                rendered
            })
            .collect(),
        ConfigValue::Null => Vec::new(),
        other => {
            tracing::warn!(kind = other.kind(), "Expected a list, using an empty one");
            Vec::new()
        }
    }
}

/// Coerce a value to a string-to-string mapping.
///
/// Only maps qualify. Scalar values are rendered as strings; entries whose
/// value is a list, map or null are skipped.
pub fn coerce_to_mapping(value: &ConfigValue) -> BTreeMap<String, String> {
    match value {
        ConfigValue::Map(map) => map
            .iter()
            .filter_map(|(key, item)| match item.scalar_string() {
                Some(rendered) => Some((key.clone(), rendered)),
                None => {
                    tracing::warn!(key = %key, "Skipping non-scalar map value");
                    None
                }
            })
            .collect(),
        ConfigValue::Null => BTreeMap::new(),
        other => {
            tracing::warn!(kind = other.kind(), "Expected a map, using an empty one");
            BTreeMap::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_to_int() {
        assert_eq!(coerce_to_int(&"42".into(), 7), 42);
        assert_eq!(coerce_to_int(&"-5".into(), 7), -5);
        assert_eq!(coerce_to_int(&"abc".into(), 7), 7);
        assert_eq!(coerce_to_int(&"4.2".into(), 7), 7);
        assert_eq!(coerce_to_int(&" 42".into(), 7), 7);
        assert_eq!(coerce_to_int(&ConfigValue::Int(13), 7), 13);
        assert_eq!(coerce_to_int(&ConfigValue::Float(3.9), 7), 3);
        assert_eq!(coerce_to_int(&ConfigValue::Float(-3.9), 7), -3);
    }

    #[test]
    fn test_coerce_to_int_unsupported_shapes() {
        assert_eq!(coerce_to_int(&ConfigValue::Null, 7), 7);
        assert_eq!(coerce_to_int(&ConfigValue::Bool(true), 7), 7);
        assert_eq!(coerce_to_int(&vec!["1"].into(), 7), 7);
        assert_eq!(coerce_to_int(&ConfigValue::Map(ConfigMap::new()), 7), 7);
    }

    #[test]
    fn test_coerce_to_float() {
        assert_eq!(coerce_to_float(&"3.14".into(), 1.0), 3.14);
        assert_eq!(coerce_to_float(&"bad".into(), 1.0), 1.0);
        assert_eq!(coerce_to_float(&ConfigValue::Float(2.5), 1.0), 2.5);
        assert_eq!(coerce_to_float(&ConfigValue::Int(2), 1.0), 2.0);
        assert_eq!(coerce_to_float(&ConfigValue::Bool(false), 1.0), 1.0);
        assert_eq!(coerce_to_float(&ConfigValue::Null, 1.0), 1.0);
    }

    #[test]
    fn test_coerce_to_sequence() {
        let value: ConfigValue = vec!["foo", "bar"].into();
        assert_eq!(coerce_to_sequence(&value), vec!["foo", "bar"]);

        let mixed = ConfigValue::List(vec![
            "a".into(),
            ConfigValue::Int(1),
            ConfigValue::List(vec![]),
        ]);
        assert_eq!(coerce_to_sequence(&mixed), vec!["a", "1"]);

        assert!(coerce_to_sequence(&"foo".into()).is_empty());
        assert!(coerce_to_sequence(&ConfigValue::Null).is_empty());
    }

    #[test]
    fn test_coerce_to_mapping() {
        let mut map = ConfigMap::new();
        map.insert("host".to_string(), "^db".into());
        map.insert("port".to_string(), ConfigValue::Int(5432));
        map.insert("nested".to_string(), ConfigValue::Map(ConfigMap::new()));

        let coerced = coerce_to_mapping(&ConfigValue::Map(map));
        assert_eq!(coerced.len(), 2);
        assert_eq!(coerced["host"], "^db");
        assert_eq!(coerced["port"], "5432");

        assert!(coerce_to_mapping(&vec!["a"].into()).is_empty());
    }

    #[test]
    fn test_untagged_deserialization() {
        let value: ConfigValue =
            serde_json::from_str(r#"{"a": 1, "b": 1.5, "c": "x", "d": [true], "e": null}"#)
                .unwrap();
        let ConfigValue::Map(map) = value else {
            panic!("expected map");
        };
        assert_eq!(map["a"], ConfigValue::Int(1));
        assert_eq!(map["b"], ConfigValue::Float(1.5));
        assert_eq!(map["c"], ConfigValue::String("x".to_string()));
        assert_eq!(map["d"], ConfigValue::List(vec![ConfigValue::Bool(true)]));
        assert!(map["e"].is_null());
    }
}
