//! Connector configuration.
//!
//! Connectors are configured through a flat, multi-valued key map such as
//! `directory.hostname = ["dc1:636", "dc2:636"]`. [`ConnectorConfig`] holds
//! that map and offers typed getters; each connector builds its own typed
//! configuration on top of it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ConnectorError, ConnectorResult};

/// A scalar configuration value as it may appear in a TOML/JSON document.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawScalar {
    Text(String),
    Flag(bool),
    Number(i64),
}

impl From<RawScalar> for String {
    fn from(value: RawScalar) -> Self {
        match value {
            RawScalar::Text(s) => s,
            RawScalar::Flag(b) => b.to_string(),
            RawScalar::Number(n) => n.to_string(),
        }
    }
}

/// A configuration value: either a scalar or a list of scalars.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawValue {
    One(RawScalar),
    Many(Vec<RawScalar>),
}

type RawConfig = BTreeMap<String, RawValue>;

/// Multi-valued configuration map.
///
/// Keys are case sensitive. Every key maps to an ordered list of values;
/// single-valued getters use the first one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawConfig", into = "BTreeMap<String, Vec<String>>")]
pub struct ConnectorConfig {
    values: BTreeMap<String, Vec<String>>,
}

impl From<RawConfig> for ConnectorConfig {
    fn from(raw: RawConfig) -> Self {
        let values = raw
            .into_iter()
            .map(|(k, v)| {
                let values = match v {
                    RawValue::One(s) => vec![String::from(s)],
                    RawValue::Many(list) => list.into_iter().map(String::from).collect(),
                };
                (k, values)
            })
            .collect();
        Self { values }
    }
}

impl From<ConnectorConfig> for BTreeMap<String, Vec<String>> {
    fn from(config: ConnectorConfig) -> Self {
        config.values
    }
}

impl ConnectorConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a single value, replacing any existing values.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, vec![value.into()]);
        self
    }

    /// Sets several values, replacing any existing values.
    #[must_use]
    pub fn with_all<I, S>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set(key, values.into_iter().map(Into::into).collect());
        self
    }

    /// Replaces the values of a key.
    pub fn set(&mut self, key: impl Into<String>, values: Vec<String>) {
        self.values.insert(key.into(), values);
    }

    /// Appends values to a key.
    pub fn append(&mut self, key: impl Into<String>, values: impl IntoIterator<Item = String>) {
        self.values.entry(key.into()).or_default().extend(values);
    }

    /// Returns true if the key is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Gets the first value of a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// Gets the first value of a key or a default.
    #[must_use]
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Gets the first value of a key, failing if it is absent or blank.
    pub fn require(&self, key: &str) -> ConnectorResult<&str> {
        match self.get(key) {
            Some(v) if !v.trim().is_empty() => Ok(v),
            _ => Err(ConnectorError::config(format!("{key} is required"))),
        }
    }

    /// Gets all non-blank values of a key, empty if absent.
    #[must_use]
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.values
            .get(key)
            .map(|v| {
                v.iter()
                    .map(String::as_str)
                    .filter(|s| !s.trim().is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Gets a value as bool.
    pub fn get_bool(&self, key: &str) -> ConnectorResult<Option<bool>> {
        self.get(key)
            .map(|v| match v.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(true),
                "false" | "no" | "off" | "0" => Ok(false),
                _ => Err(ConnectorError::config(format!(
                    "{key} must be a boolean, got '{v}'"
                ))),
            })
            .transpose()
    }

    /// Gets a value as bool or a default.
    pub fn get_bool_or(&self, key: &str, default: bool) -> ConnectorResult<bool> {
        Ok(self.get_bool(key)?.unwrap_or(default))
    }

    /// Gets a value as u32.
    pub fn get_u32(&self, key: &str) -> ConnectorResult<Option<u32>> {
        self.get(key)
            .map(|v| {
                v.trim().parse::<u32>().map_err(|_| {
                    ConnectorError::config(format!("{key} must be a number, got '{v}'"))
                })
            })
            .transpose()
    }

    /// Gets a value as u32 or a default.
    pub fn get_u32_or(&self, key: &str, default: u32) -> ConnectorResult<u32> {
        Ok(self.get_u32(key)?.unwrap_or(default))
    }

    /// Iterates over all keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Merges another configuration into this one; its values win.
    pub fn merge(&mut self, other: Self) {
        self.values.extend(other.values);
    }
}
