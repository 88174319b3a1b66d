//! Typed property bags.
//!
//! Files, operations, content units and collections all carry an open-ended
//! set of properties (durations, capture dates, workflow ids, capture ids...).
//! They are stored as a JSON object whose values are restricted to scalars.
//!
//! Merging follows merge-patch rules without deletion: keys from the patch are
//! added or overwrite existing keys, and nothing is ever removed implicitly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// A single scalar property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl PropValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value, accepting integers as well.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for PropValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for PropValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for PropValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for PropValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for PropValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for PropValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// String keyed map of scalar properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(BTreeMap<String, PropValue>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with<K: Into<String>, V: Into<PropValue>>(mut self, key: K, value: V) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert only when a value is present.
    #[must_use]
    pub fn with_opt<K: Into<String>, V: Into<PropValue>>(mut self, key: K, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.insert(key, v);
        }
        self
    }

    pub fn insert<K: Into<String>, V: Into<PropValue>>(&mut self, key: K, value: V) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(PropValue::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(PropValue::as_i64)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(PropValue::as_f64)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<PropValue> {
        self.0.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropValue)> {
        self.0.iter()
    }

    /// Apply `patch` on top of these properties.
    ///
    /// Returns `true` if any key was added or changed.
    pub fn merge(&mut self, patch: &Properties) -> bool {
        let mut changed = false;
        for (k, v) in &patch.0 {
            if self.0.get(k) != Some(v) {
                self.0.insert(k.clone(), v.clone());
                changed = true;
            }
        }
        changed
    }

    /// Serialize to the JSON text stored in the database.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.0).map_err(|e| Error::internal(e.to_string()))
    }

    /// Parse the JSON text stored in the database.
    ///
    /// Empty text and `null` yield an empty bag. `null` values inside the
    /// object are dropped; nested arrays or objects are rejected.
    pub fn from_json(json: &str) -> Result<Self> {
        let trimmed = json.trim();
        if trimmed.is_empty() || trimmed == "null" {
            return Ok(Self::default());
        }

        let raw: BTreeMap<String, serde_json::Value> =
            serde_json::from_str(trimmed).map_err(|e| Error::internal(e.to_string()))?;

        let mut props = Self::default();
        for (k, v) in raw {
            match v {
                serde_json::Value::Null => {}
                serde_json::Value::Bool(b) => props.insert(k, b),
                serde_json::Value::Number(n) => {
                    if let Some(i) = n.as_i64() {
                        props.insert(k, i);
                    } else if let Some(f) = n.as_f64() {
                        props.insert(k, f);
                    }
                }
                serde_json::Value::String(s) => props.insert(k, s),
                other => {
                    return Err(Error::internal(format!(
                        "property {} is not a scalar: {}",
                        k, other
                    )))
                }
            }
        }
        Ok(props)
    }
}

impl FromIterator<(String, PropValue)> for Properties {
    fn from_iter<I: IntoIterator<Item = (String, PropValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
