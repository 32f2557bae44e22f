//! Opaque connector checkpoint.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Result;

/// Resumption state owned by the collector.
///
/// The runtime only loads and stores it; keys and values are the collector's business.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checkpoint(Map<String, Value>);

impl Checkpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a stored checkpoint. Blank input and JSON `null` yield an empty checkpoint.
    pub fn from_json(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw == "null" {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.0)?)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<Map<String, Value>> for Checkpoint {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
