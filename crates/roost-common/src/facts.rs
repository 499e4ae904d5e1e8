//! Node facts.
//!
//! Facts are collected by the microkernel and submitted on check-in. A
//! check-in replaces the whole mapping; nothing is merged.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fact names the boot decision engine looks at.
pub const FACT_IS_VIRTUAL: &str = "is_virtual";
pub const FACT_VIRTUAL: &str = "virtual";

/// Immutable snapshot of a node's facts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Facts(BTreeMap<String, String>);

impl Facts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a fact by exact name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Absent facts read as the empty string
    pub fn get_or_empty(&self, name: &str) -> &str {
        self.get(name).unwrap_or("")
    }

    /// Boolean-like fact; absent or unrecognized values are false
    pub fn is_true(&self, name: &str) -> bool {
        self.get(name).map(crate::is_truthy_str).unwrap_or(false)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Builder-style insert, mostly for tests and fixtures
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }
}

impl<K, V> FromIterator<(K, V)> for Facts
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<BTreeMap<String, String>> for Facts {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}
