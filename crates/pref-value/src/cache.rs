//! Provenance cache entries
//!
//! Two persisted shapes, both plain JSON strings keyed by item identity:
//!
//! - [`CacheMap`]: ordered `[key, value]` pairs, one per setting this system
//!   believes it still owns. Duplicate keys resolve last-write-wins.
//! - [`ScopeSet`]: ordered list of scope selectors contributed to a composite
//!   rule entry.

use crate::error::ValueError;
use crate::op::SettingKey;
use crate::value::SettingValue;
use indexmap::{IndexMap, IndexSet};

/// Setting key -> value this system last wrote
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheMap {
    entries: IndexMap<SettingKey, SettingValue>,
}

impl CacheMap {
    /// Create empty map
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode from the serialized pair list
    ///
    /// # Errors
    /// - `ValueError::Decode` if the input is not a JSON list of `[key, value]` pairs
    pub fn decode(raw: &str) -> Result<Self, ValueError> {
        let pairs: Vec<(SettingKey, SettingValue)> =
            serde_json::from_str(raw).map_err(|e| ValueError::decode("cache map", e))?;
        Ok(pairs.into_iter().collect())
    }

    /// Encode as the serialized pair list
    ///
    /// # Errors
    /// - `ValueError::Encode` on serializer failure
    pub fn encode(&self) -> Result<String, ValueError> {
        let pairs: Vec<(&SettingKey, &SettingValue)> = self.entries.iter().collect();
        serde_json::to_string(&pairs).map_err(|e| ValueError::encode("cache map", e))
    }

    /// Cached value for key
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.entries.get(key)
    }

    /// Whether key is tracked
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Track key with value
    pub fn insert(&mut self, key: impl Into<SettingKey>, value: SettingValue) {
        self.entries.insert(key.into(), value);
    }

    /// Stop tracking key, keeping the order of the remaining entries
    pub fn remove(&mut self, key: &str) -> Option<SettingValue> {
        self.entries.shift_remove(key)
    }

    /// Apply a set/revert outcome: `Some` tracks, `None` releases
    pub fn apply(&mut self, key: &SettingKey, value: Option<&SettingValue>) {
        match value {
            Some(v) => self.insert(key.clone(), v.clone()),
            None => {
                self.remove(key.as_str());
            }
        }
    }

    /// Tracked entry count
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is tracked
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&SettingKey, &SettingValue)> {
        self.entries.iter()
    }

    /// Tracked keys
    pub fn keys(&self) -> impl Iterator<Item = &SettingKey> {
        self.entries.keys()
    }
}

impl FromIterator<(SettingKey, SettingValue)> for CacheMap {
    fn from_iter<I: IntoIterator<Item = (SettingKey, SettingValue)>>(iter: I) -> Self {
        let mut entries = IndexMap::new();
        for (key, value) in iter {
            entries.insert(key, value);
        }
        Self { entries }
    }
}

/// Scope selectors this system contributed to a composite rule entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeSet {
    items: IndexSet<String>,
}

impl ScopeSet {
    /// Create empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode from a JSON string list
    ///
    /// # Errors
    /// - `ValueError::Decode` if the input is not a JSON list of strings
    pub fn decode(raw: &str) -> Result<Self, ValueError> {
        let items: Vec<String> =
            serde_json::from_str(raw).map_err(|e| ValueError::decode("scope set", e))?;
        Ok(items.into_iter().collect())
    }

    /// Encode as a JSON string list
    ///
    /// # Errors
    /// - `ValueError::Encode` on serializer failure
    pub fn encode(&self) -> Result<String, ValueError> {
        serde_json::to_string(&self.items).map_err(|e| ValueError::encode("scope set", e))
    }

    /// Add selector, returns false if already present
    pub fn insert(&mut self, scope: impl Into<String>) -> bool {
        self.items.insert(scope.into())
    }

    /// Whether selector is owned
    #[inline]
    #[must_use]
    pub fn contains(&self, scope: &str) -> bool {
        self.items.contains(scope)
    }

    /// Owned selector count
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is owned
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().map(Into::into).collect(),
        }
    }
}
