//! Identities, bundles and write operations

use crate::value::SettingValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Identity under which a bundle's provenance is tracked (a feature toggle)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    /// Create item identity
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Opaque identifier of one external preference
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingKey(pub String);

impl SettingKey {
    /// Create setting key
    #[inline]
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SettingKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SettingKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for SettingKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Set or revert one setting on behalf of an item
///
/// `value == None` reverts the setting to its external default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteOp {
    /// Owning item
    pub item: ItemId,
    /// Target setting
    pub key: SettingKey,
    /// Value to write, `None` to delete the override
    pub value: Option<SettingValue>,
}

impl WriteOp {
    /// Create a set operation
    #[inline]
    #[must_use]
    pub fn set(item: ItemId, key: SettingKey, value: SettingValue) -> Self {
        Self {
            item,
            key,
            value: Some(value),
        }
    }

    /// Create a revert-to-default operation
    #[inline]
    #[must_use]
    pub fn revert(item: ItemId, key: SettingKey) -> Self {
        Self {
            item,
            key,
            value: None,
        }
    }

    /// Whether this operation deletes the override
    #[inline]
    #[must_use]
    pub fn is_revert(&self) -> bool {
        self.value.is_none()
    }
}

impl fmt::Display for WriteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => write!(f, "{}: {} -> {}", self.item, self.key, v),
            None => write!(f, "{}: {} -> <default>", self.item, self.key),
        }
    }
}

/// A named, ordered set of desired setting values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    /// Bundle name (e.g. "basic", "advanced")
    pub name: String,
    /// Desired values in definition order
    pub entries: IndexMap<SettingKey, SettingValue>,
}

impl Bundle {
    /// Create empty bundle
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: IndexMap::new(),
        }
    }

    /// With one desired entry
    #[must_use]
    pub fn with(mut self, key: impl Into<SettingKey>, value: impl Into<SettingValue>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Build from entries, later duplicates win
    #[must_use]
    pub fn from_entries<I>(name: impl Into<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = (SettingKey, SettingValue)>,
    {
        Self {
            name: name.into(),
            entries: entries.into_iter().collect(),
        }
    }

    /// Desired value for key
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.entries.get(key)
    }

    /// Whether the bundle names key
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Entry count
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bundle is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in definition order
    pub fn iter(&self) -> impl Iterator<Item = (&SettingKey, &SettingValue)> {
        self.entries.iter()
    }
}
