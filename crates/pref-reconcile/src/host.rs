//! Host collaborators
//!
//! Implemented by the embedding application. Reads are synchronous snapshots
//! of host state; writes are async and may fail transiently.

use crate::error::StoreError;
use async_trait::async_trait;
use pref_value::{ItemId, SettingKey, SettingValue};

/// Live user-level settings
#[async_trait]
pub trait LiveSettings: Send + Sync {
    /// Current user-level value, `None` when it equals the external default
    fn read(&self, key: &SettingKey) -> Option<SettingValue>;

    /// Set (`Some`) or clear (`None`) the user-level override
    async fn write(&self, key: &SettingKey, value: Option<SettingValue>) -> Result<(), StoreError>;
}

/// Persistent key/value store for provenance entries, keyed by item
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Serialized entry for item, if any
    fn read(&self, item: &ItemId) -> Option<String>;

    /// Replace (`Some`) or delete (`None`) the entry for item
    async fn write(&self, item: &ItemId, value: Option<String>) -> Result<(), StoreError>;
}
