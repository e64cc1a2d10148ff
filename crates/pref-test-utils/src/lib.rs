//! Testing utilities for the pref workspace
//!
//! In-memory host collaborators with failure injection and call recording.

#![allow(missing_docs)]

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use pref_queue::QueueConfig;
use pref_reconcile::{CacheStore, LiveSettings, Reconciler, StoreError};
use pref_value::{CacheMap, ItemId, ScopeSet, SettingKey, SettingValue};
use std::collections::HashMap;
use std::sync::Arc;

pub const ALWAYS: usize = usize::MAX;

/// Live settings held in memory
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: Mutex<IndexMap<String, SettingValue>>,
    failures: Mutex<HashMap<String, usize>>,
    writes: Mutex<Vec<(String, Option<SettingValue>)>>,
    attempts: Mutex<usize>,
}

impl MemorySettings {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_values<I, K, V>(values: I) -> Arc<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<SettingValue>,
    {
        let settings = Self::default();
        {
            let mut map = settings.values.lock();
            for (key, value) in values {
                map.insert(key.into(), value.into());
            }
        }
        Arc::new(settings)
    }

    /// Simulate a user edit, bypassing failure injection and the write log
    pub fn user_set(&self, key: &str, value: impl Into<SettingValue>) {
        self.values.lock().insert(key.to_string(), value.into());
    }

    /// Simulate a user resetting a setting to its default
    pub fn user_clear(&self, key: &str) {
        self.values.lock().shift_remove(key);
    }

    /// Fail the next `times` writes to `key` (`ALWAYS` for every write)
    pub fn fail_writes(&self, key: &str, times: usize) {
        self.failures.lock().insert(key.to_string(), times);
    }

    pub fn get(&self, key: &str) -> Option<SettingValue> {
        self.values.lock().get(key).cloned()
    }

    /// Successful writes in order
    pub fn writes(&self) -> Vec<(String, Option<SettingValue>)> {
        self.writes.lock().clone()
    }

    /// Write attempts including failed ones
    pub fn attempts(&self) -> usize {
        *self.attempts.lock()
    }

    pub fn snapshot(&self) -> IndexMap<String, SettingValue> {
        self.values.lock().clone()
    }
}

#[async_trait]
impl LiveSettings for MemorySettings {
    fn read(&self, key: &SettingKey) -> Option<SettingValue> {
        self.get(key.as_str())
    }

    async fn write(&self, key: &SettingKey, value: Option<SettingValue>) -> Result<(), StoreError> {
        *self.attempts.lock() += 1;
        {
            let mut failures = self.failures.lock();
            if let Some(left) = failures.get_mut(key.as_str()) {
                if *left > 0 {
                    if *left != ALWAYS {
                        *left -= 1;
                    }
                    return Err(StoreError::rejected(key.as_str(), "injected failure"));
                }
            }
        }

        let mut values = self.values.lock();
        match &value {
            Some(v) => {
                values.insert(key.to_string(), v.clone());
            }
            None => {
                values.shift_remove(key.as_str());
            }
        }
        self.writes.lock().push((key.to_string(), value));
        Ok(())
    }
}

/// Provenance cache held in memory
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
    writes: Mutex<Vec<(String, Option<String>)>>,
    fail: Mutex<bool>,
}

impl MemoryCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock() = fail;
    }

    pub fn raw(&self, item: &str) -> Option<String> {
        self.entries.lock().get(item).cloned()
    }

    /// Decoded scalar cache, empty when absent
    pub fn map(&self, item: &str) -> CacheMap {
        self.raw(item)
            .map(|raw| CacheMap::decode(&raw).unwrap())
            .unwrap_or_default()
    }

    /// Decoded composite scope cache, empty when absent
    pub fn scopes(&self, item: &str) -> ScopeSet {
        self.raw(item)
            .map(|raw| ScopeSet::decode(&raw).unwrap())
            .unwrap_or_default()
    }

    pub fn writes(&self) -> Vec<(String, Option<String>)> {
        self.writes.lock().clone()
    }

    pub fn seed(&self, item: &str, cache: &CacheMap) {
        self.entries
            .lock()
            .insert(item.to_string(), cache.encode().unwrap());
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    fn read(&self, item: &ItemId) -> Option<String> {
        self.raw(item.as_str())
    }

    async fn write(&self, item: &ItemId, value: Option<String>) -> Result<(), StoreError> {
        if *self.fail.lock() {
            return Err(StoreError::rejected(item.as_str(), "cache unavailable"));
        }
        let mut entries = self.entries.lock();
        match &value {
            Some(raw) => {
                entries.insert(item.to_string(), raw.clone());
            }
            None => {
                entries.remove(item.as_str());
            }
        }
        self.writes.lock().push((item.to_string(), value));
        Ok(())
    }
}

/// Reconciler over fresh in-memory hosts
pub struct Harness {
    pub live: Arc<MemorySettings>,
    pub cache: Arc<MemoryCache>,
    pub reconciler: Reconciler,
}

pub fn harness() -> Harness {
    harness_with(MemorySettings::new(), QueueConfig::default())
}

pub fn harness_with(live: Arc<MemorySettings>, config: QueueConfig) -> Harness {
    let cache = MemoryCache::new();
    let reconciler = Reconciler::new(live.clone(), cache.clone(), config).unwrap();
    Harness {
        live,
        cache,
        reconciler,
    }
}

pub fn item(id: &str) -> ItemId {
    ItemId::new(id)
}
