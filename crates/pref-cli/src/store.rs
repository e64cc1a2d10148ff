//! File-backed host collaborators
//!
//! Each file is one JSON object loaded at open and rewritten in full after
//! every write. Writers take the flush lock before touching the in-memory
//! document so file contents follow write order.

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::RwLock;
use pref_reconcile::{CacheStore, LiveSettings, StoreError};
use pref_value::{ItemId, SettingKey, SettingValue};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

async fn load<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) if text.trim().is_empty() => Ok(T::default()),
        Ok(text) => Ok(serde_json::from_str(&text)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(err) => Err(err.into()),
    }
}

async fn save<T: Serialize>(path: &Path, doc: &T) -> Result<(), StoreError> {
    let mut text = serde_json::to_string_pretty(doc)?;
    text.push('\n');
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, text).await?;
    Ok(())
}

/// User settings stored as a flat JSON object
#[derive(Debug)]
pub struct JsonSettingsFile {
    path: PathBuf,
    doc: RwLock<IndexMap<String, serde_json::Value>>,
    flush: Mutex<()>,
}

impl JsonSettingsFile {
    /// Load settings, starting empty when the file does not exist
    ///
    /// # Errors
    /// - `StoreError::Io` if the file cannot be read
    /// - `StoreError::Serialize` if it is not a JSON object
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let doc = load(&path).await?;
        Ok(Self {
            path,
            doc: RwLock::new(doc),
            flush: Mutex::new(()),
        })
    }

    /// File path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LiveSettings for JsonSettingsFile {
    fn read(&self, key: &SettingKey) -> Option<SettingValue> {
        let raw = self.doc.read().get(key.as_str()).cloned()?;
        if raw.is_null() {
            return None;
        }
        let shown = raw.to_string();
        match SettingValue::from_json(raw) {
            Ok(value) => Some(value),
            Err(err) => {
                // opaque values read as their JSON text so they never look like the default
                tracing::debug!(%key, error = %err, "setting has no typed representation");
                Some(SettingValue::String(shown))
            }
        }
    }

    async fn write(&self, key: &SettingKey, value: Option<SettingValue>) -> Result<(), StoreError> {
        let _flush = self.flush.lock().await;
        let snapshot = {
            let mut doc = self.doc.write();
            match &value {
                Some(v) => {
                    doc.insert(key.to_string(), v.to_json());
                }
                None => {
                    doc.shift_remove(key.as_str());
                }
            }
            doc.clone()
        };
        save(&self.path, &snapshot).await
    }
}

/// Provenance cache stored as a JSON object of item -> serialized entry
#[derive(Debug)]
pub struct JsonCacheFile {
    path: PathBuf,
    doc: RwLock<IndexMap<String, String>>,
    flush: Mutex<()>,
}

impl JsonCacheFile {
    /// Load cache, starting empty when the file does not exist
    ///
    /// # Errors
    /// - `StoreError::Io` if the file cannot be read
    /// - `StoreError::Serialize` if it is not a JSON object of strings
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let doc = load(&path).await?;
        Ok(Self {
            path,
            doc: RwLock::new(doc),
            flush: Mutex::new(()),
        })
    }
}

#[async_trait]
impl CacheStore for JsonCacheFile {
    fn read(&self, item: &ItemId) -> Option<String> {
        self.doc.read().get(item.as_str()).cloned()
    }

    async fn write(&self, item: &ItemId, value: Option<String>) -> Result<(), StoreError> {
        let _flush = self.flush.lock().await;
        let snapshot = {
            let mut doc = self.doc.write();
            match value {
                Some(raw) => {
                    doc.insert(item.to_string(), raw);
                }
                None => {
                    doc.shift_remove(item.as_str());
                }
            }
            doc.clone()
        };
        save(&self.path, &snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn missing_file_reads_as_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = JsonSettingsFile::open(dir.path().join("settings.json")).await.unwrap();
        assert_eq!(settings.read(&SettingKey::new("editor.smoothScrolling")), None);
    }

    #[tokio::test]
    async fn writes_keep_foreign_keys_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        tokio::fs::write(&path, r#"{"z.first": [1, 2], "a.second": "x"}"#)
            .await
            .unwrap();

        let settings = JsonSettingsFile::open(&path).await.unwrap();
        settings
            .write(&SettingKey::new("editor.fontSize"), Some(14.into()))
            .await
            .unwrap();
        settings.write(&SettingKey::new("a.second"), None).await.unwrap();

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        let doc: IndexMap<String, serde_json::Value> = serde_json::from_str(&text).unwrap();
        assert_eq!(doc.keys().collect::<Vec<_>>(), ["z.first", "editor.fontSize"]);
        assert_eq!(doc["editor.fontSize"], serde_json::json!(14));
    }

    #[tokio::test]
    async fn opaque_values_never_read_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        tokio::fs::write(&path, r#"{"files.exclude.list": [1, 2]}"#).await.unwrap();

        let settings = JsonSettingsFile::open(&path).await.unwrap();
        assert!(settings.read(&SettingKey::new("files.exclude.list")).is_some());
    }

    #[tokio::test]
    async fn cache_entries_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let item = ItemId::new("mode");

        let cache = JsonCacheFile::open(&path).await.unwrap();
        cache.write(&item, Some(r#"[["x",false]]"#.into())).await.unwrap();

        let reopened = JsonCacheFile::open(&path).await.unwrap();
        assert_eq!(reopened.read(&item).as_deref(), Some(r#"[["x",false]]"#));

        reopened.write(&item, None).await.unwrap();
        assert_eq!(reopened.read(&item), None);
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap().trim(), "{}");
    }

    #[tokio::test]
    async fn single_selector_rules_read_as_rule_lists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        tokio::fs::write(
            &path,
            r#"{"editor.tokenColorCustomizations": {"textMateRules": [{"name": "Foo", "scope": "comment", "settings": {}}]}}"#,
        )
        .await
        .unwrap();

        let settings = JsonSettingsFile::open(&path).await.unwrap();
        let value = settings
            .read(&SettingKey::new("editor.tokenColorCustomizations"))
            .unwrap();
        let rules = value.as_object().unwrap()["textMateRules"].as_rules().unwrap();
        assert_eq!(rules[0].scope(), ["comment".to_string()]);
    }
}
