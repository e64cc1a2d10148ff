//! prefctl configuration file
//!
//! TOML, every section optional. Missing sections fall back to the built-in
//! presets; a present `[bundles]`, `[composites]` or `[[toggle]]` section
//! replaces the corresponding presets entirely.
//!
//! ```toml
//! settings_path = "settings.json"
//! cache_path = "prefctl-cache.json"
//!
//! [queue]
//! max_attempts = 3
//! backoff_ms = 300
//! budget = "shared_per_queue"
//!
//! [bundles.calm]
//! "editor.smoothScrolling" = true
//!
//! [[toggle]]
//! setting = "comfort.experienceMode"
//! item = "comfort.experienceMode"
//! cases = [
//!   { then = { action = "restore" } },
//!   { when = "on", then = { action = "apply", bundle = "calm" } },
//! ]
//! ```

use crate::store::{JsonCacheFile, JsonSettingsFile};
use indexmap::IndexMap;
use pref_queue::QueueConfig;
use pref_reconcile::{presets, CompositeRule, Controller, ReconcileError, Reconciler, ToggleBinding};
use pref_value::{Bundle, SettingKey, SettingValue};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default config file name
pub const DEFAULT_CONFIG: &str = "prefctl.toml";

/// Config loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file unreadable
    #[error("cannot read {path}: {source}")]
    Io {
        /// Config path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// prefctl configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefConfig {
    /// Live settings JSON object file
    pub settings_path: PathBuf,
    /// Provenance cache JSON object file
    pub cache_path: PathBuf,
    /// Settings queue tuning
    pub queue: QueueConfig,
    /// Named bundles
    pub bundles: IndexMap<String, IndexMap<SettingKey, SettingValue>>,
    /// Named composite rules
    pub composites: IndexMap<String, CompositeRule>,
    /// Toggle bindings
    #[serde(rename = "toggle")]
    pub toggles: Vec<ToggleBinding>,
}

impl Default for PrefConfig {
    fn default() -> Self {
        let bundles = [presets::basic(), presets::advanced()]
            .into_iter()
            .map(|bundle| (bundle.name, bundle.entries))
            .collect();

        let mut composites = IndexMap::new();
        composites.insert(
            presets::BOLD_COMPOSITE.to_string(),
            CompositeRule {
                target: presets::token_rules_target(),
                rule: presets::bold_font_rule(),
            },
        );

        Self {
            settings_path: PathBuf::from("settings.json"),
            cache_path: PathBuf::from("prefctl-cache.json"),
            queue: QueueConfig::default(),
            bundles,
            composites,
            toggles: vec![presets::experience_binding(), presets::bold_binding()],
        }
    }
}

impl PrefConfig {
    /// Parse TOML text
    ///
    /// # Errors
    /// - `ConfigError::Parse` on invalid TOML or schema mismatch
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load from a file, using defaults when the file does not exist
    ///
    /// # Errors
    /// - `ConfigError::Io` if the file exists but cannot be read
    /// - `ConfigError::Parse` on invalid content
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => {
                tracing::debug!(path = %path.display(), "loaded config");
                Self::from_toml(&text)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no config file, using built-in presets");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Configured bundles
    pub fn bundles(&self) -> impl Iterator<Item = Bundle> + '_ {
        self.bundles.iter().map(|(name, entries)| {
            Bundle::from_entries(
                name.clone(),
                entries.iter().map(|(k, v)| (k.clone(), v.clone())),
            )
        })
    }

    /// Controller over an existing reconciler
    #[must_use]
    pub fn controller(&self, reconciler: Reconciler) -> Controller {
        let mut controller = Controller::new(reconciler);
        for bundle in self.bundles() {
            controller = controller.with_bundle(bundle);
        }
        for (name, composite) in &self.composites {
            controller = controller.with_composite(name.clone(), composite.clone());
        }
        for binding in &self.toggles {
            controller = controller.with_binding(binding.clone());
        }
        controller
    }

    /// Open the file-backed host and build a controller over it
    ///
    /// # Errors
    /// - `ReconcileError::Store` if a host file exists but cannot be parsed
    pub async fn open(&self) -> Result<Controller, ReconcileError> {
        let live = Arc::new(JsonSettingsFile::open(&self.settings_path).await?);
        let cache = Arc::new(JsonCacheFile::open(&self.cache_path).await?);
        let reconciler = Reconciler::new(live, cache, self.queue)?;
        Ok(self.controller(reconciler))
    }
}
