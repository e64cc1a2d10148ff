//! Error types for reconciliation
//!
//! Write failures inside a queued batch never surface here: they are retried
//! by the queue and reported through the batch outcome. These errors cover
//! the paths that run outside the queue (cache persistence, composite writes,
//! submission).

use pref_queue::QueueError;
use pref_value::ValueError;

/// Errors from host collaborators
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The host refused or failed a write
    #[error("write to {target} rejected: {message}")]
    Rejected {
        /// Setting key or cache item
        target: String,
        /// Host-supplied reason
        message: String,
    },

    /// IO error in a file-backed host
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error in a file-backed host
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    /// Create rejected error
    pub fn rejected(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            target: target.into(),
            message: message.into(),
        }
    }
}

/// Main reconciliation error type
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// Host store failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Persisted cache entry could not be read or written
    #[error("cache entry error: {0}")]
    Value(#[from] ValueError),

    /// Queue submission failed
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// Composite setting is not shaped as an object holding a rule list
    #[error("setting {setting} has unexpected shape: {detail}")]
    Shape {
        /// Composite setting key
        setting: String,
        /// What was found instead
        detail: String,
    },

    /// Controller referenced an unknown bundle or composite rule
    #[error("unknown {kind}: {name}")]
    Unknown {
        /// "bundle" or "composite"
        kind: &'static str,
        /// Referenced name
        name: String,
    },
}

impl ReconcileError {
    /// Create shape error
    pub fn shape(setting: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Shape {
            setting: setting.into(),
            detail: detail.into(),
        }
    }
}
