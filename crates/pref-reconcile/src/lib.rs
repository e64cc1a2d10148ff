//! Pref Reconcile
//!
//! Moves live user settings toward a desired bundle while never overwriting a
//! value the user set themselves. Ownership is tracked per item in a
//! provenance cache: a key is ours only while its live value still equals
//! the value we last wrote.
//!
//! # Core Concepts
//!
//! - [`LiveSettings`] / [`CacheStore`]: host collaborators
//! - [`Reconciler`]: scalar apply/restore passes through the settings queue
//! - [`plan_merge`] / [`plan_unmerge`]: composite rule-list contributions
//! - [`Controller`]: toggle values mapped to actions
//!
//! # Example
//!
//! ```rust,ignore
//! use pref_reconcile::{presets, Reconciler};
//!
//! let reconciler = Reconciler::new(live, cache, QueueConfig::default())?;
//! let report = reconciler.reconcile(&"experience".into(), &presets::basic()).await?;
//! reconciler.wait_idle().await;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod composite;
pub mod error;
pub mod host;
pub mod plan;
pub mod presets;
pub mod reconciler;
pub mod toggle;

pub use composite::{plan_merge, plan_unmerge, CompositeTarget, MergePlan, MergeReport, UnmergePlan};
pub use error::{ReconcileError, StoreError};
pub use host::{CacheStore, LiveSettings};
pub use plan::{fold_outcome, plan_reconcile, plan_restore, ScalarPlan};
pub use reconciler::{
    PassKind, PassReport, Reconciler, ReconcilerContext, SettingsWriter, SettledPass, SETTINGS_QUEUE,
};
pub use toggle::{Action, ActionOutcome, CompositeRule, Controller, Dispatched, ToggleBinding, ToggleCase};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for reconciliation
    pub use crate::{
        Action, CacheStore, CompositeTarget, Controller, LiveSettings, PassReport, ReconcileError,
        Reconciler, StoreError, ToggleBinding,
    };
}
