//! Toggle controller
//!
//! Maps the live value of a toggle setting to a reconciliation action. The
//! host calls [`Controller::handle_change`] from its change notification and
//! [`Controller::activate`] once at startup.

use crate::composite::{CompositeTarget, MergeReport};
use crate::error::ReconcileError;
use crate::reconciler::{PassReport, Reconciler};
use indexmap::IndexMap;
use pref_value::{Bundle, ItemId, Rule, SettingKey, SettingValue};
use serde::{Deserialize, Serialize};

/// What to do for a toggle value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Reconcile the binding's item toward a named bundle
    Apply {
        /// Bundle name
        bundle: String,
    },
    /// Restore the binding's item
    Restore,
    /// Contribute a named composite rule
    Merge {
        /// Composite rule name
        composite: String,
    },
    /// Withdraw a named composite rule
    Unmerge {
        /// Composite rule name
        composite: String,
    },
    /// Leave everything as is
    Nothing,
}

/// One toggle value and its action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToggleCase {
    /// Live toggle value, absent for the default
    #[serde(default)]
    pub when: Option<SettingValue>,
    /// Action to run
    pub then: Action,
}

/// Toggle setting bound to an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToggleBinding {
    /// Toggle setting key
    pub setting: SettingKey,
    /// Item owning the provenance cache
    pub item: ItemId,
    /// Run this binding from [`Controller::activate`]
    #[serde(default)]
    pub on_activate: bool,
    /// Value cases, first match wins; no match means [`Action::Nothing`]
    #[serde(default)]
    pub cases: Vec<ToggleCase>,
}

impl ToggleBinding {
    /// Create binding with no cases
    #[must_use]
    pub fn new(setting: impl Into<SettingKey>, item: impl Into<ItemId>) -> Self {
        Self {
            setting: setting.into(),
            item: item.into(),
            on_activate: false,
            cases: Vec::new(),
        }
    }

    /// Add a case
    #[must_use]
    pub fn when(mut self, value: Option<SettingValue>, then: Action) -> Self {
        self.cases.push(ToggleCase { when: value, then });
        self
    }

    /// Run on activation
    #[must_use]
    pub fn on_activate(mut self) -> Self {
        self.on_activate = true;
        self
    }

    /// Action for a live toggle value
    #[must_use]
    pub fn action_for(&self, value: Option<&SettingValue>) -> &Action {
        self.cases
            .iter()
            .find(|case| case.when.as_ref() == value)
            .map_or(&Action::Nothing, |case| &case.then)
    }
}

/// Named composite rule and where it goes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeRule {
    /// Setting and list property
    pub target: CompositeTarget,
    /// Contributed rule
    pub rule: Rule,
}

/// Result of one dispatched action
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// Scalar pass queued
    Pass(PassReport),
    /// Composite merge or unmerge done
    Composite(MergeReport),
    /// Nothing ran
    Nothing,
}

/// Action run for one binding
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    /// Toggle setting
    pub setting: SettingKey,
    /// Item acted on
    pub item: ItemId,
    /// Action chosen
    pub action: Action,
    /// What it did
    pub outcome: ActionOutcome,
}

/// Toggle-driven reconciliation controller
#[derive(Debug, Clone)]
pub struct Controller {
    reconciler: Reconciler,
    bundles: IndexMap<String, Bundle>,
    composites: IndexMap<String, CompositeRule>,
    bindings: Vec<ToggleBinding>,
}

impl Controller {
    /// Create controller with no bundles or bindings
    #[must_use]
    pub fn new(reconciler: Reconciler) -> Self {
        Self {
            reconciler,
            bundles: IndexMap::new(),
            composites: IndexMap::new(),
            bindings: Vec::new(),
        }
    }

    /// Register a bundle under its name
    #[must_use]
    pub fn with_bundle(mut self, bundle: Bundle) -> Self {
        self.bundles.insert(bundle.name.clone(), bundle);
        self
    }

    /// Register a composite rule
    #[must_use]
    pub fn with_composite(mut self, name: impl Into<String>, composite: CompositeRule) -> Self {
        self.composites.insert(name.into(), composite);
        self
    }

    /// Add a toggle binding
    #[must_use]
    pub fn with_binding(mut self, binding: ToggleBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Underlying reconciler
    #[inline]
    #[must_use]
    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Registered bundle
    #[inline]
    #[must_use]
    pub fn bundle(&self, name: &str) -> Option<&Bundle> {
        self.bundles.get(name)
    }

    /// Registered composite rule
    #[inline]
    #[must_use]
    pub fn composite(&self, name: &str) -> Option<&CompositeRule> {
        self.composites.get(name)
    }

    /// Toggle bindings
    #[inline]
    #[must_use]
    pub fn bindings(&self) -> &[ToggleBinding] {
        &self.bindings
    }

    /// React to a change of `setting`
    ///
    /// # Errors
    /// - `ReconcileError::Unknown` if a case names an unregistered bundle or rule
    /// - any error from the reconciler call the action makes
    pub async fn handle_change(&self, setting: &SettingKey) -> Result<Vec<Dispatched>, ReconcileError> {
        let mut dispatched = Vec::new();
        for binding in self.bindings.iter().filter(|b| &b.setting == setting) {
            dispatched.push(self.dispatch(binding).await?);
        }
        Ok(dispatched)
    }

    /// Run every binding marked `on_activate`
    ///
    /// # Errors
    /// Same as [`Controller::handle_change`].
    pub async fn activate(&self) -> Result<Vec<Dispatched>, ReconcileError> {
        let mut dispatched = Vec::new();
        for binding in self.bindings.iter().filter(|b| b.on_activate) {
            dispatched.push(self.dispatch(binding).await?);
        }
        tracing::info!(bindings = dispatched.len(), "controller activated");
        Ok(dispatched)
    }

    /// Wait for every queue to drain
    pub async fn shutdown(&self) {
        self.reconciler.wait_idle_all().await;
        tracing::info!("controller shut down");
    }

    async fn dispatch(&self, binding: &ToggleBinding) -> Result<Dispatched, ReconcileError> {
        let value = self.reconciler.context().live().read(&binding.setting);
        let action = binding.action_for(value.as_ref()).clone();
        tracing::debug!(setting = %binding.setting, item = %binding.item, ?action, "toggle dispatch");

        let outcome = self.run(&binding.item, &action).await?;
        Ok(Dispatched {
            setting: binding.setting.clone(),
            item: binding.item.clone(),
            action,
            outcome,
        })
    }

    /// Run one action for an item
    ///
    /// # Errors
    /// Same as [`Controller::handle_change`].
    pub async fn run(&self, item: &ItemId, action: &Action) -> Result<ActionOutcome, ReconcileError> {
        match action {
            Action::Apply { bundle } => {
                let bundle = self.bundles.get(bundle).ok_or_else(|| ReconcileError::Unknown {
                    kind: "bundle",
                    name: bundle.clone(),
                })?;
                Ok(ActionOutcome::Pass(self.reconciler.reconcile(item, bundle).await?))
            }
            Action::Restore => Ok(ActionOutcome::Pass(self.reconciler.restore(item).await?)),
            Action::Merge { composite } => {
                let composite = self.lookup_composite(composite)?;
                let report = self
                    .reconciler
                    .merge_rule(item, &composite.target, &composite.rule)
                    .await?;
                Ok(ActionOutcome::Composite(report))
            }
            Action::Unmerge { composite } => {
                let composite = self.lookup_composite(composite)?;
                let report = self
                    .reconciler
                    .unmerge_rule(item, &composite.target, &composite.rule)
                    .await?;
                Ok(ActionOutcome::Composite(report))
            }
            Action::Nothing => Ok(ActionOutcome::Nothing),
        }
    }

    fn lookup_composite(&self, name: &str) -> Result<&CompositeRule, ReconcileError> {
        self.composites.get(name).ok_or_else(|| ReconcileError::Unknown {
            kind: "composite",
            name: name.to_string(),
        })
    }
}
