//! Composite rule-list merging
//!
//! A composite setting is an object holding a list of named rules under one
//! property. Several contributors share the list, so only one entry is ever
//! touched, and within it only the scope selectors recorded as ours.
//!
//! An entry is recognised by name plus exact settings; anything else in the
//! list is foreign and left as is, even when it carries the same name.

use crate::error::ReconcileError;
use crate::reconciler::Reconciler;
use indexmap::IndexMap;
use pref_value::{ItemId, Rule, Scope, ScopeSet, SettingKey, SettingValue};
use serde::{Deserialize, Serialize};

/// Setting and property holding the shared rule list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeTarget {
    /// Composite setting key
    pub setting: SettingKey,
    /// Property of the setting object that holds the rule list
    pub list_property: String,
}

impl CompositeTarget {
    /// Create target
    #[inline]
    #[must_use]
    pub fn new(setting: impl Into<SettingKey>, list_property: impl Into<String>) -> Self {
        Self {
            setting: setting.into(),
            list_property: list_property.into(),
        }
    }
}

/// Setting value to write and scope selectors to record after a merge
#[derive(Debug, Clone, PartialEq)]
pub struct MergePlan {
    /// New setting value
    pub value: SettingValue,
    /// Scope selectors now owned
    pub owned: ScopeSet,
}

/// Setting value after an unmerge
#[derive(Debug, Clone, PartialEq)]
pub struct UnmergePlan {
    /// New setting value, `None` to clear the setting
    pub value: Option<SettingValue>,
    /// Whether the setting needs writing
    pub changed: bool,
}

/// Result of a merge or unmerge call
#[derive(Debug, Clone, PartialEq)]
pub struct MergeReport {
    /// Item that owns the contribution
    pub item: ItemId,
    /// Whether the composite setting was written
    pub written: bool,
    /// Scope selectors recorded as owned after the call
    pub owned: ScopeSet,
}

fn describe(value: &SettingValue) -> &'static str {
    match value {
        SettingValue::Bool(_) => "a boolean",
        SettingValue::Number(_) => "a number",
        SettingValue::String(_) => "a string",
        SettingValue::Rules(_) => "a bare rule list",
        SettingValue::Object(_) => "an object",
    }
}

/// Plan adding `rule` to the live composite value
///
/// Returns `Ok(None)` when nothing new would be contributed.
///
/// # Errors
/// - `ReconcileError::Shape` if the setting or its list property holds a
///   value that cannot carry rules
pub fn plan_merge(
    live: Option<&SettingValue>,
    target: &CompositeTarget,
    rule: &Rule,
) -> Result<Option<MergePlan>, ReconcileError> {
    let full_scope = || rule.scope().iter().cloned().collect::<ScopeSet>();

    let mut object = match live {
        None => IndexMap::new(),
        Some(SettingValue::Object(object)) => object.clone(),
        Some(other) => {
            return Err(ReconcileError::shape(target.setting.as_str(), describe(other)));
        }
    };

    let owned = match object.get_mut(&target.list_property) {
        None => {
            object.insert(
                target.list_property.clone(),
                SettingValue::Rules(vec![rule.clone()]),
            );
            full_scope()
        }
        Some(SettingValue::Rules(rules)) => {
            match rules.iter_mut().find(|entry| entry.same_identity(rule)) {
                Some(entry) => match entry.scope.as_mut() {
                    Some(scope) => {
                        let mut added = ScopeSet::new();
                        for selector in rule.scope() {
                            if !scope.contains(selector) {
                                scope.push(selector.clone());
                                added.insert(selector.clone());
                            }
                        }
                        added
                    }
                    None => {
                        entry.scope = Some(Scope::Many(rule.scope().to_vec()));
                        full_scope()
                    }
                },
                None => {
                    rules.push(rule.clone());
                    full_scope()
                }
            }
        }
        Some(other) => {
            return Err(ReconcileError::shape(
                target.setting.as_str(),
                format!("{} holds {}", target.list_property, describe(other)),
            ));
        }
    };

    if owned.is_empty() {
        return Ok(None);
    }

    Ok(Some(MergePlan {
        value: SettingValue::Object(object),
        owned,
    }))
}

/// Plan removing owned scope selectors of `rule` from the live composite value
///
/// Live values that do not contain a recognisable entry are left unchanged.
#[must_use]
pub fn plan_unmerge(
    live: Option<&SettingValue>,
    target: &CompositeTarget,
    rule: &Rule,
    owned: &ScopeSet,
) -> UnmergePlan {
    let unchanged = UnmergePlan {
        value: live.cloned(),
        changed: false,
    };

    let Some(SettingValue::Object(object)) = live else {
        return unchanged;
    };
    let mut object = object.clone();

    let Some(SettingValue::Rules(rules)) = object.get_mut(&target.list_property) else {
        return unchanged;
    };
    let Some(index) = rules.iter().position(|entry| entry.same_identity(rule)) else {
        return unchanged;
    };

    let entry = &mut rules[index];
    let mut changed = false;
    if let Some(scope) = entry.scope.as_mut() {
        let before = scope.as_slice().len();
        scope.retain(|selector| !owned.contains(selector));
        changed = scope.as_slice().len() != before;
    }

    if entry.scope().is_empty() {
        changed = true;
        if rules.len() > 1 {
            rules.remove(index);
        } else if object.len() > 1 {
            object.shift_remove(&target.list_property);
        } else {
            return UnmergePlan {
                value: None,
                changed,
            };
        }
    }

    UnmergePlan {
        value: Some(SettingValue::Object(object)),
        changed,
    }
}

impl Reconciler {
    /// Contribute `rule` to the composite setting
    ///
    /// The owned scope selectors are saved before the setting is written.
    ///
    /// # Errors
    /// - `ReconcileError::Shape` if the live setting cannot carry rules
    /// - `ReconcileError::Store` if the cache or the setting write fails
    pub async fn merge_rule(
        &self,
        item: &ItemId,
        target: &CompositeTarget,
        rule: &Rule,
    ) -> Result<MergeReport, ReconcileError> {
        let _guard = self.ctx.lock_item(item).await;
        let live = self.ctx.live.read(&target.setting);

        let Some(plan) = plan_merge(live.as_ref(), target, rule)? else {
            tracing::debug!(%item, setting = %target.setting, "rule already present, nothing to merge");
            let owned = self.owned_scope(item)?;
            return Ok(MergeReport {
                item: item.clone(),
                written: false,
                owned,
            });
        };

        self.ctx.cache.write(item, Some(plan.owned.encode()?)).await?;
        self.ctx.live.write(&target.setting, Some(plan.value)).await?;

        tracing::info!(%item, setting = %target.setting, owned = plan.owned.len(), "rule merged");
        Ok(MergeReport {
            item: item.clone(),
            written: true,
            owned: plan.owned,
        })
    }

    /// Withdraw the owned part of `rule` from the composite setting
    ///
    /// # Errors
    /// - `ReconcileError::Value` if the stored scope entry is unreadable
    /// - `ReconcileError::Store` if the setting write or cache clear fails
    pub async fn unmerge_rule(
        &self,
        item: &ItemId,
        target: &CompositeTarget,
        rule: &Rule,
    ) -> Result<MergeReport, ReconcileError> {
        let _guard = self.ctx.lock_item(item).await;
        let Some(raw) = self.ctx.cache.read(item) else {
            tracing::debug!(%item, "no owned scope recorded, nothing to unmerge");
            return Ok(MergeReport {
                item: item.clone(),
                written: false,
                owned: ScopeSet::new(),
            });
        };
        let owned = ScopeSet::decode(&raw)?;

        let live = self.ctx.live.read(&target.setting);
        let plan = plan_unmerge(live.as_ref(), target, rule, &owned);
        if plan.changed {
            self.ctx.live.write(&target.setting, plan.value).await?;
        }
        self.ctx.cache.write(item, None).await?;

        tracing::info!(%item, setting = %target.setting, written = plan.changed, "rule unmerged");
        Ok(MergeReport {
            item: item.clone(),
            written: plan.changed,
            owned: ScopeSet::new(),
        })
    }

    /// Scope selectors currently recorded for a composite item
    ///
    /// # Errors
    /// - `ReconcileError::Value` if the stored entry is unreadable
    pub fn owned_scope(&self, item: &ItemId) -> Result<ScopeSet, ReconcileError> {
        match self.ctx.cache.read(item) {
            Some(raw) => Ok(ScopeSet::decode(&raw)?),
            None => Ok(ScopeSet::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn target() -> CompositeTarget {
        CompositeTarget::new("editor.tokenColorCustomizations", "textMateRules")
    }

    fn bold(scope: &[&str]) -> Rule {
        Rule::new("Bold")
            .with_scope(scope.iter().copied())
            .with_setting("fontStyle", "bold")
    }

    fn object(rules: Vec<Rule>) -> SettingValue {
        let mut map = IndexMap::new();
        map.insert("textMateRules".to_string(), SettingValue::Rules(rules));
        SettingValue::Object(map)
    }

    fn rules_of(value: &SettingValue) -> &[Rule] {
        value
            .as_object()
            .and_then(|obj| obj.get("textMateRules"))
            .and_then(SettingValue::as_rules)
            .unwrap_or(&[])
    }

    #[test]
    fn merge_creates_whole_setting() {
        let plan = plan_merge(None, &target(), &bold(&["a", "b"])).unwrap().unwrap();

        assert_eq!(plan.value, object(vec![bold(&["a", "b"])]));
        assert_eq!(plan.owned.iter().collect::<Vec<_>>(), ["a", "b"]);
    }

    #[test]
    fn merge_records_only_new_selectors() {
        let live = object(vec![bold(&["a", "user"])]);

        let plan = plan_merge(Some(&live), &target(), &bold(&["a", "b"]))
            .unwrap()
            .unwrap();

        assert_eq!(rules_of(&plan.value)[0].scope(), ["a", "user", "b"]);
        assert_eq!(plan.owned.iter().collect::<Vec<_>>(), ["b"]);
    }

    #[test]
    fn merge_without_new_selectors_is_noop() {
        let live = object(vec![bold(&["b", "a"])]);
        assert!(plan_merge(Some(&live), &target(), &bold(&["a", "b"])).unwrap().is_none());
    }

    #[test]
    fn merge_appends_beside_modified_entry() {
        let modified = Rule::new("Bold")
            .with_scope(["x"])
            .with_setting("fontStyle", "italic");
        let live = object(vec![modified.clone()]);

        let plan = plan_merge(Some(&live), &target(), &bold(&["a"])).unwrap().unwrap();

        assert_eq!(rules_of(&plan.value), [modified, bold(&["a"])]);
    }

    #[test]
    fn merge_keeps_foreign_properties() {
        let mut map = IndexMap::new();
        map.insert("comments".to_string(), SettingValue::from("#888"));
        let live = SettingValue::Object(map);

        let plan = plan_merge(Some(&live), &target(), &bold(&["a"])).unwrap().unwrap();
        let merged = plan.value.as_object().unwrap();

        assert_eq!(merged.get("comments"), Some(&SettingValue::from("#888")));
        assert_eq!(rules_of(&plan.value), [bold(&["a"])]);
    }

    #[test]
    fn merge_appends_beside_single_selector_rule() {
        let live = SettingValue::from_json(serde_json::json!({
            "textMateRules": [{"name": "Foo", "scope": "comment", "settings": {"foreground": "#888"}}]
        }))
        .unwrap();

        let plan = plan_merge(Some(&live), &target(), &bold(&["a"])).unwrap().unwrap();

        assert_eq!(rules_of(&plan.value)[1], bold(&["a"]));
        assert_eq!(
            plan.value.to_json()["textMateRules"][0],
            serde_json::json!({"name": "Foo", "scope": "comment", "settings": {"foreground": "#888"}})
        );
    }

    #[test]
    fn merge_widens_single_selector_of_our_entry() {
        let live = SettingValue::from_json(serde_json::json!({
            "textMateRules": [{"name": "Bold", "scope": "a", "settings": {"fontStyle": "bold"}}]
        }))
        .unwrap();

        let plan = plan_merge(Some(&live), &target(), &bold(&["a", "b"])).unwrap().unwrap();

        assert_eq!(rules_of(&plan.value)[0].scope(), ["a", "b"]);
        assert_eq!(plan.owned.iter().collect::<Vec<_>>(), ["b"]);
    }

    #[test]
    fn merge_rejects_scalar_setting() {
        let err = plan_merge(Some(&SettingValue::from(true)), &target(), &bold(&["a"])).unwrap_err();
        assert!(matches!(err, ReconcileError::Shape { .. }));
    }

    #[test]
    fn unmerge_removes_only_owned_selectors() {
        let live = object(vec![bold(&["a", "user", "b"])]);
        let owned: ScopeSet = ["b"].into_iter().collect();

        let plan = plan_unmerge(Some(&live), &target(), &bold(&["a", "b"]), &owned);

        assert!(plan.changed);
        assert_eq!(rules_of(plan.value.as_ref().unwrap())[0].scope(), ["a", "user"]);
    }

    #[test]
    fn unmerge_drops_list_but_keeps_other_properties() {
        let mut map = IndexMap::new();
        map.insert("comments".to_string(), SettingValue::from("#888"));
        map.insert(
            "textMateRules".to_string(),
            SettingValue::Rules(vec![bold(&["a"])]),
        );
        let owned: ScopeSet = ["a"].into_iter().collect();

        let plan = plan_unmerge(Some(&SettingValue::Object(map)), &target(), &bold(&["a"]), &owned);
        let remaining = plan.value.unwrap();

        assert_eq!(remaining.as_object().unwrap().len(), 1);
        assert!(remaining.as_object().unwrap().contains_key("comments"));
    }

    #[test]
    fn unmerge_clears_setting_when_nothing_else_remains() {
        let live = object(vec![bold(&["a"])]);
        let owned: ScopeSet = ["a"].into_iter().collect();

        let plan = plan_unmerge(Some(&live), &target(), &bold(&["a"]), &owned);

        assert_eq!(plan, UnmergePlan { value: None, changed: true });
    }

    #[test]
    fn unmerge_without_entry_is_unchanged() {
        let other = Rule::new("Italic").with_scope(["a"]).with_setting("fontStyle", "italic");
        let live = object(vec![other]);
        let owned: ScopeSet = ["a"].into_iter().collect();

        let plan = plan_unmerge(Some(&live), &target(), &bold(&["a"]), &owned);

        assert!(!plan.changed);
        assert_eq!(plan.value, Some(live));
    }

    fn selectors() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-e]", 0..5)
    }

    proptest! {
        #[test]
        fn prop_merge_then_unmerge_restores_user_selectors(
            user in selectors(),
            contributed in prop::collection::vec("[a-h]", 1..5),
        ) {
            let mut user_scope: Vec<String> = Vec::new();
            for s in user {
                if !user_scope.contains(&s) {
                    user_scope.push(s);
                }
            }
            let foreign = Rule::new("Italic").with_scope(["comment"]).with_setting("fontStyle", "italic");
            let rule = Rule::new("Bold")
                .with_scope(contributed.iter().cloned())
                .with_setting("fontStyle", "bold");
            let existing = Rule::new("Bold")
                .with_scope(user_scope.iter().cloned())
                .with_setting("fontStyle", "bold");
            let live = object(vec![foreign, existing]);

            let Some(merged) = plan_merge(Some(&live), &target(), &rule).unwrap() else {
                // every contributed selector was already present
                return Ok(());
            };
            let restored = plan_unmerge(Some(&merged.value), &target(), &rule, &merged.owned);
            let restored = restored.value.unwrap();

            let entry = rules_of(&restored).iter().find(|r| r.same_identity(&rule));
            let scope = entry.map(|r| r.scope().to_vec()).unwrap_or_default();
            prop_assert_eq!(scope, user_scope);
            prop_assert_eq!(rules_of(&restored)[0].name.as_deref(), Some("Italic"));
        }
    }
}
