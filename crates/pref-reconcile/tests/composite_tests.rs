//! Composite rule merging against in-memory hosts

use indexmap::IndexMap;
use pref_reconcile::{presets, CompositeTarget, ReconcileError};
use pref_test_utils::{harness, item};
use pref_value::{Rule, SettingValue};
use pretty_assertions::assert_eq;

fn target() -> CompositeTarget {
    presets::token_rules_target()
}

fn with_rules(rules: Vec<Rule>) -> SettingValue {
    let mut map = IndexMap::new();
    map.insert("textMateRules".to_string(), SettingValue::Rules(rules));
    SettingValue::Object(map)
}

fn rules(value: Option<SettingValue>) -> Vec<Rule> {
    value
        .as_ref()
        .and_then(SettingValue::as_object)
        .and_then(|obj| obj.get("textMateRules"))
        .and_then(SettingValue::as_rules)
        .map(<[Rule]>::to_vec)
        .unwrap_or_default()
}

#[tokio::test]
async fn unrelated_rule_is_kept_and_ours_appended() {
    let h = harness();
    let foo = Rule::new("Foo").with_scope(["comment"]).with_setting("foreground", "#888");
    h.live.user_set("editor.tokenColorCustomizations", with_rules(vec![foo.clone()]));
    let bar = Rule::new("Bar").with_scope(["keyword"]).with_setting("fontStyle", "bold");

    let report = h.reconciler.merge_rule(&item("bold"), &target(), &bar).await.unwrap();

    assert!(report.written);
    assert_eq!(rules(h.live.get("editor.tokenColorCustomizations")), [foo, bar]);
    assert_eq!(h.cache.scopes("bold").iter().collect::<Vec<_>>(), ["keyword"]);
}

#[tokio::test]
async fn foreign_rule_fields_survive_merge_and_unmerge() {
    let h = harness();
    let raw = serde_json::json!({
        "textMateRules": [
            {"name": "Foo", "scope": "comment", "settings": {"foreground": "#888"}, "comment": "mine"}
        ]
    });
    h.live.user_set(
        "editor.tokenColorCustomizations",
        SettingValue::from_json(raw.clone()).unwrap(),
    );
    let rule = presets::bold_font_rule();

    let report = h.reconciler.merge_rule(&item("bold"), &target(), &rule).await.unwrap();

    assert!(report.written);
    let merged = h.live.get("editor.tokenColorCustomizations").unwrap().to_json();
    assert_eq!(merged["textMateRules"][0], raw["textMateRules"][0]);
    assert_eq!(rules(Some(SettingValue::from_json(merged).unwrap()))[1], rule);

    h.reconciler.unmerge_rule(&item("bold"), &target(), &rule).await.unwrap();

    assert_eq!(h.live.get("editor.tokenColorCustomizations").unwrap().to_json(), raw);
}

#[tokio::test]
async fn merge_then_unmerge_clears_created_setting() {
    let h = harness();
    let rule = presets::bold_font_rule();

    h.reconciler.merge_rule(&item("bold"), &target(), &rule).await.unwrap();
    assert_eq!(rules(h.live.get("editor.tokenColorCustomizations")), [rule.clone()]);
    assert_eq!(h.cache.scopes("bold").len(), 3);

    let report = h.reconciler.unmerge_rule(&item("bold"), &target(), &rule).await.unwrap();

    assert!(report.written);
    assert_eq!(h.live.get("editor.tokenColorCustomizations"), None);
    assert_eq!(h.cache.raw("bold"), None);
}

#[tokio::test]
async fn cache_is_saved_before_setting_write() {
    let h = harness();
    let rule = presets::bold_font_rule();

    h.reconciler.merge_rule(&item("bold"), &target(), &rule).await.unwrap();

    assert_eq!(h.cache.writes().len(), 1);
    assert_eq!(h.live.writes().len(), 1);
}

#[tokio::test]
async fn failed_cache_save_skips_setting_write() {
    let h = harness();
    h.cache.set_failing(true);

    let err = h
        .reconciler
        .merge_rule(&item("bold"), &target(), &presets::bold_font_rule())
        .await
        .unwrap_err();

    assert!(matches!(err, ReconcileError::Store(_)));
    assert!(h.live.writes().is_empty());
}

#[tokio::test]
async fn user_selectors_survive_unmerge() {
    let h = harness();
    let rule = presets::bold_font_rule();
    let existing = Rule::new("Font Style: Bold")
        .with_scope(["constant", "variable"])
        .with_setting("fontStyle", "bold");
    h.live.user_set("editor.tokenColorCustomizations", with_rules(vec![existing]));

    let merged = h.reconciler.merge_rule(&item("bold"), &target(), &rule).await.unwrap();
    assert_eq!(
        merged.owned.iter().collect::<Vec<_>>(),
        ["entity.name.function", "meta.function-call.python"]
    );

    h.reconciler.unmerge_rule(&item("bold"), &target(), &rule).await.unwrap();

    let remaining = rules(h.live.get("editor.tokenColorCustomizations"));
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].scope(), ["constant", "variable"]);
}

#[tokio::test]
async fn remerge_with_nothing_new_writes_nothing() {
    let h = harness();
    let rule = presets::bold_font_rule();

    h.reconciler.merge_rule(&item("bold"), &target(), &rule).await.unwrap();
    let again = h.reconciler.merge_rule(&item("bold"), &target(), &rule).await.unwrap();

    assert!(!again.written);
    assert_eq!(again.owned.len(), 3);
    assert_eq!(h.live.writes().len(), 1);
}

#[tokio::test]
async fn unmerge_without_cache_does_nothing() {
    let h = harness();
    let rule = presets::bold_font_rule();
    h.live.user_set("editor.tokenColorCustomizations", with_rules(vec![rule.clone()]));

    let report = h.reconciler.unmerge_rule(&item("bold"), &target(), &rule).await.unwrap();

    assert!(!report.written);
    assert_eq!(rules(h.live.get("editor.tokenColorCustomizations")), [rule]);
}

#[tokio::test]
async fn scalar_composite_setting_is_a_shape_error() {
    let h = harness();
    h.live.user_set("editor.tokenColorCustomizations", "dark");

    let err = h
        .reconciler
        .merge_rule(&item("bold"), &target(), &presets::bold_font_rule())
        .await
        .unwrap_err();

    assert!(matches!(err, ReconcileError::Shape { .. }));
    assert!(h.cache.writes().is_empty());
}
