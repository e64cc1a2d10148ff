//! prefctl commands against real files

use indexmap::IndexMap;
use pref_cli::{execute, PrefConfig, Request};
use pref_reconcile::presets::{self, BOLD_COMPOSITE, EXPERIENCE_MODE};
use pref_value::{ItemId, SettingKey};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::path::Path;
use tempfile::TempDir;

fn config(dir: &TempDir) -> PrefConfig {
    PrefConfig {
        settings_path: dir.path().join("settings.json"),
        cache_path: dir.path().join("cache.json"),
        ..PrefConfig::default()
    }
}

async fn read_json(path: &Path) -> IndexMap<String, Value> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => serde_json::from_str(&text).unwrap(),
        Err(_) => IndexMap::new(),
    }
}

#[tokio::test]
async fn apply_writes_settings_and_cache_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    tokio::fs::write(&config.settings_path, r#"{"editor.smoothScrolling": false}"#)
        .await
        .unwrap();
    let controller = config.open().await.unwrap();

    let outcome = execute(
        &controller,
        Request::Apply {
            item: ItemId::new("mode"),
            bundle: "basic".into(),
        },
    )
    .await
    .unwrap();

    assert!(outcome.clean);
    let settings = read_json(&config.settings_path).await;
    assert_eq!(settings["editor.smoothScrolling"], json!(false));
    assert_eq!(settings["editor.scrollbar.verticalScrollbarSize"], json!(24));
    assert_eq!(settings.len(), presets::basic().len());

    let cache = read_json(&config.cache_path).await;
    let owned: Vec<(String, Value)> = serde_json::from_str(cache["mode"].as_str().unwrap()).unwrap();
    assert_eq!(owned.len(), presets::basic().len() - 1);
    assert!(owned.iter().all(|(key, _)| key != "editor.smoothScrolling"));
}

#[tokio::test]
async fn restore_after_reopen_removes_owned_settings() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);

    let controller = config.open().await.unwrap();
    execute(
        &controller,
        Request::Apply {
            item: ItemId::new("mode"),
            bundle: "advanced".into(),
        },
    )
    .await
    .unwrap();
    drop(controller);

    let controller = config.open().await.unwrap();
    let outcome = execute(&controller, Request::Restore { item: ItemId::new("mode") })
        .await
        .unwrap();

    assert!(outcome.clean);
    assert!(read_json(&config.settings_path).await.is_empty());
    assert!(read_json(&config.cache_path).await.is_empty());
}

#[tokio::test]
async fn toggle_follows_the_settings_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    tokio::fs::write(&config.settings_path, r#"{"comfort.experienceMode": "advance"}"#)
        .await
        .unwrap();
    let controller = config.open().await.unwrap();

    let outcome = execute(
        &controller,
        Request::Toggle {
            setting: SettingKey::new(EXPERIENCE_MODE),
        },
    )
    .await
    .unwrap();

    assert_eq!(outcome.lines.len(), 1);
    let settings = read_json(&config.settings_path).await;
    assert_eq!(settings["editor.minimap.enabled"], json!(false));
    assert_eq!(settings["comfort.experienceMode"], json!("advance"));
}

#[tokio::test]
async fn merge_and_show_report_owned_scope() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let controller = config.open().await.unwrap();
    let item = ItemId::new("bold");

    execute(
        &controller,
        Request::Merge {
            item: item.clone(),
            composite: BOLD_COMPOSITE.into(),
        },
    )
    .await
    .unwrap();
    let shown = execute(&controller, Request::Show { item: item.clone() }).await.unwrap();

    assert_eq!(shown.lines[0], "bold:");
    assert_eq!(shown.lines.len(), 4);
    assert!(shown.lines.contains(&"  scope constant".to_string()));

    execute(
        &controller,
        Request::Unmerge {
            item,
            composite: BOLD_COMPOSITE.into(),
        },
    )
    .await
    .unwrap();
    assert!(read_json(&config.settings_path).await.is_empty());
}

#[tokio::test]
async fn merge_keeps_hand_written_rules_in_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let foreign = json!({"name": "Foo", "scope": "comment", "settings": {"foreground": "#888"}, "comment": "mine"});
    let settings = json!({"editor.tokenColorCustomizations": {"textMateRules": [foreign.clone()]}});
    tokio::fs::write(&config.settings_path, settings.to_string()).await.unwrap();
    let controller = config.open().await.unwrap();

    let outcome = execute(
        &controller,
        Request::Merge {
            item: ItemId::new("bold"),
            composite: BOLD_COMPOSITE.into(),
        },
    )
    .await
    .unwrap();

    assert!(outcome.clean);
    let written = read_json(&config.settings_path).await;
    let rules = written["editor.tokenColorCustomizations"]["textMateRules"].as_array().unwrap();
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0], foreign);
    assert_eq!(rules[1]["name"], json!("Font Style: Bold"));
}

#[tokio::test]
async fn unknown_bundle_fails_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let controller = config.open().await.unwrap();

    let result = execute(
        &controller,
        Request::Apply {
            item: ItemId::new("mode"),
            bundle: "missing".into(),
        },
    )
    .await;

    assert!(result.is_err());
    assert!(!config.settings_path.exists());
}
