//! Engine lifecycle: background indexing, events, typed handles, shutdown.

use loupe_core::{Engine, EngineEvent, LoupeConfig};
use loupe_indexer::ScanState;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

const BUTTON: &str = "src/Resources/app/administration/src/app/sw-button/index.js";

fn config(cache: &TempDir) -> LoupeConfig {
    LoupeConfig {
        cache_dir: Some(cache.path().to_path_buf()),
        workers: 2,
        ..Default::default()
    }
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[tokio::test]
async fn test_full_scan_emits_events() {
    let project = tempdir().unwrap();
    let cache = tempdir().unwrap();
    write(
        project.path(),
        BUTTON,
        "Component.register('sw-button', { props: { label: { type: String, required: true } } });",
    );

    let engine = Engine::open(project.path(), &config(&cache)).unwrap();
    assert!(engine.needs_rebuild());
    assert!(engine.cache_dir().starts_with(cache.path()));

    let mut events = engine.subscribe();
    let report = engine.spawn_index_all(true).await.unwrap().unwrap();
    assert_eq!(report.indexed, 1);

    assert_eq!(
        events.recv().await.unwrap(),
        EngineEvent::IndexingStarted { full: true }
    );
    match events.recv().await.unwrap() {
        EngineEvent::IndexingCompleted { full, report: done, .. } => {
            assert!(full);
            assert_eq!(done.indexed, 1);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    let button = engine.components().resolve_component("sw-button").unwrap().unwrap();
    assert_eq!(button.props[0].name, "label");
    assert_eq!(engine.scanner().tracked_count().unwrap(), 1);

    engine.shutdown().unwrap();
    assert_eq!(engine.scanner().state(), ScanState::Closed);
}

#[tokio::test]
async fn test_incremental_updates_and_removal() {
    let project = tempdir().unwrap();
    let cache = tempdir().unwrap();
    write(project.path(), "src/Resources/snippet/en_GB/a.json", r#"{"a": "1"}"#);

    let engine = Engine::open(project.path(), &config(&cache)).unwrap();
    engine.spawn_index_all(false).await.unwrap().unwrap();
    assert_eq!(engine.snippets().get_storefront_keys().unwrap(), vec!["a"]);

    let path = engine.root().join("src/Resources/snippet/en_GB/a.json");
    fs::write(&path, r#"{"b": "2"}"#).unwrap();
    let report = engine
        .spawn_index_files(vec![path.clone()])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.indexed, 1);
    assert_eq!(engine.snippets().get_storefront_keys().unwrap(), vec!["b"]);

    engine.spawn_remove_files(vec![path]).await.unwrap().unwrap();
    assert!(engine.snippets().get_storefront_keys().unwrap().is_empty());
    assert_eq!(engine.scanner().tracked_count().unwrap(), 0);

    engine.shutdown().unwrap();
}

#[tokio::test]
async fn test_reopen_keeps_index() {
    let project = tempdir().unwrap();
    let cache = tempdir().unwrap();
    write(project.path(), "theme/theme.json", r#"{"config": {"fields": {"c": {"type": "color"}}}}"#);

    {
        let engine = Engine::open(project.path(), &config(&cache)).unwrap();
        engine.spawn_index_all(false).await.unwrap().unwrap();
        engine.shutdown().unwrap();
    }

    let engine = Engine::open(project.path(), &config(&cache)).unwrap();
    assert!(!engine.needs_rebuild());
    assert_eq!(engine.theme().get_field_keys().unwrap(), vec!["c"]);

    let report = engine.spawn_index_all(false).await.unwrap().unwrap();
    assert_eq!(report.indexed, 0);
    assert_eq!(report.unchanged, 1);
    engine.shutdown().unwrap();
}

#[tokio::test]
async fn test_operations_after_shutdown_fail() {
    let project = tempdir().unwrap();
    let cache = tempdir().unwrap();
    let engine = Engine::open(project.path(), &config(&cache)).unwrap();
    let mut events = engine.subscribe();
    engine.shutdown().unwrap();

    assert!(engine.spawn_index_all(false).await.unwrap().is_err());
    assert_eq!(
        events.recv().await.unwrap(),
        EngineEvent::IndexingStarted { full: true }
    );
    assert!(matches!(
        events.recv().await.unwrap(),
        EngineEvent::IndexingFailed { full: true, .. }
    ));
}

#[tokio::test]
async fn test_app_manifest_and_config_are_queryable() {
    let project = tempdir().unwrap();
    let cache = tempdir().unwrap();
    write(
        project.path(),
        "custom/apps/ShopApp/manifest.xml",
        "<manifest><meta><name>ShopApp</name><version>1.0.0</version></meta></manifest>",
    );
    write(
        project.path(),
        "custom/apps/ShopApp/Resources/config/config.xml",
        r#"<config xsi:noNamespaceSchemaLocation="../../src/Core/System/SystemConfig/Schema/config.xsd">
    <card><input-field><name>token</name></input-field></card>
</config>"#,
    );

    let engine = Engine::open(project.path(), &config(&cache)).unwrap();
    engine.spawn_index_all(false).await.unwrap().unwrap();

    assert_eq!(engine.extensions().get_extension_names().unwrap(), vec!["ShopApp"]);
    assert_eq!(
        engine.system_config().get_entry_keys().unwrap(),
        vec!["ShopApp.token"]
    );
    engine.shutdown().unwrap();
}
