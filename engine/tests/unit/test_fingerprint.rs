//! Configuration fingerprint tests

use std::sync::Arc;

use shipyard::fingerprint::{self, ConfigFingerprinter};
use shipyard::storage::store::{ApplicationStore, MemoryStore};

use crate::support::application;

async fn setup() -> (ConfigFingerprinter, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    store.insert(application(serde_json::json!({}))).await;
    (ConfigFingerprinter::new(store.clone()), store)
}

#[tokio::test]
async fn test_first_run_then_unchanged_after_persist() {
    let (fingerprinter, store) = setup().await;
    let mut app = store.load_application("app-1").await.unwrap();

    assert!(fingerprinter.check(&mut app, 0, true).await.unwrap());
    assert!(!fingerprinter.check(&mut app, 0, true).await.unwrap());

    let stored = store.load_application("app-1").await.unwrap();
    assert_eq!(stored.config_hash, Some(fingerprint::fingerprint(&app, 0).unwrap()));
    assert!(!fingerprint::has_changed(&stored, 0).unwrap());
}

#[tokio::test]
async fn test_check_without_persist_writes_nothing() {
    let (fingerprinter, store) = setup().await;
    let mut app = store.load_application("app-1").await.unwrap();

    assert!(fingerprinter.check(&mut app, 0, false).await.unwrap());
    assert!(fingerprinter.check(&mut app, 0, false).await.unwrap());
    assert_eq!(app.config_hash, None);
    assert_eq!(store.load_application("app-1").await.unwrap().config_hash, None);
}

#[tokio::test]
async fn test_changed_field_is_detected_and_recorded() {
    let (fingerprinter, store) = setup().await;
    let mut app = store.load_application("app-1").await.unwrap();
    fingerprinter.check(&mut app, 0, true).await.unwrap();
    let first = app.config_hash.clone();

    app.ports_exposes = "8080".to_string();
    assert!(fingerprint::has_changed(&app, 0).unwrap());
    assert!(fingerprinter.check(&mut app, 0, true).await.unwrap());
    assert_ne!(app.config_hash, first);
    assert_eq!(store.load_application("app-1").await.unwrap().config_hash, app.config_hash);
}

#[tokio::test]
async fn test_preview_and_regular_builds_hash_differently() {
    let app = application(serde_json::json!({
        "environment_variables": [
            { "key": "API_URL", "value": "https://api.example.com" },
            { "key": "API_URL", "value": "https://preview.example.com", "is_preview": true }
        ]
    }));
    assert_ne!(
        fingerprint::fingerprint(&app, 0).unwrap(),
        fingerprint::fingerprint(&app, 12).unwrap()
    );
}
