//! Compose sync tests

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use shipyard::deploy::compose::{ComposeSyncOrchestrator, SyncMode};
use shipyard::deploy::git::GitImport;
use shipyard::errors::EngineError;
use shipyard::models::application::{Application, ServiceRouting};
use shipyard::storage::settings::Settings;
use shipyard::storage::store::{ApplicationStore, MemoryStore};

use crate::support::{application, FakeIssuer, FakeRunner, LineParser, TOKEN};

const COMPOSE: &str = "services:\n  web:\n    image: nginx\n  db:\n    image: postgres\n";

fn routed_application(extra: serde_json::Value) -> Application {
    let mut patch = serde_json::json!({
        "base_directory": "app",
        "docker_compose_raw": "services:\n  old:\n",
        "docker_compose_domains": {
            "web": { "domain": "https://web.example.com" },
            "old": { "domain": "https://old.example.com" }
        }
    });
    if let (Some(patch), Some(extra)) = (patch.as_object_mut(), extra.as_object()) {
        patch.extend(extra.clone());
    }
    application(patch)
}

async fn orchestrator(
    app: &Application,
    runner: Arc<FakeRunner>,
) -> (ComposeSyncOrchestrator, Arc<MemoryStore>) {
    let settings = Settings::default();
    let store = Arc::new(MemoryStore::new());
    store.insert(app.clone()).await;
    let orchestrator = ComposeSyncOrchestrator::new(
        &settings,
        GitImport::new(&settings, Arc::new(FakeIssuer::default())),
        runner,
        Arc::new(LineParser),
        store.clone(),
    );
    (orchestrator, store)
}

fn routing(names: &[&str]) -> BTreeMap<String, ServiceRouting> {
    names
        .iter()
        .map(|name| {
            (
                name.to_string(),
                ServiceRouting {
                    domain: Some(format!("https://{}.example.com", name)),
                },
            )
        })
        .collect()
}

#[tokio::test]
async fn test_sync_reconciles_routing() {
    let app = routed_application(serde_json::json!({}));
    let runner = Arc::new(FakeRunner::with_output(COMPOSE));
    let (orchestrator, store) = orchestrator(&app, runner.clone()).await;

    let synced = orchestrator.sync(&app, SyncMode::Refresh).await.unwrap();

    assert!(synced.fetched);
    assert_eq!(synced.services.service_names(), vec!["db", "web"]);
    assert_eq!(synced.routing, Some(routing(&["web"])));

    let stored = store.load_application("app-1").await.unwrap();
    assert_eq!(stored.docker_compose_raw.as_deref(), Some(COMPOSE));
    assert_eq!(stored.docker_compose_domains, Some(routing(&["web"])));
}

#[tokio::test]
async fn test_sync_runs_sparse_checkout_then_cleanup() {
    let app = routed_application(serde_json::json!({}));
    let runner = Arc::new(FakeRunner::with_output(COMPOSE));
    let (orchestrator, _) = orchestrator(&app, runner.clone()).await;

    orchestrator.sync(&app, SyncMode::Refresh).await.unwrap();

    let calls = runner.calls();
    assert_eq!(calls.len(), 2);

    let fetch = &calls[0];
    assert!(fetch.capture_output);
    assert_eq!(fetch.host, "edge-1");
    let workdir = fetch.masked[0]
        .strip_prefix("mkdir -p ")
        .and_then(|rest| rest.split(" && ").next())
        .unwrap()
        .to_string();
    assert!(workdir.starts_with("/tmp/"));
    assert_eq!(fetch.masked[0], format!("mkdir -p {} && cd {}", workdir, workdir));
    assert!(fetch.masked[1].ends_with("clone --no-checkout -b main acme/web ."));
    assert_eq!(
        &fetch.masked[2..],
        &[
            "git sparse-checkout init --cone".to_string(),
            "git sparse-checkout set ./app/docker-compose.yaml".to_string(),
            "git read-tree -mu HEAD".to_string(),
            "cat ./app/docker-compose.yaml".to_string(),
        ]
    );

    let cleanup = &calls[1];
    assert!(!cleanup.capture_output);
    assert_eq!(cleanup.masked, vec![format!("rm -rf {}", workdir)]);
}

#[tokio::test]
async fn test_concurrent_syncs_use_separate_directories() {
    let app = routed_application(serde_json::json!({}));
    let first = Arc::new(FakeRunner::with_output(COMPOSE));
    let second = Arc::new(FakeRunner::with_output(COMPOSE));
    let (a, _) = orchestrator(&app, first.clone()).await;
    let (b, _) = orchestrator(&app, second.clone()).await;

    let (left, right) = tokio::join!(a.sync(&app, SyncMode::Refresh), b.sync(&app, SyncMode::Refresh));
    left.unwrap();
    right.unwrap();

    assert_ne!(first.calls()[1].masked, second.calls()[1].masked);
}

#[tokio::test]
async fn test_empty_content_leaves_configuration_untouched() {
    let app = routed_application(serde_json::json!({}));
    let runner = Arc::new(FakeRunner::with_output("  \n"));
    let (orchestrator, store) = orchestrator(&app, runner.clone()).await;

    let err = orchestrator.sync(&app, SyncMode::Refresh).await.unwrap_err();

    assert!(matches!(err, EngineError::SourceFetchError(_)));
    assert!(err.is_recoverable());
    let stored = store.load_application("app-1").await.unwrap();
    assert_eq!(stored.docker_compose_raw, app.docker_compose_raw);
    assert_eq!(stored.docker_compose_domains, app.docker_compose_domains);
    assert_eq!(runner.calls().len(), 2);
}

#[tokio::test]
async fn test_transport_failure_still_cleans_up() {
    let app = routed_application(serde_json::json!({}));
    let runner = Arc::new(FakeRunner {
        transport_failure: true,
        ..Default::default()
    });
    let (orchestrator, _) = orchestrator(&app, runner.clone()).await;

    let err = orchestrator.sync(&app, SyncMode::Refresh).await.unwrap_err();

    assert!(matches!(err, EngineError::TransportError { .. }));
    let calls = runner.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[1].masked[0].starts_with("rm -rf /tmp/"));
}

#[tokio::test]
async fn test_cleanup_failure_is_ignored() {
    let app = routed_application(serde_json::json!({}));
    let runner = Arc::new(FakeRunner {
        output: COMPOSE.to_string(),
        fail_cleanup: true,
        ..Default::default()
    });
    let (orchestrator, _) = orchestrator(&app, runner).await;

    assert!(orchestrator.sync(&app, SyncMode::Refresh).await.is_ok());
}

#[tokio::test]
async fn test_parse_failure_persists_nothing() {
    let app = routed_application(serde_json::json!({}));
    let runner = Arc::new(FakeRunner::with_output("version: '3'\n"));
    let (orchestrator, store) = orchestrator(&app, runner).await;

    let err = orchestrator.sync(&app, SyncMode::Refresh).await.unwrap_err();

    assert!(matches!(err, EngineError::ComposeParseError(_)));
    let stored = store.load_application("app-1").await.unwrap();
    assert_eq!(stored.docker_compose_raw, app.docker_compose_raw);
}

#[tokio::test]
async fn test_fully_removed_routing_is_cleared() {
    let app = routed_application(serde_json::json!({}));
    let runner = Arc::new(FakeRunner::with_output("services:\n  api:\n"));
    let (orchestrator, store) = orchestrator(&app, runner).await;

    let synced = orchestrator.sync(&app, SyncMode::Refresh).await.unwrap();

    assert_eq!(synced.routing, None);
    let stored = store.load_application("app-1").await.unwrap();
    assert_eq!(stored.docker_compose_domains, None);
}

#[tokio::test]
async fn test_initial_sync_reuses_stored_content() {
    let app = routed_application(serde_json::json!({}));
    let runner = Arc::new(FakeRunner::with_output(COMPOSE));
    let (orchestrator, _) = orchestrator(&app, runner.clone()).await;

    let synced = orchestrator.sync(&app, SyncMode::Initial).await.unwrap();

    assert!(!synced.fetched);
    assert_eq!(synced.services.service_names(), vec!["old"]);
    assert_eq!(synced.routing, app.docker_compose_domains);
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_initial_sync_fetches_when_nothing_stored() {
    let app = routed_application(serde_json::json!({ "docker_compose_raw": null }));
    let runner = Arc::new(FakeRunner::with_output(COMPOSE));
    let (orchestrator, _) = orchestrator(&app, runner.clone()).await;

    let synced = orchestrator.sync(&app, SyncMode::Initial).await.unwrap();

    assert!(synced.fetched);
    assert_eq!(runner.calls().len(), 2);
}

#[tokio::test]
async fn test_private_source_token_is_masked() {
    let app = routed_application(serde_json::json!({
        "source": {
            "id": 5,
            "html_url": "https://github.com",
            "is_public": false,
            "app_id": 1,
            "installation_id": 2
        }
    }));
    let runner = Arc::new(FakeRunner::with_output(COMPOSE));
    let (orchestrator, _) = orchestrator(&app, runner.clone()).await;

    orchestrator.sync(&app, SyncMode::Refresh).await.unwrap();

    let fetch = &runner.calls()[0];
    assert!(fetch.exposed[1].contains(TOKEN));
    assert!(fetch.masked.iter().all(|c| !c.contains(TOKEN)));
}

#[tokio::test]
async fn test_missing_destination_fails_without_remote_calls() {
    let app = routed_application(serde_json::json!({ "destination": null }));
    let runner = Arc::new(FakeRunner::with_output(COMPOSE));
    let (orchestrator, _) = orchestrator(&app, runner.clone()).await;

    let err = orchestrator.sync(&app, SyncMode::Refresh).await.unwrap_err();

    assert!(matches!(err, EngineError::ConfigurationError(_)));
    assert!(runner.calls().is_empty());
}

/// Delegates to a memory store but refuses compose writes
struct ComposeWriteFails(Arc<MemoryStore>);

#[async_trait]
impl ApplicationStore for ComposeWriteFails {
    async fn load_application(&self, id: &str) -> Result<Application, EngineError> {
        self.0.load_application(id).await
    }

    async fn save_config_hash(&self, id: &str, hash: &str) -> Result<(), EngineError> {
        self.0.save_config_hash(id, hash).await
    }

    async fn save_compose(
        &self,
        _id: &str,
        _raw: &str,
        _domains: Option<&BTreeMap<String, ServiceRouting>>,
    ) -> Result<(), EngineError> {
        Err(EngineError::StorageError("disk full".to_string()))
    }

    async fn list_applications(&self) -> Result<Vec<String>, EngineError> {
        self.0.list_applications().await
    }
}

#[tokio::test]
async fn test_failed_write_keeps_content_and_routing_in_step() {
    let app = routed_application(serde_json::json!({}));
    let settings = Settings::default();
    let memory = Arc::new(MemoryStore::new());
    memory.insert(app.clone()).await;
    let orchestrator = ComposeSyncOrchestrator::new(
        &settings,
        GitImport::new(&settings, Arc::new(FakeIssuer::default())),
        Arc::new(FakeRunner::with_output(COMPOSE)),
        Arc::new(LineParser),
        Arc::new(ComposeWriteFails(memory.clone())),
    );

    let err = orchestrator.sync(&app, SyncMode::Refresh).await.unwrap_err();
    assert!(matches!(err, EngineError::StorageError(_)));

    let stored = memory.load_application("app-1").await.unwrap();
    assert_eq!(stored.docker_compose_raw.as_deref(), Some("services:\n  old:\n"));
    assert_eq!(stored.docker_compose_domains, Some(routing(&["old", "web"])));
}

#[tokio::test]
async fn test_sync_reads_branch_tip_of_pinned_application() {
    let app = routed_application(serde_json::json!({ "git_commit_sha": "4f2a9c1" }));
    let runner = Arc::new(FakeRunner::with_output(COMPOSE));
    let (orchestrator, _) = orchestrator(&app, runner.clone()).await;

    orchestrator.sync(&app, SyncMode::Refresh).await.unwrap();

    let fetch = &runner.calls()[0];
    assert!(fetch.masked[1].ends_with("clone --no-checkout -b main acme/web ."));
    assert!(fetch.masked.iter().all(|command| !command.contains("4f2a9c1")));
}
