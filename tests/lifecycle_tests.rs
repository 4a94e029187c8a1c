//! Integration tests for install (provision) and activate (reconcile).

mod common;

use std::sync::Arc;

use shell_cache::cache::request::RequestKey;
use shell_cache::cache::response::Response;
use shell_cache::cache::store::{CacheStorage, MemoryStorage};
use shell_cache::error::LifecycleError;

use common::{coordinator, url, FlakyStorage, ScriptedFetcher};

async fn stored_keys(storage: &dyn CacheStorage, generation: &str) -> Vec<RequestKey> {
    storage.open(generation).await.unwrap().keys().await.unwrap()
}

#[tokio::test]
async fn test_install_tolerates_failing_entry() {
    let storage = Arc::new(MemoryStorage::new());
    let fetcher = ScriptedFetcher::new();
    fetcher.serve_shell();
    fetcher.fail(&url("./icon.svg"));

    let coordinator = coordinator(1, storage.clone(), fetcher);
    let report = coordinator.on_install().await.unwrap();

    assert!(report.skip_waiting);
    assert_eq!(report.stored.len(), 3);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].url, url("./icon.svg").to_string());

    let keys = stored_keys(storage.as_ref(), "aac-sandbox-v1").await;
    assert!(keys.contains(&RequestKey::get(&url("./"))));
    assert!(keys.contains(&RequestKey::get(&url("./index.html"))));
    assert!(keys.contains(&RequestKey::get(&url("./manifest.json"))));
    assert!(!keys.contains(&RequestKey::get(&url("./icon.svg"))));
}

#[tokio::test]
async fn test_install_with_everything_offline_still_succeeds() {
    let storage = Arc::new(MemoryStorage::new());
    let coordinator = coordinator(1, storage.clone(), ScriptedFetcher::new());

    let report = coordinator.on_install().await.unwrap();
    assert!(report.stored.is_empty());
    assert_eq!(report.failed.len(), 4);
    assert!(storage.has("aac-sandbox-v1").await.unwrap());
}

#[tokio::test]
async fn test_install_skips_error_statuses() {
    let storage = Arc::new(MemoryStorage::new());
    let fetcher = ScriptedFetcher::new();
    fetcher.serve_shell();
    fetcher.respond(&url("./manifest.json"), Response::basic(404, "missing"));

    let coordinator = coordinator(1, storage.clone(), fetcher);
    let report = coordinator.on_install().await.unwrap();

    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].reason.contains("404"));
    let keys = stored_keys(storage.as_ref(), "aac-sandbox-v1").await;
    assert!(!keys.contains(&RequestKey::get(&url("./manifest.json"))));
}

#[tokio::test]
async fn test_install_is_idempotent() {
    let storage = Arc::new(MemoryStorage::new());
    let fetcher = ScriptedFetcher::new();
    fetcher.serve_shell();
    fetcher.fail(&url("./icon.svg"));
    let coordinator = coordinator(1, storage.clone(), fetcher);

    coordinator.on_install().await.unwrap();
    let once = stored_keys(storage.as_ref(), "aac-sandbox-v1").await;
    coordinator.on_install().await.unwrap();
    let twice = stored_keys(storage.as_ref(), "aac-sandbox-v1").await;

    assert_eq!(once, twice);
    assert_eq!(storage.keys().await.unwrap(), vec!["aac-sandbox-v1".to_string()]);
}

#[tokio::test]
async fn test_install_fails_when_generation_cannot_open() {
    let storage = Arc::new(FlakyStorage::default());
    *storage.fail_open.lock().unwrap() = true;
    let fetcher = ScriptedFetcher::new();
    fetcher.serve_shell();

    let coordinator = coordinator(1, storage, fetcher);
    let err = coordinator.on_install().await.unwrap_err();
    assert!(matches!(err, LifecycleError::Open { ref name, .. } if name == "aac-sandbox-v1"));
}

#[tokio::test]
async fn test_activate_deletes_only_stale_generations_with_prefix() {
    let storage = Arc::new(MemoryStorage::new());
    storage.open("aac-sandbox-v1").await.unwrap();
    storage.open("aac-sandbox-v2").await.unwrap();
    storage.open("other-app-v1").await.unwrap();

    let fetcher = ScriptedFetcher::new();
    fetcher.serve_shell();
    let coordinator = coordinator(3, storage.clone(), fetcher);
    coordinator.on_install().await.unwrap();
    let report = coordinator.on_activate().await.unwrap();

    assert_eq!(report.generation, "aac-sandbox-v3");
    assert_eq!(report.deleted, vec!["aac-sandbox-v1", "aac-sandbox-v2"]);

    let remaining = storage.keys().await.unwrap();
    assert_eq!(remaining, vec!["aac-sandbox-v3", "other-app-v1"]);
    let current: Vec<&String> = remaining
        .iter()
        .filter(|n| n.starts_with("aac-sandbox-v"))
        .collect();
    assert_eq!(current, vec!["aac-sandbox-v3"]);
}

#[tokio::test]
async fn test_activate_claims_open_clients() {
    let storage = Arc::new(MemoryStorage::new());
    let coordinator = coordinator(2, storage, ScriptedFetcher::new());
    coordinator
        .clients()
        .register("tab-1", url("./").as_str())
        .await;

    let report = coordinator.on_activate().await.unwrap();
    assert_eq!(report.claimed, 1);
    let client = coordinator.clients().get("tab-1").await.unwrap();
    assert_eq!(client.controller.as_deref(), Some("aac-sandbox-v2"));
}

#[tokio::test]
async fn test_activate_fails_when_enumeration_fails() {
    let storage = Arc::new(FlakyStorage::default());
    *storage.fail_keys.lock().unwrap() = true;

    let coordinator = coordinator(2, storage, ScriptedFetcher::new());
    let err = coordinator.on_activate().await.unwrap_err();
    assert!(matches!(err, LifecycleError::Enumerate(_)));
    assert_eq!(coordinator.clients().active().await, None);
}

#[tokio::test]
async fn test_activate_fails_when_deletion_fails() {
    let storage = Arc::new(FlakyStorage::default());
    storage.inner.open("aac-sandbox-v1").await.unwrap();
    *storage.fail_delete.lock().unwrap() = true;

    let coordinator = coordinator(2, storage.clone(), ScriptedFetcher::new());
    let err = coordinator.on_activate().await.unwrap_err();
    assert!(matches!(err, LifecycleError::Delete { ref name, .. } if name == "aac-sandbox-v1"));
    assert!(storage.inner.has("aac-sandbox-v1").await.unwrap());
}
