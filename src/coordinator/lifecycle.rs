//! Generation lifecycle: provision at install, reconcile at activate.
//!
//! Provision is best effort per manifest entry: one unreachable asset must not
//! keep the shell from installing. Reconcile is all-or-nothing: any failure to
//! enumerate or delete a generation fails the activation.

use futures::future::{join_all, try_join_all};
use serde::Serialize;
use tracing::{info, warn};
use url::Url;

use crate::cache::request::{Request, RequestKey};
use crate::cache::store::CacheStorage;
use crate::error::LifecycleError;
use crate::network::fetcher::Fetcher;

/// A manifest entry that could not be precached.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionFailure {
    pub url: String,
    pub reason: String,
}

/// Outcome of an install.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionReport {
    pub generation: String,
    pub stored: Vec<RequestKey>,
    pub failed: Vec<ProvisionFailure>,
    /// Signal to the host: supersede any waiting instance without waiting
    /// for old clients to close.
    pub skip_waiting: bool,
}

/// Outcome of an activation.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub generation: String,
    pub deleted: Vec<String>,
    pub claimed: usize,
}

/// Populate `generation` with every manifest entry that can be fetched.
///
/// Entries are fetched concurrently. Transport failures and non-2xx statuses
/// are logged and skipped; the cacheability predicate is not consulted.
/// Failing to open the generation itself is fatal.
pub async fn provision(
    storage: &dyn CacheStorage,
    fetcher: &dyn Fetcher,
    generation: &str,
    manifest: &[Url],
) -> Result<ProvisionReport, LifecycleError> {
    let cache = storage
        .open(generation)
        .await
        .map_err(|source| LifecycleError::Open {
            name: generation.to_string(),
            source,
        })?;

    info!(generation, entries = manifest.len(), "Provisioning generation");

    let requests: Vec<Request> = manifest.iter().cloned().map(Request::get).collect();
    let fetched = join_all(requests.iter().map(|req| fetcher.fetch(req))).await;

    let mut stored = Vec::new();
    let mut failed = Vec::new();

    for (request, result) in requests.iter().zip(fetched) {
        let outcome = match result {
            Ok(response) if response.ok() => cache
                .put(request.key(), response)
                .await
                .map_err(|e| e.to_string()),
            Ok(response) => Err(format!("bad status {}", response.status)),
            Err(e) => Err(e.to_string()),
        };

        match outcome {
            Ok(()) => stored.push(request.key()),
            Err(reason) => {
                warn!(generation, url = %request.url, reason = %reason, "Failed to precache entry");
                failed.push(ProvisionFailure {
                    url: request.url.to_string(),
                    reason,
                });
            }
        }
    }

    info!(
        generation,
        stored = stored.len(),
        failed = failed.len(),
        "Provisioning complete"
    );

    Ok(ProvisionReport {
        generation: generation.to_string(),
        stored,
        failed,
        skip_waiting: true,
    })
}

/// Delete every generation that shares `prefix` but is not `current`.
///
/// Generations owned by other prefixes are left alone. Returns the deleted names.
pub async fn reconcile(
    storage: &dyn CacheStorage,
    prefix: &str,
    current: &str,
) -> Result<Vec<String>, LifecycleError> {
    let names = storage.keys().await.map_err(LifecycleError::Enumerate)?;

    let stale: Vec<String> = names
        .into_iter()
        .filter(|name| name.starts_with(prefix) && name != current)
        .collect();

    try_join_all(stale.iter().map(|name| async move {
        storage
            .delete(name)
            .await
            .map_err(|source| LifecycleError::Delete {
                name: name.clone(),
                source,
            })
    }))
    .await?;

    if !stale.is_empty() {
        info!(current, deleted = ?stale, "Deleted stale generations");
    }

    Ok(stale)
}
