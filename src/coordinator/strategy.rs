//! Serving strategies.
//!
//! Navigation: network first, refresh the shell document, fall back to the
//! cached shell when offline. Static assets: cache first, revalidate in the
//! background. Every path resolves to a response; network failures become a
//! synthesized network-error response, never an `Err`.

use std::future::IntoFuture;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, warn};

use crate::cache::request::{Request, RequestKey};
use crate::cache::response::{is_cacheable, Response};
use crate::cache::store::SharedStorage;
use crate::metrics::CoordinatorMetrics;
use crate::network::fetcher::SharedFetcher;

/// How a background revalidation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevalidationOutcome {
    /// Fresh copy written over the cached entry.
    Stored,
    /// Network answered, but the response failed the cacheability predicate.
    Skipped,
    /// Network or store failure; the cached entry is unchanged.
    Failed,
}

impl RevalidationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevalidationOutcome::Stored => "stored",
            RevalidationOutcome::Skipped => "skipped",
            RevalidationOutcome::Failed => "failed",
        }
    }
}

/// A detached refresh of one cache entry.
///
/// The coordinator never polls this itself; the host spawns it and keeps the
/// handle until it settles.
pub struct Revalidation {
    key: RequestKey,
    task: BoxFuture<'static, RevalidationOutcome>,
}

impl Revalidation {
    pub fn key(&self) -> &RequestKey {
        &self.key
    }
}

impl IntoFuture for Revalidation {
    type Output = RevalidationOutcome;
    type IntoFuture = BoxFuture<'static, RevalidationOutcome>;

    fn into_future(self) -> Self::IntoFuture {
        self.task
    }
}

impl std::fmt::Debug for Revalidation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Revalidation").field("key", &self.key).finish()
    }
}

/// Everything a strategy needs, cheap to clone into background tasks.
#[derive(Clone)]
pub struct StrategyContext {
    pub storage: SharedStorage,
    pub fetcher: SharedFetcher,
    pub generation: Arc<str>,
    pub shell_key: RequestKey,
    pub metrics: Arc<CoordinatorMetrics>,
}

impl StrategyContext {
    /// Look up `key` in the current generation. Store errors count as a miss.
    async fn lookup(&self, key: &RequestKey) -> Option<Response> {
        let cache = match self.storage.open(&self.generation).await {
            Ok(cache) => cache,
            Err(e) => {
                warn!(generation = %self.generation, error = %e, "Failed to open generation");
                return None;
            }
        };
        match cache.get(key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(generation = %self.generation, key = %key, error = %e, "Cache lookup failed");
                None
            }
        }
    }

    /// Write `response` under `key`. Returns whether the write landed.
    async fn store(&self, key: RequestKey, response: Response) -> bool {
        let cache = match self.storage.open(&self.generation).await {
            Ok(cache) => cache,
            Err(e) => {
                warn!(generation = %self.generation, error = %e, "Failed to open generation");
                return false;
            }
        };
        let key_text = key.to_string();
        match cache.put(key, response).await {
            Ok(()) => true,
            Err(e) => {
                warn!(generation = %self.generation, key = %key_text, error = %e, "Cache write failed");
                false
            }
        }
    }

    /// Network first; on success refresh the shell document, on failure serve it.
    pub async fn navigation(&self, request: &Request) -> Response {
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                // The shell is refreshed whatever the status: it is the document itself.
                self.store(self.shell_key.clone(), response.clone()).await;
                response
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "Navigation fetch failed, trying cached shell");
                match self.lookup(&self.shell_key).await {
                    Some(shell) => {
                        self.metrics.record_navigation_fallback(true);
                        shell
                    }
                    None => {
                        warn!(url = %request.url, "Offline with no cached shell");
                        self.metrics.record_navigation_fallback(false);
                        self.metrics.record_network_error();
                        Response::network_error()
                    }
                }
            }
        }
    }

    /// Cache first. A hit comes back with a revalidation task for the host to run.
    pub async fn static_asset(&self, request: &Request) -> (Response, Option<Revalidation>) {
        let key = request.key();

        if let Some(cached) = self.lookup(&key).await {
            self.metrics.record_lookup(true);
            let revalidation = self.revalidation(request.clone(), key);
            return (cached, Some(revalidation));
        }
        self.metrics.record_lookup(false);

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if is_cacheable(Some(&response)) {
                    self.store(key, response.clone()).await;
                }
                (response, None)
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "Static fetch failed with nothing cached");
                self.metrics.record_network_error();
                (Response::network_error(), None)
            }
        }
    }

    fn revalidation(&self, request: Request, key: RequestKey) -> Revalidation {
        let ctx = self.clone();
        let task_key = key.clone();

        // Failures end here: nothing about them reaches the requester.
        let task = async move {
            let outcome = match ctx.fetcher.fetch(&request).await {
                Ok(fresh) if is_cacheable(Some(&fresh)) => {
                    if ctx.store(task_key.clone(), fresh).await {
                        RevalidationOutcome::Stored
                    } else {
                        RevalidationOutcome::Failed
                    }
                }
                Ok(fresh) => {
                    debug!(key = %task_key, status = fresh.status, "Revalidation response not cacheable");
                    RevalidationOutcome::Skipped
                }
                Err(e) => {
                    debug!(key = %task_key, error = %e, "Revalidation failed");
                    RevalidationOutcome::Failed
                }
            };
            ctx.metrics.record_revalidation(outcome.as_str());
            outcome
        }
        .boxed();

        Revalidation { key, task }
    }
}
