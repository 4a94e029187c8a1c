//! The cache coordinator.
//!
//! Three entry points, invoked by whatever hosts the coordinator:
//! - [`Coordinator::on_install`]: provision the current generation
//! - [`Coordinator::on_activate`]: delete stale generations, claim clients
//! - [`Coordinator::on_request`]: classify and serve one request
//!
//! Submodules:
//! - [`lifecycle`]: provision / reconcile
//! - [`router`]: request classification
//! - [`strategy`]: navigation and static-asset strategies
//! - [`clients`]: client registry and claim signal

pub mod clients;
pub mod lifecycle;
pub mod router;
pub mod strategy;

use std::sync::Arc;

use tracing::{debug, info};
use url::Url;

use crate::cache::request::{Request, RequestKey};
use crate::cache::response::Response;
use crate::cache::store::SharedStorage;
use crate::config::Config;
use crate::error::{LifecycleError, SetupError};
use crate::metrics::CoordinatorMetrics;
use crate::network::fetcher::SharedFetcher;

use clients::ClientRegistry;
use lifecycle::{ProvisionReport, ReconcileReport};
use router::{classify, RequestClass};
use strategy::{Revalidation, StrategyContext};

/// A response supplied by the coordinator, preempting the network.
#[derive(Debug)]
pub struct Interception {
    pub response: Response,
    /// Detached refresh for the host to run; the response never waits on it.
    pub revalidation: Option<Revalidation>,
}

/// Request-interception policy engine bound to one generation.
pub struct Coordinator {
    prefix: String,
    generation: String,
    manifest: Vec<Url>,
    strategies: StrategyContext,
    clients: Arc<ClientRegistry>,
    metrics: Arc<CoordinatorMetrics>,
}

/// Thread-safe handle to the coordinator.
pub type SharedCoordinator = Arc<Coordinator>;

impl Coordinator {
    /// Build a coordinator for the generation named by `config`.
    pub fn new(config: &Config, storage: SharedStorage, fetcher: SharedFetcher) -> Result<Self, SetupError> {
        let manifest = config.resolve_manifest()?;
        let shell_key = RequestKey::get(&config.shell_url()?);
        let generation = config.generation_name();
        let metrics = Arc::new(CoordinatorMetrics::new()?);

        Ok(Self {
            prefix: config.cache.prefix.clone(),
            strategies: StrategyContext {
                storage,
                fetcher,
                generation: Arc::from(generation.as_str()),
                shell_key,
                metrics: metrics.clone(),
            },
            generation,
            manifest,
            clients: Arc::new(ClientRegistry::with_capacity(config.server.max_clients)),
            metrics,
        })
    }

    /// Name of the current generation.
    pub fn generation(&self) -> &str {
        &self.generation
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Resolved precache manifest.
    pub fn manifest(&self) -> &[Url] {
        &self.manifest
    }

    pub fn shell_key(&self) -> &RequestKey {
        &self.strategies.shell_key
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.strategies.storage
    }

    pub fn clients(&self) -> &Arc<ClientRegistry> {
        &self.clients
    }

    pub fn metrics(&self) -> &Arc<CoordinatorMetrics> {
        &self.metrics
    }

    /// Install: precache the manifest into the current generation.
    pub async fn on_install(&self) -> Result<ProvisionReport, LifecycleError> {
        lifecycle::provision(
            self.strategies.storage.as_ref(),
            self.strategies.fetcher.as_ref(),
            &self.generation,
            &self.manifest,
        )
        .await
    }

    /// Activate: drop stale generations, then take control of open clients.
    pub async fn on_activate(&self) -> Result<ReconcileReport, LifecycleError> {
        let deleted =
            lifecycle::reconcile(self.strategies.storage.as_ref(), &self.prefix, &self.generation).await?;
        let claimed = self.clients.claim(&self.generation).await;

        info!(generation = %self.generation, deleted = deleted.len(), claimed, "Activated");

        Ok(ReconcileReport {
            generation: self.generation.clone(),
            deleted,
            claimed,
        })
    }

    /// Serve one request. `None` means the request is not intercepted.
    pub async fn on_request(&self, request: Request) -> Option<Interception> {
        let class = classify(&request);
        self.metrics.record_route(class.as_str());
        debug!(method = %request.method, url = %request.url, mode = %request.mode, route = %class, "Routing request");

        match class {
            RequestClass::PassThrough => None,
            RequestClass::Navigation => Some(Interception {
                response: self.strategies.navigation(&request).await,
                revalidation: None,
            }),
            RequestClass::StaticAsset => {
                let (response, revalidation) = self.strategies.static_asset(&request).await;
                Some(Interception { response, revalidation })
            }
        }
    }
}
