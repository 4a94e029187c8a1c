//! HTTP server hosting the coordinator as a caching proxy.
//!
//! - [`proxy`]: maps incoming requests onto the origin and serves them
//! - [`inspect`]: health, generation, client and metrics endpoints

pub mod inspect;
pub mod proxy;

use std::sync::Arc;
use std::time::Instant;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;
use url::Url;

use crate::host::SharedHost;
use crate::network::fetcher::SharedFetcher;

/// Application state shared across handlers.
pub struct AppState {
    pub host: SharedHost,
    /// Used for requests the coordinator does not intercept.
    pub fetcher: SharedFetcher,
    pub origin: Url,
    pub start_time: Instant,
}

/// Build the axum router: inspection routes plus the proxy fallback.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/__shell-cache/health", get(inspect::health))
        .route("/__shell-cache/generations", get(inspect::generations))
        .route("/__shell-cache/clients", get(inspect::clients))
        .route("/__shell-cache/metrics", get(inspect::metrics))
        .fallback(proxy::proxy)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
