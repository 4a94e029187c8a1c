//! Open client pages and the claim signal.
//!
//! A client is a page that has navigated through the proxy. Pages that load
//! while a generation is active are controlled by it immediately; pages that
//! loaded earlier stay uncontrolled until [`ClientRegistry::claim`].

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// A known client page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientInfo {
    pub id: String,
    /// Last URL the client navigated to.
    pub url: String,
    /// Generation controlling this client, if any.
    pub controller: Option<String>,
}

/// Default cap on tracked clients.
pub const DEFAULT_MAX_CLIENTS: usize = 1024;

#[derive(Debug, Default)]
struct Inner {
    active: Option<String>,
    clients: HashMap<String, Tracked>,
    /// Bumped on every registration; orders clients by recency.
    tick: u64,
}

#[derive(Debug)]
struct Tracked {
    info: ClientInfo,
    last_seen: u64,
}

/// Registry of client pages, bounded to the most recently seen `max_clients`.
#[derive(Debug)]
pub struct ClientRegistry {
    inner: RwLock<Inner>,
    max_clients: usize,
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_CLIENTS)
    }
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(max_clients: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            max_clients: max_clients.max(1),
        }
    }

    /// Record a navigation by `id` to `url`. Evicts the least recently seen
    /// client when a new id would exceed the cap.
    pub async fn register(&self, id: &str, url: &str) {
        let mut inner = self.inner.write().await;
        inner.tick += 1;
        let tick = inner.tick;

        if let Some(tracked) = inner.clients.get_mut(id) {
            tracked.info.url = url.to_string();
            tracked.last_seen = tick;
            return;
        }

        if inner.clients.len() >= self.max_clients {
            let oldest = inner
                .clients
                .iter()
                .min_by_key(|(_, t)| t.last_seen)
                .map(|(id, _)| id.clone());
            if let Some(oldest) = oldest {
                debug!(client = %oldest, "Client registry full, evicting least recent");
                inner.clients.remove(&oldest);
            }
        }

        let controller = inner.active.clone();
        inner.clients.insert(
            id.to_string(),
            Tracked {
                info: ClientInfo {
                    id: id.to_string(),
                    url: url.to_string(),
                    controller,
                },
                last_seen: tick,
            },
        );
    }

    pub async fn unregister(&self, id: &str) -> bool {
        self.inner.write().await.clients.remove(id).is_some()
    }

    /// Take control of every open client. Returns how many changed controller.
    pub async fn claim(&self, generation: &str) -> usize {
        let mut inner = self.inner.write().await;
        inner.active = Some(generation.to_string());

        let mut claimed = 0;
        for tracked in inner.clients.values_mut() {
            if tracked.info.controller.as_deref() != Some(generation) {
                tracked.info.controller = Some(generation.to_string());
                claimed += 1;
            }
        }

        info!(generation, claimed, total = inner.clients.len(), "Claimed clients");
        claimed
    }

    /// Generation that new clients are controlled by.
    pub async fn active(&self) -> Option<String> {
        self.inner.read().await.active.clone()
    }

    pub async fn get(&self, id: &str) -> Option<ClientInfo> {
        self.inner.read().await.clients.get(id).map(|t| t.info.clone())
    }

    pub async fn list(&self) -> Vec<ClientInfo> {
        let mut clients: Vec<ClientInfo> = self
            .inner
            .read()
            .await
            .clients
            .values()
            .map(|t| t.info.clone())
            .collect();
        clients.sort_by(|a, b| a.id.cmp(&b.id));
        clients
    }
}
