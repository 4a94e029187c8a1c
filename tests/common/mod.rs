//! Shared fixtures: a scripted network and a storage that can be made to fail.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use url::Url;

use shell_cache::cache::request::Request;
use shell_cache::cache::response::Response;
use shell_cache::cache::store::{Cache, CacheStorage, MemoryStorage};
use shell_cache::config::Config;
use shell_cache::coordinator::Coordinator;
use shell_cache::error::{FetchError, StoreError};
use shell_cache::network::fetcher::Fetcher;

pub const ORIGIN: &str = "https://app.example/";

pub fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

pub fn test_config(version: u32) -> Config {
    let mut config = Config::default();
    config.network.origin = ORIGIN.to_string();
    config.cache.version = version;
    config
}

/// What the network does for one URL.
#[derive(Clone)]
pub enum Reply {
    Respond(Response),
    Fail,
    /// Never completes until the gate is opened, then responds.
    Gated(Arc<Notify>, Response),
}

/// In-process network with a per-URL script. Unscripted URLs fail.
#[derive(Default)]
pub struct ScriptedFetcher {
    replies: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, url: &Url, response: Response) {
        self.replies
            .lock()
            .unwrap()
            .insert(url.to_string(), Reply::Respond(response));
    }

    pub fn fail(&self, url: &Url) {
        self.replies.lock().unwrap().insert(url.to_string(), Reply::Fail);
    }

    pub fn gate(&self, url: &Url, response: Response) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.replies
            .lock()
            .unwrap()
            .insert(url.to_string(), Reply::Gated(gate.clone(), response));
        gate
    }

    /// Every shell entry answers 200 with its path as the body.
    pub fn serve_shell(&self) {
        for path in ["./", "./index.html", "./manifest.json", "./icon.svg"] {
            self.respond(&url(path), Response::basic(200, path.to_string()));
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, url: &Url) -> usize {
        self.calls().iter().filter(|c| *c == url.as_str()).count()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        self.calls.lock().unwrap().push(request.url.to_string());
        let reply = self.replies.lock().unwrap().get(request.url.as_str()).cloned();
        match reply {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Gated(gate, response)) => {
                gate.notified().await;
                Ok(response)
            }
            Some(Reply::Fail) | None => Err(FetchError::Network("offline".to_string())),
        }
    }
}

/// Memory storage whose enumeration, deletion or opening can be broken on demand.
#[derive(Default)]
pub struct FlakyStorage {
    pub inner: MemoryStorage,
    pub fail_open: Mutex<bool>,
    pub fail_keys: Mutex<bool>,
    pub fail_delete: Mutex<bool>,
}

fn broken() -> StoreError {
    StoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, "store unavailable"))
}

#[async_trait]
impl CacheStorage for FlakyStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn Cache>, StoreError> {
        if *self.fail_open.lock().unwrap() {
            return Err(broken());
        }
        self.inner.open(name).await
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        if *self.fail_keys.lock().unwrap() {
            return Err(broken());
        }
        self.inner.keys().await
    }

    async fn delete(&self, name: &str) -> Result<bool, StoreError> {
        if *self.fail_delete.lock().unwrap() {
            return Err(broken());
        }
        self.inner.delete(name).await
    }
}

/// Coordinator for `version` over fresh memory storage.
pub fn coordinator(
    version: u32,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<ScriptedFetcher>,
) -> Coordinator {
    Coordinator::new(&test_config(version), storage, fetcher).unwrap()
}
