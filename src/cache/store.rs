//! Cache store abstraction: named generations of request → response entries.
//!
//! The coordinator only ever talks to these traits. Each per-key `get`/`put`
//! is atomic from the caller's point of view; there is no cross-key locking.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::request::RequestKey;
use crate::cache::response::Response;
use crate::error::StoreError;

/// One cache generation.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Generation name.
    fn name(&self) -> &str;

    /// Look up an entry by exact identity.
    async fn get(&self, key: &RequestKey) -> Result<Option<Response>, StoreError>;

    /// Insert or overwrite an entry.
    async fn put(&self, key: RequestKey, response: Response) -> Result<(), StoreError>;

    /// All keys currently stored.
    async fn keys(&self) -> Result<Vec<RequestKey>, StoreError>;
}

/// The set of all generations.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a generation, creating it if it does not exist.
    async fn open(&self, name: &str) -> Result<Arc<dyn Cache>, StoreError>;

    /// Names of all existing generations.
    async fn keys(&self) -> Result<Vec<String>, StoreError>;

    /// Delete a generation. Returns `false` if it did not exist.
    async fn delete(&self, name: &str) -> Result<bool, StoreError>;

    async fn has(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.keys().await?.iter().any(|n| n == name))
    }
}

/// Shared handle to a storage backend.
pub type SharedStorage = Arc<dyn CacheStorage>;

/// In-process generation.
pub struct MemoryCache {
    name: String,
    entries: RwLock<HashMap<RequestKey, Response>>,
}

impl MemoryCache {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &RequestKey) -> Result<Option<Response>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: RequestKey, response: Response) -> Result<(), StoreError> {
        debug!(generation = %self.name, key = %key, size = response.body.len(), "Stored entry");
        self.entries.write().await.insert(key, response);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<RequestKey>, StoreError> {
        let mut keys: Vec<RequestKey> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// In-process storage. Contents do not survive a restart.
#[derive(Default)]
pub struct MemoryStorage {
    generations: RwLock<BTreeMap<String, Arc<MemoryCache>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn Cache>, StoreError> {
        if let Some(cache) = self.generations.read().await.get(name) {
            return Ok(cache.clone());
        }
        let mut generations = self.generations.write().await;
        let cache = generations
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryCache::new(name)))
            .clone();
        Ok(cache)
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.generations.read().await.keys().cloned().collect())
    }

    async fn delete(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.generations.write().await.remove(name).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn key(path: &str) -> RequestKey {
        RequestKey::get(&Url::parse("https://app.example/").unwrap().join(path).unwrap())
    }

    #[tokio::test]
    async fn test_open_creates_and_reuses_generation() {
        let storage = MemoryStorage::new();
        let a = storage.open("app-v1").await.unwrap();
        a.put(key("a.js"), Response::basic(200, "a")).await.unwrap();

        let again = storage.open("app-v1").await.unwrap();
        assert_eq!(again.name(), "app-v1");
        assert_eq!(
            again.get(&key("a.js")).await.unwrap(),
            Some(Response::basic(200, "a"))
        );
        assert_eq!(storage.keys().await.unwrap(), vec!["app-v1".to_string()]);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let storage = MemoryStorage::new();
        let cache = storage.open("app-v1").await.unwrap();
        cache.put(key("a.js"), Response::basic(200, "old")).await.unwrap();
        cache.put(key("a.js"), Response::basic(200, "new")).await.unwrap();

        let entry = cache.get(&key("a.js")).await.unwrap().unwrap();
        assert_eq!(entry.body.as_ref(), b"new");
        assert_eq!(cache.keys().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_generation() {
        let storage = MemoryStorage::new();
        storage.open("app-v1").await.unwrap();
        storage.open("app-v2").await.unwrap();

        assert!(storage.delete("app-v1").await.unwrap());
        assert!(!storage.delete("app-v1").await.unwrap());
        assert!(!storage.has("app-v1").await.unwrap());
        assert!(storage.has("app-v2").await.unwrap());
    }
}
