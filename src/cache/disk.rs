//! Persistent cache storage on local disk.
//!
//! Layout, one directory per generation:
//!
//! ```text
//! <root>/<generation>/index.json        request key → entry metadata
//! <root>/<generation>/<uuid>.body       entry body (optionally zstd)
//! ```
//!
//! The index is rewritten through a temp file and a rename, so a crash
//! mid-write leaves the previous index intact.

use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::codec::BodyCodec;
use crate::cache::request::RequestKey;
use crate::cache::response::{Response, ResponseType};
use crate::cache::store::{Cache, CacheStorage};
use crate::error::StoreError;

const INDEX_FILE: &str = "index.json";
const INDEX_TMP_FILE: &str = "index.json.tmp";

/// Metadata persisted for each entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    key: RequestKey,
    status: u16,
    response_type: ResponseType,
    url: Option<String>,
    headers: Vec<(String, String)>,
    file: String,
    compressed: bool,
}

/// One generation directory.
pub struct DiskCache {
    name: String,
    dir: PathBuf,
    codec: BodyCodec,
    index: RwLock<BTreeMap<RequestKey, IndexEntry>>,
}

impl DiskCache {
    async fn load(name: &str, dir: PathBuf, codec: BodyCodec) -> Result<Self, StoreError> {
        fs::create_dir_all(&dir).await?;

        let index_path = dir.join(INDEX_FILE);
        let index = match fs::read(&index_path).await {
            Ok(data) => {
                let entries: Vec<IndexEntry> =
                    serde_json::from_slice(&data).map_err(|source| StoreError::CorruptIndex {
                        path: index_path.clone(),
                        source,
                    })?;
                entries.into_iter().map(|e| (e.key.clone(), e)).collect()
            }
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        debug!(generation = name, entries = index.len(), "Loaded generation index");

        Ok(Self {
            name: name.to_string(),
            dir,
            codec,
            index: RwLock::new(index),
        })
    }

    async fn persist_index(&self, index: &BTreeMap<RequestKey, IndexEntry>) -> Result<(), StoreError> {
        let entries: Vec<&IndexEntry> = index.values().collect();
        let data = serde_json::to_vec_pretty(&entries).map_err(|source| StoreError::CorruptIndex {
            path: self.dir.join(INDEX_FILE),
            source,
        })?;

        let tmp = self.dir.join(INDEX_TMP_FILE);
        fs::write(&tmp, data).await?;
        fs::rename(&tmp, self.dir.join(INDEX_FILE)).await?;
        Ok(())
    }
}

#[async_trait]
impl Cache for DiskCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &RequestKey) -> Result<Option<Response>, StoreError> {
        // Held across the body read so a concurrent overwrite cannot unlink the file under us.
        let index = self.index.read().await;
        let Some(entry) = index.get(key) else {
            return Ok(None);
        };

        let path = self.dir.join(&entry.file);
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::MissingBody {
                    key: key.to_string(),
                    path,
                })
            }
            Err(e) => return Err(e.into()),
        };
        let body = self.codec.decode(&data, entry.compressed)?;

        Ok(Some(Response {
            status: entry.status,
            response_type: entry.response_type,
            url: entry.url.clone(),
            headers: entry.headers.clone(),
            body: Bytes::from(body),
        }))
    }

    async fn put(&self, key: RequestKey, response: Response) -> Result<(), StoreError> {
        let (data, compressed) = self.codec.encode(&response.body)?;
        let file = format!("{}.body", Uuid::new_v4());
        let body_path = self.dir.join(&file);

        let mut index = self.index.write().await;
        fs::write(&body_path, &data).await?;

        let entry = IndexEntry {
            key: key.clone(),
            status: response.status,
            response_type: response.response_type,
            url: response.url,
            headers: response.headers,
            file,
            compressed,
        };
        let replaced = index.insert(key.clone(), entry);
        if let Err(e) = self.persist_index(&index).await {
            // Keep memory and index.json in agreement; the new body is unreferenced.
            match replaced {
                Some(old) => index.insert(key, old),
                None => index.remove(&key),
            };
            if let Err(rm) = fs::remove_file(&body_path).await {
                warn!(generation = %self.name, path = %body_path.display(), error = %rm, "Failed to remove orphaned body");
            }
            return Err(e);
        }

        if let Some(old) = replaced {
            if let Err(e) = fs::remove_file(self.dir.join(&old.file)).await {
                warn!(generation = %self.name, file = %old.file, error = %e, "Failed to remove replaced body");
            }
        }

        debug!(
            generation = %self.name,
            key = %key,
            size = response.body.len(),
            stored = data.len(),
            compressed,
            "Wrote entry to disk"
        );
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<RequestKey>, StoreError> {
        Ok(self.index.read().await.keys().cloned().collect())
    }
}

/// Disk-backed storage rooted at a directory.
pub struct DiskStorage {
    root: PathBuf,
    codec: BodyCodec,
    open: RwLock<HashMap<String, Arc<DiskCache>>>,
}

impl DiskStorage {
    /// Create the storage, ensuring the root directory exists.
    pub async fn new(root: PathBuf, codec: BodyCodec) -> Result<Self, StoreError> {
        fs::create_dir_all(&root).await?;
        info!(root = %root.display(), compressed = codec.enabled(), "Disk cache storage ready");
        Ok(Self {
            root,
            codec,
            open: RwLock::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn generation_dir(&self, name: &str) -> Result<PathBuf, StoreError> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\', '\0']);
        if !valid {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn Cache>, StoreError> {
        let dir = self.generation_dir(name)?;
        if let Some(cache) = self.open.read().await.get(name) {
            return Ok(cache.clone());
        }

        let mut open = self.open.write().await;
        if let Some(cache) = open.get(name) {
            return Ok(cache.clone());
        }
        let cache = Arc::new(DiskCache::load(name, dir, self.codec.clone()).await?);
        open.insert(name.to_string(), cache.clone());
        Ok(cache)
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> Result<bool, StoreError> {
        let dir = self.generation_dir(name)?;
        let mut open = self.open.write().await;
        open.remove(name);

        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(generation = name, "Deleted generation directory");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
