//! Runtime configuration for shell-cache.
//!
//! Configuration is loaded from a JSON file or constructed programmatically.
//! The generation naming knobs, the precache manifest and the origin all live here.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::error::SetupError;

/// Prefix shared by every cache generation this application owns.
pub const CACHE_PREFIX: &str = "aac-sandbox-v";

/// Version of the currently deployed coordinator.
pub const CACHE_VERSION: u32 = 1;

/// The app-shell document refreshed by every successful navigation.
pub const SHELL_DOCUMENT: &str = "./index.html";

/// Application shell populated at install time.
pub const PRECACHE_MANIFEST: &[&str] = &["./", "./index.html", "./manifest.json", "./icon.svg"];

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "shell-cache", about = "Offline caching proxy for single-page apps")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// HTTP listen address (overrides the config file).
    #[arg(long)]
    pub listen: Option<String>,

    /// Application origin to proxy (overrides the config file).
    #[arg(long)]
    pub origin: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Proxy server configuration.
    pub server: ServerConfig,

    /// Cache generation and storage settings.
    pub cache: CacheConfig,

    /// Upstream network settings.
    pub network: NetworkConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g. "127.0.0.1:8080").
    pub listen: String,

    /// Most client pages tracked at once; the least recently seen are evicted.
    pub max_clients: usize,

    /// How long shutdown waits for background revalidations before aborting them.
    pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8080".to_string(),
            max_clients: 1024,
            shutdown_grace_secs: 10,
        }
    }
}

impl ServerConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Which `CacheStorage` implementation backs the generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Disk,
}

/// Cache generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Prefix shared by all generations of this application.
    pub prefix: String,

    /// Current generation version; bumping it supersedes older generations.
    pub version: u32,

    /// Same-origin relative paths precached at install.
    pub manifest: Vec<String>,

    /// Key under which navigations store the shell document.
    pub shell_document: String,

    /// Storage backend.
    pub storage: StorageBackend,

    /// Root directory for the disk backend.
    pub storage_path: PathBuf,

    /// Apply zstd compression to bodies written by the disk backend.
    pub compress_bodies: bool,

    /// zstd compression level (1-22).
    pub zstd_level: i32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: CACHE_PREFIX.to_string(),
            version: CACHE_VERSION,
            manifest: PRECACHE_MANIFEST.iter().map(|s| s.to_string()).collect(),
            shell_document: SHELL_DOCUMENT.to_string(),
            storage: StorageBackend::Memory,
            storage_path: PathBuf::from("/tmp/shell-cache"),
            compress_bodies: true,
            zstd_level: 3,
        }
    }
}

/// Upstream network settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Origin of the application; manifest entries resolve against it.
    pub origin: String,

    /// Per-request timeout in seconds. `None` waits indefinitely.
    pub request_timeout_secs: Option<u64>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            origin: "http://127.0.0.1:3000/".to_string(),
            request_timeout_secs: None,
        }
    }
}

impl NetworkConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }

    /// Apply command-line overrides on top of the loaded file.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(listen) = &cli.listen {
            self.server.listen = listen.clone();
        }
        if let Some(origin) = &cli.origin {
            self.network.origin = origin.clone();
        }
    }

    /// Name of the current generation: `<prefix><version>`.
    pub fn generation_name(&self) -> String {
        format!("{}{}", self.cache.prefix, self.cache.version)
    }

    /// Parse the configured origin. Only http(s) origins can be proxied.
    pub fn origin_url(&self) -> Result<Url, SetupError> {
        let origin = Url::parse(&self.network.origin).map_err(|source| SetupError::InvalidOrigin {
            origin: self.network.origin.clone(),
            source,
        })?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(SetupError::UnsupportedOrigin(self.network.origin.clone()));
        }
        Ok(origin)
    }

    /// Absolute URL of the shell document.
    pub fn shell_url(&self) -> Result<Url, SetupError> {
        let origin = self.origin_url()?;
        origin
            .join(&self.cache.shell_document)
            .map_err(|source| SetupError::InvalidManifestEntry {
                entry: self.cache.shell_document.clone(),
                source,
            })
    }

    /// Resolve manifest entries against the origin.
    ///
    /// Cross-origin entries are dropped with a warning: a single unreachable
    /// third-party asset must never be part of the install batch. Duplicates
    /// are kept once, in first-seen order.
    pub fn resolve_manifest(&self) -> Result<Vec<Url>, SetupError> {
        let origin = self.origin_url()?;
        let mut resolved: Vec<Url> = Vec::with_capacity(self.cache.manifest.len());

        for entry in &self.cache.manifest {
            let url = origin
                .join(entry)
                .map_err(|source| SetupError::InvalidManifestEntry {
                    entry: entry.clone(),
                    source,
                })?;

            if url.origin() != origin.origin() {
                warn!(entry = %entry, "Dropping cross-origin manifest entry");
                continue;
            }
            if !resolved.contains(&url) {
                resolved.push(url);
            }
        }

        Ok(resolved)
    }
}
