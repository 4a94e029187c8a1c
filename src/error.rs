//! Error types for the cache coordinator.
//!
//! Each concern gets its own enum; the binary collapses them into `anyhow`.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::host::WorkerState;

/// Failures of the cache store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid generation name: {0:?}")]
    InvalidName(String),

    #[error("Corrupt index at {path}: {source}")]
    CorruptIndex {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Body file missing for {key}: {path}")]
    MissingBody { key: String, path: PathBuf },

    #[error("Body codec failed: {0}")]
    Codec(std::io::Error),
}

/// Failures of the network fetch path.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network request failed: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Cross-origin response without CORS permission: {0}")]
    CorsRejected(String),

    #[error("Unsupported request: {0}")]
    Unsupported(String),
}

/// Failures of an install or activate transition.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Failed to open generation {name}: {source}")]
    Open {
        name: String,
        #[source]
        source: StoreError,
    },

    #[error("Failed to enumerate generations: {0}")]
    Enumerate(#[source] StoreError),

    #[error("Failed to delete generation {name}: {source}")]
    Delete {
        name: String,
        #[source]
        source: StoreError,
    },

    #[error("Invalid lifecycle transition: {from} -> {to}")]
    InvalidTransition { from: WorkerState, to: WorkerState },
}

/// Failures while assembling a coordinator from configuration.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Invalid origin {origin:?}: {source}")]
    InvalidOrigin {
        origin: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Origin must be http or https: {0}")]
    UnsupportedOrigin(String),

    #[error("Invalid manifest entry {entry:?}: {source}")]
    InvalidManifestEntry {
        entry: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Failed to register metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}
