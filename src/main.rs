//! shell-cache: caching proxy for a single-page application.
//!
//! Installs and activates the current cache generation, then serves every
//! request through the coordinator, falling back to the origin for anything
//! it does not intercept.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use shell_cache::cache::codec::BodyCodec;
use shell_cache::cache::disk::DiskStorage;
use shell_cache::cache::store::{MemoryStorage, SharedStorage};
use shell_cache::config::{Cli, Config, StorageBackend};
use shell_cache::coordinator::Coordinator;
use shell_cache::host::WorkerHost;
use shell_cache::network::fetcher::{HttpFetcher, SharedFetcher};
use shell_cache::server::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "shell_cache=debug,tower_http=debug"
    } else {
        "shell_cache=info,tower_http=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("shell-cache v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let mut config = Config::load(&cli.config)?;
    config.apply_cli(&cli);
    let origin = config.origin_url()?;

    info!(
        origin = %origin,
        generation = %config.generation_name(),
        manifest = config.cache.manifest.len(),
        storage = ?config.cache.storage,
        "Configuration loaded"
    );

    let storage: SharedStorage = match config.cache.storage {
        StorageBackend::Memory => Arc::new(MemoryStorage::new()),
        StorageBackend::Disk => Arc::new(
            DiskStorage::new(
                config.cache.storage_path.clone(),
                BodyCodec::from_config(&config.cache),
            )
            .await?,
        ),
    };
    let fetcher: SharedFetcher = Arc::new(HttpFetcher::new(origin.clone(), &config.network)?);

    // Install and activate before accepting any request.
    let coordinator = Arc::new(Coordinator::new(&config, storage, fetcher.clone())?);
    let host = Arc::new(WorkerHost::new(coordinator));
    host.start().await?;

    let state = Arc::new(AppState {
        host: host.clone(),
        fetcher,
        origin,
        start_time: Instant::now(),
    });
    let app = build_router(state);

    let listen_addr = config.server.listen.clone();
    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await?;

    let settled = host.drain(config.server.shutdown_grace()).await;
    info!(settled, "Background tasks drained");

    Ok(())
}
