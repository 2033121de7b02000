//! Interception proxy - caching front for an application origin
//!
//! Provisions the app-shell cache at startup, then routes every request
//! through the cache engine before it reaches the upstream.

mod config;
mod error;
mod server;
mod types;

use crate::config::load_manifest;
use crate::error::Result;
use crate::server::{start_server, ServerState, SharedState};
use crate::types::{ProxyConfig, StoreBackend};
use intercept_cache::{
    CacheManager, CacheRouter, CacheStore, FileStore, HttpNetwork, MemoryStore, Network,
    Provisioner,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env()
        .add_directive("intercept_proxy=info".parse()?)
        .add_directive("intercept_cache=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting interception proxy...");

    let config = ProxyConfig::from_env()?;
    info!("Port: {}", config.port);
    info!("Upstream: {}", config.upstream);
    info!(
        shell = %config.namespaces.shell,
        media = %config.namespaces.media,
        shell_strategy = %config.router.shell_strategy,
        "Cache namespaces"
    );

    let store: Arc<dyn CacheStore> = match config.store_backend {
        StoreBackend::File => {
            info!("Cache dir: {:?}", config.cache_dir);
            let store = FileStore::new(config.cache_dir.clone());
            store.init().await?;
            Arc::new(store)
        }
        StoreBackend::Memory => {
            info!("Using in-memory cache store");
            Arc::new(MemoryStore::new())
        }
    };

    let network: Arc<dyn Network> = Arc::new(HttpNetwork::new());
    let manager = CacheManager::new(store, config.namespaces.clone(), config.upstream.clone());

    // Install step: the proxy does not start serving with a partial shell cache
    let manifest = load_manifest(config.manifest_path.as_deref()).await?;
    let provisioner = Provisioner::new(manager.clone(), network.clone());
    provisioner.provision(&manifest).await.map_err(|e| {
        error!(error = %e, "Shell cache provisioning failed");
        e
    })?;

    let router = CacheRouter::new(&config.router, manager, network.clone());
    let state: SharedState = Arc::new(ServerState::new(router, provisioner, manifest, network));

    // Start HTTP server (blocking)
    start_server(state, config.port).await?;

    Ok(())
}
