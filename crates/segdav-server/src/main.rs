//! segdav server binary.
//!
//! Wires the protocol core to its collaborators: a blob store backend, a
//! lock store, the static resource registry, and the axum transport.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use clap::Parser;
use segdav_core::{
    BlobStore, Dispatcher, LockManager, LockStore, PutIngestor, Resource, ResourceRegistry,
    StaticRegistry, UuidTokenSource,
};
use segdav_storage::{FileLockStore, LocalStore, MemoryLockStore, MemoryStore, RemoteKvStore};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod handlers;

use config::{Config, StoreBackend};
use handlers::{dav_handler, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();

    info!("Starting segdav-server v{}", env!("CARGO_PKG_VERSION"));
    info!("  Host: {}", config.host);
    info!("  Port: {}", config.port);
    info!("  Static root: {}", config.static_root.display());
    info!("  Lock policy: {} ({}s TTL)", config.lock_policy, config.lock_ttl_secs);

    let registry = load_registry(config.registry.as_deref())?;
    info!("  Registry: {} child resource(s)", registry.children().len());

    let blob_store: Arc<dyn BlobStore> = match config.store {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::Local => {
            let data_dir = config.effective_data_dir();
            info!("  Data dir: {}", data_dir.display());
            Arc::new(LocalStore::new(data_dir))
        }
        StoreBackend::Remote => {
            let url = config
                .remote_kv_url
                .clone()
                .context("--remote-kv-url is required with --store remote")?;
            info!("  Remote KV: {}", url);
            Arc::new(RemoteKvStore::new(url, config.remote_kv_token.clone()))
        }
    };
    info!("  Store: {}", blob_store.store_name());

    // Lock records follow the blob store's locality: files next to the
    // blobs for the local backend, in-process otherwise.
    let lock_store: Arc<dyn LockStore> = match config.store {
        StoreBackend::Local => Arc::new(FileLockStore::new(config.effective_data_dir())),
        _ => Arc::new(MemoryLockStore::new()),
    };

    let locks = LockManager::new(
        lock_store,
        Arc::new(UuidTokenSource),
        config.lock_policy.into(),
        Duration::from_secs(config.lock_ttl_secs),
    );
    let ingestor = PutIngestor::new(blob_store.clone(), config.effective_put_suffixes());
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(registry), locks, ingestor));

    let state = AppState {
        dispatcher,
        static_root: Arc::new(config.static_root.clone()),
    };

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    // Every method funnels through the fallback; there are no routed paths.
    let app = Router::new()
        .fallback(dav_handler)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Load the resource registry from a JSON file, or fall back to the
/// built-in default tree.
fn load_registry(path: Option<&Path>) -> anyhow::Result<StaticRegistry> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read registry file {}", path.display()))?;
            let resources: Vec<Resource> =
                serde_json::from_str(&raw).context("Failed to parse registry file")?;
            Ok(StaticRegistry::new(resources)?)
        }
        None => Ok(StaticRegistry::with_defaults()),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Received Ctrl+C, initiating shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
        info!("Received SIGTERM, initiating shutdown");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
