//! swcache - cache-first caching gateway with versioned cache stores

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;

use config::{Config, LoggingConfig};
use swcache_api::{AppState, MetricsHandle, create_router};
use swcache_core::{CacheWorker, RegisterOutcome, Registration};
use swcache_proxy::HttpFetcher;
use swcache_storage::LocalCacheStorage;

/// swcache - serves fresh cached responses, refreshes stale ones
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml", env = "SWCACHE_CONFIG")]
    config: String,

    /// Bind address
    #[arg(long, env = "SWCACHE_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "SWCACHE_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;

    init_logging(&config.logging);

    info!("Starting swcache v{}", env!("CARGO_PKG_VERSION"));

    let metrics_handle = if config.metrics.enabled {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("Failed to install metrics recorder")?;
        Some(Arc::new(MetricsHandle::new(handle)))
    } else {
        None
    };

    // Initialize storage backend
    let storage = Arc::new(LocalCacheStorage::new(&config.storage.path).await?);

    // Initialize network fetcher
    let fetcher = Arc::new(HttpFetcher::new(config.upstream.to_fetcher_config())?);

    // Install and activate this version
    let worker_config = config.worker.to_worker_config()?;
    let scope = worker_config.scope.clone();
    let worker = Arc::new(CacheWorker::new(worker_config, storage, fetcher.clone())?);

    let registration = Arc::new(Registration::new());
    match registration.register(worker).await {
        Ok(RegisterOutcome::Activated { precached, pruned }) => {
            info!(
                "Cache worker active: {} entries precached, {} stale caches pruned",
                precached,
                pruned.deleted.len()
            );
            for (name, reason) in &pruned.failed {
                warn!("Stale cache {} was not pruned: {}", name, reason);
            }
        }
        Ok(RegisterOutcome::Unchanged) => {}
        Err(e) => {
            // Serve without offline capability rather than refusing to start
            error!("Cache worker failed to install, passing all requests through: {}", e);
        }
    }

    let state = AppState::new(registration, fetcher, scope.clone());

    let app = create_router(state, metrics_handle).layer(TraceLayer::new_for_http());

    // Determine bind address
    let bind_addr = args.bind.unwrap_or(config.server.bind_address);
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", bind_addr, port).parse()?;

    info!("Listening on {}", addr);
    info!("Origin: {}", scope);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Initialize logging
fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    info!("Shutdown signal received");
}
