//! Postwatch Server - Main entry point

use std::net::SocketAddr;
use std::sync::Arc;

use postwatch_core::{
    api::{self, AppState},
    cache::ImageCache,
    collector::{Collector, CommandCollector, UnconfiguredCollector},
    config::Config,
    db::Database,
    jobs::{JobController, Scheduler},
    observability,
    store::PostStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = match std::env::var("POSTWATCH_CONFIG") {
        Ok(path) => Config::from_file(&path)?,
        Err(_) => Config::load()?,
    };

    // Initialize observability
    observability::init(&config.observability)?;
    let metrics = observability::install_metrics()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Postwatch Server"
    );

    // Storage
    let db = Database::connect(&config.database.url, config.database.max_connections).await?;
    db.init_schema().await?;

    let images = ImageCache::new(&config.images)?;
    images.ensure_dir().await?;
    tracing::info!(dir = %images.dir().display(), "Image cache ready");

    let store = PostStore::new(db, images, config.images.download_concurrency);

    // Collector
    let collector: Arc<dyn Collector> = match CommandCollector::from_config(&config.collector) {
        Some(collector) => Arc::new(collector),
        None => {
            tracing::warn!("No collector command configured; every run will fail");
            Arc::new(UnconfiguredCollector)
        }
    };

    let controller = Arc::new(JobController::new(collector, store));

    // Scheduler
    let scheduler = if config.scheduler.enabled {
        let scheduler = Scheduler::from_config(controller.clone(), &config.scheduler)?;
        Some(scheduler.start())
    } else {
        tracing::info!("In-process scheduler disabled");
        None
    };

    // Build router
    let state = AppState::new(controller.clone()).with_metrics(metrics);
    let app = api::build_router(state, &config.server.static_dir, &config.server.cors_origins);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!(address = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cleanup
    if let Some(scheduler) = scheduler {
        scheduler.stop().await;
    }
    if controller.is_running() {
        tracing::info!("Waiting for the in-flight run to finish");
    }
    controller.wait().await;
    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Wait for shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
