use anyhow::Result;
use axum::{routing::get, Router};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    collector::MetricsCollector,
    config::Config,
    datasource::{MetricSource, PgDataSource},
    handlers,
    metrics::MetricRegistry,
    scheduler::spawn_refresh_task,
    signals::setup_signal_handlers,
};

/// Start the exporter
///
/// This function:
/// 1. Creates the registry and the (lazy) database pool
/// 2. Sets up signal handlers for graceful shutdown
/// 3. Spawns the refresh loop
/// 4. Serves /metrics and /health until shutdown
pub async fn start_server(config: Config) -> Result<()> {
    let registry = Arc::new(MetricRegistry::new());
    let source: Arc<dyn MetricSource> = Arc::new(PgDataSource::connect(&config.database));
    let collector = Arc::new(MetricsCollector::new(
        source,
        registry.clone(),
        config.metrics.spend_window,
    ));

    let (shutdown_tx, signal_handle) = setup_signal_handlers();
    let mut shutdown_rx = shutdown_tx.subscribe();

    let refresh_handle = spawn_refresh_task(
        collector,
        Duration::from_secs(config.metrics.update_interval_seconds),
        shutdown_tx.subscribe(),
    );

    let app = create_router(registry);

    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    info!(
        spend_window = %config.metrics.spend_window,
        request_window = %config.metrics.request_window,
        error_window = %config.metrics.error_window,
        update_interval_seconds = config.metrics.update_interval_seconds,
        "Starting LiteLLM exporter on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("Shutdown signal received, draining connections...");
        })
        .await?;

    refresh_handle.await?;
    signal_handle.await?;
    info!("Exporter stopped gracefully");

    Ok(())
}

/// Create the Axum router with all routes and middleware
pub fn create_router(registry: Arc<MetricRegistry>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics_handler::metrics))
        .with_state(registry)
        .layer(TraceLayer::new_for_http())
}
