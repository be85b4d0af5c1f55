//! Background refresh loop
//!
//! Runs one refresh immediately, then one every `interval` after the previous
//! cycle finished. Stops when the shutdown channel fires or closes.

use crate::collector::MetricsCollector;
use crate::signals::ShutdownSignal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Spawn the refresh loop on the tokio runtime
pub fn spawn_refresh_task(
    collector: Arc<MetricsCollector>,
    interval: Duration,
    shutdown: broadcast::Receiver<ShutdownSignal>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        refresh_loop(collector, interval, shutdown).await;
    })
}

async fn refresh_loop(
    collector: Arc<MetricsCollector>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<ShutdownSignal>,
) {
    tracing::info!(
        interval_seconds = interval.as_secs(),
        "Metrics refresh loop started"
    );

    loop {
        // A cycle in progress is allowed to finish before shutdown is observed.
        let report = collector.refresh().await;
        if !report.all_succeeded() {
            tracing::warn!(
                failures = report.failures(),
                duration_ms = report.duration.as_millis() as u64,
                "Refresh cycle completed with failures"
            );
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.recv() => {
                tracing::info!("Metrics refresh loop stopping");
                break;
            }
        }
    }
}
