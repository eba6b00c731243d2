//! Spillway: stream JSON lines into SQLite in bounded, concurrent batches.
//!
//! # Usage
//!
//! ```bash
//! spillway --db ./events.db load --table events --input events.jsonl --batch-size 200
//! spillway --db ./events.db query --table events --limit 10
//! ```
//!
//! Environment variables can also be used:
//! - `SPILLWAY_DB`: Path to the SQLite database
//! - `SPILLWAY_TABLE`: Table to load into or read from
//! - `SPILLWAY_BATCH_SIZE`, `SPILLWAY_CONCURRENT_REQUESTS`: Writer limits
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

use spillway::config::Config;
use spillway::observability::metrics::init_metrics_with_endpoint;
use spillway::observability::tracing::init_tracing;
use spillway::pipeline::run;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration from CLI arguments and environment
    let config = Config::parse_args();

    init_tracing(&config.log_level);
    init_metrics_with_endpoint(config.otel_endpoint.as_deref());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        wait_for_signal().await;
        let _ = shutdown_tx.send(true);
    });

    run(config, shutdown_rx).await?;

    tracing::debug!("Spillway exiting");
    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C).
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                if tokio::signal::ctrl_c().await.is_err() {
                    std::future::pending::<()>().await;
                }
                tracing::info!("Received SIGINT (Ctrl+C), initiating shutdown...");
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT (Ctrl+C), initiating shutdown...");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, initiating shutdown...");
    }
}
