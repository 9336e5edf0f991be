//! The Hadron config node.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::sync::broadcast;
use tracing_subscriber::prelude::*;

use hadron_confignode::executor::register_metrics;
use hadron_confignode::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Setup tracing/logging system.
    tracing_subscriber::registry()
        // Filter spans based on the RUST_LOG env var.
        .with(tracing_subscriber::EnvFilter::from_default_env())
        // Send a copy of all spans to stdout in compact form.
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(true)
        )
        // Install this registry as the global tracing registry.
        .try_init()
        .context("error initializing logging/tracing system")?;

    let cfg = Arc::new(Config::new()?);
    let metrics = if cfg.enable_metrics {
        let recorder = PrometheusBuilder::new().build();
        let handle = recorder.handle();
        metrics::set_boxed_recorder(Box::new(recorder)).context("error setting prometheus metrics recorder")?;
        register_metrics();
        Some(handle)
    } else {
        None
    };

    tracing::info!(
        storage_data_path = %cfg.storage_data_path,
        enable_metrics = %cfg.enable_metrics,
        metrics_port = %cfg.metrics_port,
        "starting Hadron config node",
    );
    let (shutdown_tx, _) = broadcast::channel(10);
    if let Err(err) = App::new(cfg, shutdown_tx, metrics).await?.spawn().await {
        tracing::error!(error = ?err);
    }

    // Ensure any pending output is flushed.
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();

    Ok(())
}
