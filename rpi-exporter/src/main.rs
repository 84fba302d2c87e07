//! Prometheus exporter for Raspberry Pi throttling state and memcached statistics.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use rpi_exporter::{ExporterConfig, HttpServer, ScrapeCollector};

/// Prometheus exporter for Raspberry Pi and memcached health.
#[derive(Parser, Debug)]
#[command(name = "rpi-exporter")]
#[command(about = "Export Raspberry Pi throttling state and memcached statistics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// Log filter, e.g. `debug` or `rpi_exporter=trace`. Overrides `RUST_LOG` and config.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)?
    } else {
        ExporterConfig::default()
    };

    // Apply CLI overrides
    if let Some(listen) = args.listen {
        config.http.listen = listen;
    }
    config.validate()?;

    rpi_exporter_common::init_tracing(&config.logging, args.log_level.as_deref())?;

    info!("Starting Raspberry Pi exporter");
    info!(
        hardware = config.hardware.enabled,
        command = %config.hardware.command,
        memcached = config.memcached.enabled,
        address = %config.memcached.address,
        namespace = %config.collector.namespace,
        "Collector configured"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let collector = Arc::new(ScrapeCollector::from_config(&config));

    let listen_addr = config
        .http
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    let http_server = HttpServer::new(collector, listen_addr, config.http.path.clone());
    let stats = http_server.stats();

    let mut http_task = tokio::spawn(http_server.run(shutdown_rx));

    // The server is the only work; if it stops on its own, so does the process
    tokio::select! {
        result = &mut http_task => {
            let err = match result {
                Ok(Ok(())) => anyhow::anyhow!("HTTP server stopped unexpectedly"),
                Ok(Err(e)) => e,
                Err(e) => anyhow::anyhow!("HTTP server task failed: {}", e),
            };
            error!("HTTP server error: {}", err);
            return Err(err);
        }
        signal = wait_for_signal() => signal?,
    }

    // Signal shutdown
    shutdown_tx.send(true)?;

    let _ = tokio::time::timeout(Duration::from_secs(5), http_task).await;

    let stats = stats.read().clone();
    info!(scrapes_total = stats.scrapes_total, "Exporter stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn wait_for_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C, shutting down...");
    }

    Ok(())
}
