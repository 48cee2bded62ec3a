//! arrowgate - serves an in-memory table as length-prefixed Arrow IPC frames.

use arrowgate_core::Table;
use arrowgate_server::config::CONFIG_ENV;
use arrowgate_server::metrics::run_metrics_server;
use arrowgate_server::{Config, ConnectionDispatcher, Metrics, Server, ServerConfig, ServerState};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Defaults apply only when no file is named; anything that fails to load is fatal
    let config = Config::load().map_err(|e| {
        tracing::error!("Failed to load config: {}", e);
        e
    })?;
    match std::env::var(CONFIG_ENV) {
        Ok(path) => tracing::info!("Loaded config from {}", path),
        Err(_) => tracing::info!("Using default configuration"),
    }

    tracing::info!("Starting arrowgate server");
    tracing::info!("  Bind address: {}", config.network.bind_addr);
    tracing::info!(
        "  Serialization: batch_size={}, compression={}",
        config.serialization.batch_size,
        config.serialization.compression
    );

    let table = Table::sample(config.table.sample_rows);
    tracing::info!(
        "  Table: {} rows, columns {:?}",
        table.row_count(),
        table.column_names()
    );

    let state = ServerState::new(table, config.serialization.clone());
    let dispatcher = ConnectionDispatcher::new(Arc::new(state));

    let mut server_config = ServerConfig::new(config.network.bind_addr)
        .with_idle_timeout(config.network.idle_timeout())
        .with_max_line_bytes(config.network.max_line_bytes);
    server_config.max_connections = config.network.max_connections;

    let metrics = if config.metrics.enabled {
        let metrics = Arc::new(Metrics::new()?);
        server_config = server_config.with_metrics(metrics.clone());
        tracing::info!("  Metrics: enabled ({})", config.metrics.bind_addr);
        Some(metrics)
    } else {
        tracing::info!("  Metrics: disabled");
        None
    };

    let server = Arc::new(Server::new(server_config, dispatcher));

    let metrics_handle = metrics.map(|metrics| {
        let addr = config.metrics.bind_addr;
        let shutdown = server.subscribe_shutdown();
        tokio::spawn(async move {
            if let Err(e) = run_metrics_server(addr, metrics, shutdown).await {
                tracing::error!("Metrics server error: {}", e);
            }
        })
    });

    let shutdown_server = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal, stopping server...");
        shutdown_server.shutdown();
    });

    server.run().await?;

    if let Some(handle) = metrics_handle {
        let _ = handle.await;
    }

    tracing::info!("Server stopped");
    Ok(())
}
