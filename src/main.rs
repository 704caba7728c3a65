//! wattwatch Binary Entry Point
//!
//! Serves the telemetry API for every device log in the data directory.
//! Core functionality is provided by the `wattwatch` library crate.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wattwatch::{
    AppConfig,
    config::parse_duration,
    server::{AppState, create_router},
};

/// wattwatch - Electrical Telemetry Dashboard Backend
#[derive(Parser, Debug)]
#[command(name = "wattwatch", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (defaults are used if it does not exist)
    #[arg(
        short,
        long,
        default_value = "configs/config.yaml",
        env = "WATTWATCH_CONFIG"
    )]
    config: String,

    /// Server bind address (overrides config file)
    #[arg(long, env = "WATTWATCH_BIND")]
    bind: Option<String>,

    /// Server port (overrides config file)
    #[arg(long, env = "WATTWATCH_PORT")]
    port: Option<u16>,

    /// Directory of per-device CSV logs (overrides config file)
    #[arg(long, env = "WATTWATCH_DATA_DIR")]
    data_dir: Option<String>,

    /// Default price per kWh (overrides config file)
    #[arg(long, env = "WATTWATCH_UNIT_PRICE")]
    unit_price: Option<f64>,

    /// Refresh interval advertised to dashboards, e.g. "5s" (overrides config file)
    #[arg(long, env = "WATTWATCH_REFRESH_INTERVAL", value_parser = parse_duration)]
    refresh_interval: Option<Duration>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wattwatch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("wattwatch - Electrical Telemetry Aggregation");

    // Parse CLI arguments
    let cli = Cli::parse();

    let mut config = if std::path::Path::new(&cli.config).exists() {
        tracing::info!("Loading configuration from: {}", cli.config);
        AppConfig::load(&cli.config)?
    } else {
        tracing::warn!("Config file '{}' not found, using defaults", cli.config);
        AppConfig::default()
    };

    // Apply CLI/env overrides (CLI > ENV > config file)
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(dir) = cli.data_dir {
        config.data.dir = dir;
    }
    if let Some(price) = cli.unit_price {
        config.billing.unit_price = price;
    }
    if let Some(interval) = cli.refresh_interval {
        config.dashboard.refresh_interval = interval;
    }
    config.validate()?;

    tracing::info!(
        "Server: {}:{}, Data: {}, Price: {} {}/kWh, Window: {}",
        config.server.bind,
        config.server.port,
        config.data.dir,
        config.billing.unit_price,
        config.billing.currency,
        config.data.window_size,
    );

    let state = AppState::from_config(&config);
    match state.registry.list_devices() {
        Ok(devices) => tracing::info!("Found {} devices", devices.len()),
        Err(e) => tracing::warn!("Failed to list devices: {}", e),
    }

    // Build Axum router
    let app = create_router(state);

    // Parse bind address
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;

    tracing::info!("Web server listening on: http://{}", addr);
    tracing::info!("Press Ctrl+C to shutdown");

    // Start server with graceful shutdown
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Setup graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}
