//! remasterd - AI mastering bridge daemon
//!
//! Registers local tracks, submits them to the remote mastering service,
//! polls job status in the background, and proxies mastered downloads.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use remaster_client::MasteringClient;
use remasterd::config::HostConfig;
use remasterd::services::scheduler::{self, TaskQueue};
use remasterd::AppState;

/// Command-line arguments for remasterd
#[derive(Parser, Debug)]
#[command(name = "remasterd")]
#[command(about = "Bridge daemon for a remote AI mastering service")]
#[command(version)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "REMASTER_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "REMASTER_PORT")]
    port: Option<u16>,

    /// SQLite database path (overrides the config file)
    #[arg(short, long, env = "REMASTER_DATABASE")]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "remasterd=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command-line arguments
    let args = Args::parse();

    let mut config = HostConfig::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(database) = args.database {
        config.database.path = database;
    }
    let config = Arc::new(config);

    info!("Starting remasterd on port {}", config.server.port);
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Mastering API: {}", config.api.base_url);
    if config.api.key.is_none() {
        tracing::warn!(
            "No mastering API key configured; submissions will fail until {} is set",
            remasterd::config::API_KEY_ENV
        );
    }

    // Open or create the database
    let db_pool = remasterd::db::init_database_pool(&config.database.path).await?;
    info!("Database: {}", config.database.path.display());

    // Client for the remote mastering service
    let client = MasteringClient::new(config.client_config())
        .context("Failed to build mastering client")?;

    // Background worker and poll ticker
    let (queue, task_rx) = TaskQueue::new(config.scheduler.queue_depth);
    let state = AppState::new(db_pool, client, queue, config.clone());

    scheduler::spawn_worker(state.clone(), task_rx);
    scheduler::spawn_poll_ticker(state.clone());
    info!(
        "Background worker started (poll interval: {}s)",
        config.scheduler.poll_interval_secs
    );

    // Build the application router
    let app = remasterd::build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .context("Invalid bind address")?;

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
