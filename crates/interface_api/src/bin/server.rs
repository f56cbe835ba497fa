//! pageshare API server binary
//!
//! # Usage
//!
//! ```bash
//! API_DATABASE__WRITE_URL=postgres://... cargo run --bin pageshare-api
//! ```
//!
//! # Environment Variables
//!
//! * `API_HOST` - Server host (default: 0.0.0.0)
//! * `API_PORT` - Server port (default: 8080)
//! * `API_LOG_LEVEL` - Log level: trace, debug, info, warn, error (default: info)
//! * `API_DATABASE__WRITE_URL` - PostgreSQL connection string of the primary
//! * `API_DATABASE__READ_URL` - Replica connection string (default: the write URL)
//! * `API_DATABASE__SCHEMA` - Schema put on the search path (default: pageshare)
//! * `API_DATABASE__MAX_CONNECTIONS` - Pool size of each pool (default: 20)
//! * `API_DATABASE__DEBUG` - Log every statement (default: false)

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context as _;
use infra_db::Connection;
use interface_api::{config::ApiConfig, create_router};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Starts the server and, once it has drained, closes the database pools.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = ApiConfig::from_env().context("invalid configuration")?;

    init_tracing(&config.log_level);

    tracing::info!(
        host = %config.host,
        port = %config.port,
        "Starting pageshare API server"
    );

    let (read, write) = config.database.pool_configs();
    let connection = Arc::new(
        Connection::connect(&read, &write)
            .await
            .context("failed to connect to the database")?,
    );

    let app = create_router(Arc::clone(&connection), config.clone());

    let addr: SocketAddr = config.server_addr().parse()?;
    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    let closed = connection.close().await;
    if let Err(err) = &closed {
        tracing::error!(error = %err, "Failed to close database connection");
    }

    served?;
    closed?;
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
