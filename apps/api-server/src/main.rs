//! # Ombor API
//!
//! HTTP server over the inventory database.
//!
//! ## Startup
//! ```text
//! .env ─► ServerConfig::load() ─► Database::new() (migrations)
//!                                        │
//!                          reconcile category counters
//!                                        │
//!                   axum::serve ─── Ctrl+C / SIGTERM ──► pool closed
//! ```

use std::future;

use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use api_server::config::ServerConfig;
use api_server::{build_router, AppState};
use ombor_db::{Database, DbConfig};

const DEFAULT_LOG_FILTER: &str = "api_server=info,ombor_db=info,tower_http=info";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine; the process environment still applies
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_target(true)
        .init();

    info!("Starting Ombor API server...");

    let config = ServerConfig::load()?;
    info!(
        addr = %config.addr(),
        database = %config.database_path,
        env = ?config.app_env,
        "Configuration loaded"
    );

    let db_config = if config.database_path == ":memory:" {
        DbConfig::in_memory()
    } else {
        DbConfig::new(&config.database_path).max_connections(config.db_max_connections)
    };
    let db = Database::new(db_config).await?;
    info!("Database ready");

    let corrections = db.categories().reconcile_product_counts().await?;
    if !corrections.is_empty() {
        warn!(fixed = corrections.len(), "Category product counters corrected");
    }

    let addr = config.addr();
    let app = build_router(AppState::new(db.clone(), config));

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
