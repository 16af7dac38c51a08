//! Hospital REST API server.
//!
//! Reads `HMS_*` settings from the environment (and `.env` when present),
//! opens the SQLite database and serves until Ctrl-C.

use std::net::SocketAddr;

use hms_api::{app, ApiConfig, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hms_api=info,hms_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ApiConfig::from_env()?;
    let addr = config.addr;
    tracing::info!(db = %config.db_path, "opening database");
    let state = AppState::open(config)?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("-- Starting HMS REST API on {}", addr);

    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
