//! Chat Relay Server
//!
//! WebSocket front for the relay coordination core: participants
//! register over `/ws`, exchange text and file frames, and receive
//! roster updates and history replay.

pub mod config;
pub mod wire;
pub mod ws;

use std::future::IntoFuture;
use std::sync::Arc;

use anyhow::Context;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use config::{AppState, RelayConfig};
use relay_core::RelayService;
use ws::ws_handler;

pub async fn run() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();

    let config = RelayConfig::from_env();
    info!(data_dir = %config.data_dir.display(), "starting relay");

    let relay = Arc::new(
        RelayService::open(
            config.history_path(),
            config.blob_dir(),
            config.delivery_timeout,
        )
        .await
        .context("failed to open relay state")?,
    );
    info!(events = relay.history_len(), "history ready");

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_check))
        .with_state(AppState {
            relay: Arc::clone(&relay),
        })
        .layer(TraceLayer::new_for_http());

    // bind failure is the only fatal startup error
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!("relay listening on {}", config.listen_addr);

    tokio::select! {
        result = axum::serve(listener, app).into_future() => {
            result.context("server terminated")?;
        }
        _ = shutdown_signal() => {
            info!("shutdown signal received");
        }
    }

    // flush history once the endpoint is released; failure here is
    // logged, the process is exiting either way
    if let Err(e) = relay.persist().await {
        error!(error = %e, "failed to persist history at shutdown");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

async fn health_check() -> &'static str {
    "OK - Chat Relay Server"
}
