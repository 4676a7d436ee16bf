//! Cup-print backend server.
//!
//! Serves the health probe, the upstream JSON proxy, and the `/upload`
//! endpoint that runs the image pipeline.

mod api;
mod app;
mod config;
mod router;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app::SharedState;
use crate::config::ServerConfig;

/// How many ports above the configured one to try when it is taken.
const PORT_SCAN_RANGE: u16 = 100;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::load()?;
    info!(
        port = config.port,
        upstream = %config.upstream_base,
        "Starting print server"
    );

    let state = SharedState::new(config);
    let shutdown = state.shutdown_token().clone();

    let listener = bind_with_fallback(state.config().port).await?;
    let addr = listener.local_addr()?;
    info!("Print server listening on http://{addr}");

    let app = router::create_router(state);
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down...");
            shutdown_signal.cancel();
        }
    });

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}

/// Bind the preferred port, scanning upward when it is already in use
/// (mirrors the original backend's port probing).
async fn bind_with_fallback(port: u16) -> anyhow::Result<TcpListener> {
    for candidate in port..=port.saturating_add(PORT_SCAN_RANGE) {
        match TcpListener::bind(("0.0.0.0", candidate)).await {
            Ok(listener) => {
                if candidate != port {
                    warn!(port, candidate, "Configured port taken, using fallback");
                }
                return Ok(listener);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => continue,
            Err(e) => return Err(e.into()),
        }
    }
    anyhow::bail!(
        "no available port in {port}..={}",
        port.saturating_add(PORT_SCAN_RANGE)
    )
}
