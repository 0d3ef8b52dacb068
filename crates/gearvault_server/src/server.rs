//! Router assembly and the serve loop.

use crate::config::{ServerConfig, HEALTH_ROUTE};
use crate::handler::{health, snapshot_endpoint, AppState};
use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::routing::{any, get};
use axum::Router;
use gearvault_core::{SnapshotBackend, SqliteSnapshotBackend};
use log::info;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Builds the router: the snapshot endpoint at `route` plus `/health`.
pub fn router(state: AppState, route: &str, max_body_bytes: usize) -> Router {
    Router::new()
        .route(route, any(snapshot_endpoint))
        .route(HEALTH_ROUTE, get(health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

/// Opens storage, binds the listener and serves until ctrl-c.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let location = config.storage_location()?;
    let backend = SqliteSnapshotBackend::open_inventory(
        &location,
        config.derive_order,
        config.restore_mode,
    )
    .with_context(|| format!("failed to open inventory storage at `{location}`"))?;

    info!(
        "event=server_start module=server status=start storage={location} tables={} mode={}",
        backend.registry().len(),
        backend.mode()
    );

    let backend: Arc<dyn SnapshotBackend> = Arc::new(backend);
    let app = router(
        AppState::new(backend),
        &config.route,
        config.max_body_bytes,
    );

    let bind_address = config.bind_address();
    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind `{bind_address}`"))?;

    info!(
        "event=server_start module=server status=ok addr={bind_address} route={}",
        config.route
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server loop failed")?;

    info!("event=server_stop module=server status=ok");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("event=server_stop module=server status=error error={err}");
    }
}
