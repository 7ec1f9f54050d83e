//! Status surface -- lets an orchestrator poll liveness and request a stop.

mod routes;
pub mod state;

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use self::state::AppState;

/// Build the application router with all API routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes())
        .fallback(fallback)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn fallback() -> (axum::http::StatusCode, &'static str) {
    (axum::http::StatusCode::NOT_FOUND, "not found")
}

/// Bind the status listener. Done before any worker starts so a taken port
/// fails the run up front.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind status listener on {addr}"))?;
    tracing::info!(addr = %listener.local_addr()?, "status API listening");
    Ok(listener)
}

/// Serve the status API on `listener` until the run's stop token fires.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let stop = state.stop.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            while !stop.is_stopped() {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        })
        .await?;
    Ok(())
}
