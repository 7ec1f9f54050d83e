//! API route definitions.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::info;

use super::state::AppState;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/stop", post(stop))
}

fn meta() -> Value {
    json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    })
}

async fn health() -> Json<Value> {
    Json(json!({
        "data": {
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION")
        },
        "meta": meta()
    }))
}

async fn status(State(state): State<AppState>) -> Json<Value> {
    let load = state.load.sample();

    Json(json!({
        "data": {
            "run_id": state.run_id,
            "started_at": state.started_at.to_rfc3339(),
            "alive": state.heartbeat.is_alive(state.liveness_window),
            "stopping": state.stop.is_stopped(),
            "heartbeat": state.heartbeat.snapshot(),
            "host": state.host,
            "load": load
        },
        "meta": meta()
    }))
}

async fn stop(State(state): State<AppState>) -> Json<Value> {
    if !state.stop.is_stopped() {
        info!(run_id = %state.run_id, "stop requested over HTTP");
    }
    state.stop.stop();
    Json(json!({
        "data": { "stopping": true },
        "meta": meta()
    }))
}
