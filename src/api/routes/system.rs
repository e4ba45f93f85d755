//! Health and metrics endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::api::AppState;
use crate::services::PROMETHEUS_CONTENT_TYPE;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route("/readiness", get(readiness))
        .route("/metrics", get(metrics))
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Email Assistant API is running" }))
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness() -> Json<Value> {
    Json(json!({ "status": "ready" }))
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        state.metrics.render(),
    )
}
