use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn index() -> impl IntoResponse {
    Json(json!({
        "service": "research-assistant",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "GET /health",
            "POST /api/process-urls",
            "POST /api/process-documents",
            "POST /api/query"
        ]
    }))
}

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = state.pipeline.status().await;
    Json(json!({
        "status": "ok",
        "state": status.phase,
        "indexed_chunks": status.indexed_chunks,
        "last_ingest_at": status.last_ingest_at
    }))
}
