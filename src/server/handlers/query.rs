use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

pub async fn query(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<QueryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let question = payload.query.trim();
    if question.is_empty() {
        return Err(ApiError::BadRequest("Query cannot be empty".to_string()));
    }

    let generated = state.pipeline.query(question).await?;
    Ok(Json(json!({
        "answer": generated.answer,
        "sources": generated.sources
    })))
}
