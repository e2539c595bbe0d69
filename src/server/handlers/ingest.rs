use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::rag::IngestReport;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ProcessUrlsRequest {
    pub urls: Vec<String>,
}

pub async fn process_urls(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ProcessUrlsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let urls = clean_entries(&payload.urls);
    if urls.is_empty() {
        return Err(ApiError::BadRequest(
            "At least one URL is required".to_string(),
        ));
    }

    let report = state.pipeline.ingest_urls(&urls).await?;
    Ok(report_response(report))
}

pub async fn process_documents(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart payload: {}", e)))?
    {
        if field.name() != Some("files") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let bytes = field.bytes().await.map_err(|e| {
            ApiError::BadRequest(format!("Failed to read upload {}: {}", filename, e))
        })?;
        files.push((filename, bytes.to_vec()));
    }

    if files.is_empty() {
        return Err(ApiError::BadRequest(
            "At least one file is required".to_string(),
        ));
    }

    let report = state.pipeline.ingest_documents(&files).await?;
    Ok(report_response(report))
}

/// Trims entries and drops blanks so `[""]` counts as an empty request.
fn clean_entries(raw: &[String]) -> Vec<String> {
    raw.iter()
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect()
}

fn report_response(report: IngestReport) -> Json<serde_json::Value> {
    Json(json!({
        "success": report.success,
        "message": report.message,
        "status_messages": report.status_messages
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_entries_trims_and_drops_blanks() {
        let raw = vec![
            "  https://example.com  ".to_string(),
            "".to_string(),
            "   ".to_string(),
        ];
        assert_eq!(clean_entries(&raw), vec!["https://example.com".to_string()]);
    }

    #[test]
    fn clean_entries_keeps_order() {
        let raw = vec!["b".to_string(), "a".to_string()];
        assert_eq!(clean_entries(&raw), vec!["b".to_string(), "a".to_string()]);
    }
}
