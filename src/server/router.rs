use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::core::config::Settings;
use crate::server::handlers::{health, ingest, query};
use crate::state::AppState;

/// Uploads arrive as one multipart body. 25 MiB covers a handful of PDFs.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Creates the application router with all routes and middleware.
///
/// Sets up CORS, request tracing, the health endpoints and the three
/// pipeline endpoints (ingest URLs, ingest documents, query).
pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = build_cors_layer(&state.settings);
    Router::new()
        .route("/", get(health::index))
        .route("/health", get(health::health))
        .route("/api/process-urls", post(ingest::process_urls))
        .route("/api/process-documents", post(ingest::process_documents))
        .route("/api/query", post(query::query))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
}

fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let mut origins: Vec<HeaderValue> = settings
        .server
        .cors_allowed_origins
        .iter()
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| origin.parse().ok())
        .collect();
    if origins.is_empty() {
        origins = local_dev_origins();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE])
}

fn local_dev_origins() -> Vec<HeaderValue> {
    [
        "http://localhost",
        "http://localhost:3000",
        "http://localhost:8501",
        "http://127.0.0.1",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8501",
    ]
    .into_iter()
    .map(HeaderValue::from_static)
    .collect()
}
