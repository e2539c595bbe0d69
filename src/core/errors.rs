use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

/// Failure while fetching or reading a single source. Ingestion records
/// these per source in the status trail and keeps going.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not reach source: {0}")]
    Unreachable(String),
    #[error("source produced no text")]
    EmptyContent,
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("could not extract text: {0}")]
    ExtractionFailed(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid chunking settings: {0}")]
    InvalidChunking(String),
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("vector store unavailable: {0}")]
    BackendUnavailable(String),
    #[error("vector store is empty")]
    EmptyCorpus,
}

#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("answer generation failed: {0}")]
    GenerationFailed(String),
}

/// Ingestion-level failure, raised after per-source errors have already
/// been absorbed into the status trail.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("no content could be loaded from the given sources")]
    NoContent,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error("embedding failed: {0}")]
    Embedding(String),
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("the corpus is empty")]
    CorpusEmpty,
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Answer(#[from] AnswerError),
    #[error("embedding failed: {0}")]
    Embedding(String),
}

/// Message shown when a query arrives before any successful ingestion.
pub const CORPUS_NOT_READY: &str =
    "Vector database is not initialized. Please process URLs or documents first.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::NoContent => ApiError::BadRequest(err.to_string()),
            IngestError::Config(e) => e.into(),
            IngestError::Index(IndexError::BackendUnavailable(detail)) => {
                ApiError::ServiceUnavailable(detail)
            }
            IngestError::Index(IndexError::EmptyCorpus) => {
                ApiError::BadRequest(CORPUS_NOT_READY.to_string())
            }
            IngestError::Embedding(_) => ApiError::internal(err),
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::CorpusEmpty | QueryError::Index(IndexError::EmptyCorpus) => {
                ApiError::BadRequest(CORPUS_NOT_READY.to_string())
            }
            QueryError::Index(IndexError::BackendUnavailable(detail)) => {
                ApiError::ServiceUnavailable(detail)
            }
            QueryError::Answer(_) | QueryError::Embedding(_) => ApiError::internal(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}
