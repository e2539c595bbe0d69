use async_trait::async_trait;

use super::types::ChatRequest;
use crate::core::errors::ApiError;

/// The two model calls the pipeline needs, behind one seam so tests can
/// run without a live endpoint.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short provider label used in logs.
    fn name(&self) -> &str;

    /// True when the endpoint answers at all.
    async fn health_check(&self) -> Result<bool, ApiError>;

    /// Non-streaming chat completion against `model_id`.
    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, ApiError>;

    /// One embedding vector per input, in input order.
    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, ApiError>;
}
