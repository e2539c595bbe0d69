use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::provider::LlmProvider;
use super::types::ChatRequest;
use crate::core::errors::ApiError;

/// Client for any OpenAI-compatible HTTP endpoint (llama.cpp server,
/// LM Studio, Groq, and friends).
#[derive(Clone)]
pub struct OpenAiCompatProvider {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl OpenAiCompatProvider {
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build LLM HTTP client")?;
        let base_url = base_url.trim_end_matches('/').to_owned();

        Ok(Self {
            base_url,
            api_key,
            client,
        })
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.post(url);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        req
    }
}

/// Drains the response body into an error that keeps the status and
/// whatever the server said.
async fn failure(what: &str, res: reqwest::Response) -> ApiError {
    let status = res.status();
    let detail = res.text().await.unwrap_or_default();
    ApiError::Internal(format!("{} error ({}): {}", what, status, detail))
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        "openai-compat"
    }

    async fn health_check(&self) -> Result<bool, ApiError> {
        let url = format!("{}/v1/models", self.base_url);
        let mut req = self.client.get(&url);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        Ok(req
            .send()
            .await
            .map(|res| res.status().is_success())
            .unwrap_or(false))
    }

    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, ApiError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut body = json!({
            "model": model_id,
            "messages": request.messages,
            "stream": false,
        });
        if let Some(t) = request.temperature {
            body["temperature"] = json!(t);
        }
        if let Some(n) = request.max_tokens {
            body["max_tokens"] = json!(n);
        }

        let res = self
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::internal)?;
        if !res.status().is_success() {
            return Err(failure("chat completion", res).await);
        }

        let payload: Value = res.json().await.map_err(ApiError::internal)?;

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| ApiError::Internal("chat completion returned no content".to_string()))
    }

    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({ "model": model_id, "input": inputs });

        let res = self
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::internal)?;
        if !res.status().is_success() {
            return Err(failure("embedding", res).await);
        }

        let payload: Value = res.json().await.map_err(ApiError::internal)?;
        let data = payload["data"]
            .as_array()
            .ok_or_else(|| ApiError::Internal("embedding response had no data array".to_string()))?;

        let mut embeddings = Vec::with_capacity(data.len());
        for item in data {
            let vals = item["embedding"].as_array().ok_or_else(|| {
                ApiError::Internal("embedding response item had no vector".to_string())
            })?;
            embeddings.push(
                vals.iter()
                    .filter_map(|v| v.as_f64())
                    .map(|f| f as f32)
                    .collect(),
            );
        }

        if embeddings.len() != inputs.len() {
            return Err(ApiError::Internal(format!(
                "embedding response had {} vectors for {} inputs",
                embeddings.len(),
                inputs.len()
            )));
        }

        Ok(embeddings)
    }
}
