use std::sync::Mutex;

use async_trait::async_trait;

use super::provider::LlmProvider;
use super::types::ChatRequest;
use crate::core::errors::ApiError;

/// Deterministic in-process provider for tests. Embeddings are letter
/// histograms, so texts sharing vocabulary score high on cosine
/// similarity without any model in the loop.
pub struct MockProvider {
    pub canned_answer: Option<String>,
    pub fail_chat: bool,
    pub fail_embed: bool,
    pub chat_prompts: Mutex<Vec<String>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            canned_answer: None,
            fail_chat: false,
            fail_embed: false,
            chat_prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_answer(answer: &str) -> Self {
        Self {
            canned_answer: Some(answer.to_string()),
            ..Self::new()
        }
    }

    pub fn failing_chat() -> Self {
        Self {
            fail_chat: true,
            ..Self::new()
        }
    }

    pub fn failing_embed() -> Self {
        Self {
            fail_embed: true,
            ..Self::new()
        }
    }

    pub fn recorded_prompts(&self) -> Vec<String> {
        self.chat_prompts.lock().unwrap().clone()
    }

    pub fn embed_text(text: &str) -> Vec<f32> {
        let mut v = vec![0f32; 26];
        for c in text.chars() {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() {
                v[(c as u8 - b'a') as usize] += 1.0;
            }
        }
        v
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn health_check(&self) -> Result<bool, ApiError> {
        Ok(true)
    }

    async fn chat(&self, request: ChatRequest, _model_id: &str) -> Result<String, ApiError> {
        if self.fail_chat {
            return Err(ApiError::Internal("mock chat failure".to_string()));
        }

        let prompt = request
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.chat_prompts.lock().unwrap().push(prompt);

        Ok(self
            .canned_answer
            .clone()
            .unwrap_or_else(|| "mock answer".to_string()))
    }

    async fn embed(&self, inputs: &[String], _model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        if self.fail_embed {
            return Err(ApiError::Internal("mock embed failure".to_string()));
        }

        Ok(inputs.iter().map(|s| Self::embed_text(s)).collect())
    }
}
