use std::sync::Arc;

use super::store::ChunkSearchResult;
use crate::core::config::Settings;
use crate::core::errors::AnswerError;
use crate::llm::types::{ChatMessage, ChatRequest};
use crate::llm::LlmProvider;

/// A generated answer plus the source ids of the chunks that were actually
/// placed in the prompt, in order of first appearance, deduplicated.
#[derive(Debug, Clone)]
pub struct GeneratedAnswer {
    pub answer: String,
    pub sources: Vec<String>,
}

pub struct Answerer {
    provider: Arc<dyn LlmProvider>,
    chat_model: String,
    temperature: f64,
    max_tokens: u32,
    max_context_chars: usize,
}

impl Answerer {
    pub fn new(provider: Arc<dyn LlmProvider>, settings: &Settings) -> Self {
        Self {
            provider,
            chat_model: settings.llm.chat_model.clone(),
            temperature: settings.llm.temperature,
            max_tokens: settings.llm.max_tokens,
            max_context_chars: settings.retrieval.max_context_chars,
        }
    }

    pub async fn answer(
        &self,
        question: &str,
        results: &[ChunkSearchResult],
    ) -> Result<GeneratedAnswer, AnswerError> {
        let (context, sources) = self.build_context(results);

        let prompt = format!(
            "You are a helpful research assistant.\n\
             Answer the question using only the provided context.\n\
             If the answer is not contained in the context, reply:\n\
             \"I don't have enough information to answer this question.\"\n\
             \n\
             Context:\n\
             {context}\n\
             \n\
             Question: {question}\n\
             \n\
             Answer (concise):"
        );

        let request = ChatRequest {
            messages: vec![ChatMessage::user(prompt)],
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
        };

        let answer = self
            .provider
            .chat(request, &self.chat_model)
            .await
            .map_err(|e| AnswerError::GenerationFailed(e.to_string()))?;

        if answer.trim().is_empty() {
            return Err(AnswerError::GenerationFailed(
                "model returned an empty answer".to_string(),
            ));
        }

        Ok(GeneratedAnswer { answer, sources })
    }

    /// Concatenate chunk texts under the character budget, each tagged
    /// with its source id. The first chunk always goes in whole so the
    /// prompt is never context-free; later chunks that would blow the
    /// budget are dropped, and dropped chunks contribute no source id.
    fn build_context(&self, results: &[ChunkSearchResult]) -> (String, Vec<String>) {
        let mut context = String::new();
        let mut sources: Vec<String> = Vec::new();
        let mut used_chars = 0usize;

        for result in results {
            let chunk = &result.chunk;
            let block = format!("[Source: {}]\n{}", chunk.source, chunk.content);
            let block_chars = block.chars().count() + 2;

            if !context.is_empty() && used_chars + block_chars > self.max_context_chars {
                break;
            }

            if !context.is_empty() {
                context.push_str("\n\n");
            }
            context.push_str(&block);
            used_chars += block_chars;

            if !sources.iter().any(|s| s == &chunk.source) {
                sources.push(chunk.source.clone());
            }
        }

        (context, sources)
    }
}
