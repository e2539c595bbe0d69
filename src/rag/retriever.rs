use std::sync::Arc;

use super::store::{ChunkSearchResult, VectorStore};
use crate::core::config::Settings;
use crate::core::errors::QueryError;
use crate::llm::LlmProvider;

/// Embeds the query text exactly once and delegates ranking to the store.
pub struct Retriever {
    store: Arc<dyn VectorStore>,
    provider: Arc<dyn LlmProvider>,
    embedding_model: String,
    top_k: usize,
}

impl Retriever {
    pub fn new(
        store: Arc<dyn VectorStore>,
        provider: Arc<dyn LlmProvider>,
        settings: &Settings,
    ) -> Self {
        Self {
            store,
            provider,
            embedding_model: settings.llm.embedding_model.clone(),
            top_k: settings.retrieval.top_k.max(1),
        }
    }

    pub async fn retrieve(&self, query: &str) -> Result<Vec<ChunkSearchResult>, QueryError> {
        // Check emptiness first so an empty corpus never costs an
        // embedding call.
        if self.store.count().await? == 0 {
            return Err(QueryError::CorpusEmpty);
        }

        let embeddings = self
            .provider
            .embed(&[query.to_string()], &self.embedding_model)
            .await
            .map_err(|e| QueryError::Embedding(e.to_string()))?;

        let query_embedding = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| QueryError::Embedding("provider returned no vector".to_string()))?;

        Ok(self.store.search(&query_embedding, self.top_k).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::MockProvider;
    use crate::rag::sqlite::SqliteVectorStore;
    use crate::rag::store::StoredChunk;

    async fn store_with(texts: &[(&str, &str)]) -> Arc<SqliteVectorStore> {
        let tmp = std::env::temp_dir().join(format!(
            "research-retriever-test-{}.db",
            uuid::Uuid::new_v4()
        ));
        let store = SqliteVectorStore::with_path(tmp).await.unwrap();
        for (i, (id, text)) in texts.iter().enumerate() {
            store
                .insert(
                    StoredChunk {
                        chunk_id: id.to_string(),
                        content: text.to_string(),
                        source: id.to_string(),
                        chunk_index: i,
                    },
                    MockProvider::embed_text(text),
                )
                .await
                .unwrap();
        }
        Arc::new(store)
    }

    fn retriever(store: Arc<SqliteVectorStore>, provider: MockProvider) -> Retriever {
        Retriever::new(store, Arc::new(provider), &Settings::default())
    }

    #[tokio::test]
    async fn empty_corpus_errors_before_embedding() {
        let store = store_with(&[]).await;
        // A failing embedder proves the order: the corpus check comes first.
        let r = retriever(store, MockProvider::failing_embed());
        assert!(matches!(
            r.retrieve("anything").await,
            Err(QueryError::CorpusEmpty)
        ));
    }

    #[tokio::test]
    async fn most_similar_chunk_ranks_first() {
        let store = store_with(&[
            ("fruit", "apples and bananas and oranges in the basket"),
            ("metal", "zinc cobalt quartz vivid symbols"),
        ])
        .await;
        let r = retriever(store, MockProvider::new());

        let results = r.retrieve("apples bananas oranges basket").await.unwrap();
        assert_eq!(results[0].chunk.chunk_id, "fruit");
    }

    #[tokio::test]
    async fn repeated_retrieval_is_identical() {
        let store = store_with(&[
            ("a", "shared words shared words"),
            ("b", "shared words shared words"),
            ("c", "entirely different content here"),
        ])
        .await;
        let r = retriever(store, MockProvider::new());

        let first: Vec<String> = r
            .retrieve("shared words")
            .await
            .unwrap()
            .into_iter()
            .map(|res| res.chunk.chunk_id)
            .collect();
        let second: Vec<String> = r
            .retrieve("shared words")
            .await
            .unwrap()
            .into_iter()
            .map(|res| res.chunk.chunk_id)
            .collect();

        assert_eq!(first, second);
        // The tied twins keep their insertion order.
        assert_eq!(&first[0..2], &["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn embed_failure_surfaces() {
        let store = store_with(&[("a", "content")]).await;
        let r = retriever(store, MockProvider::failing_embed());
        assert!(matches!(
            r.retrieve("query").await,
            Err(QueryError::Embedding(_))
        ));
    }
}
