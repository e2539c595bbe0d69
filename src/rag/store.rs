//! Corpus persistence behind the `VectorStore` trait.
//!
//! The primary implementation is `SqliteVectorStore` in the `sqlite`
//! module; tests swap in whatever they need.

use async_trait::async_trait;

use crate::core::errors::IndexError;

/// A persisted corpus chunk.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    /// Stable id, unique across the corpus.
    pub chunk_id: String,
    /// Chunk text as it will reach the prompt.
    pub content: String,
    /// Where the text came from (URL or filename).
    pub source: String,
    /// Position of this chunk within its source.
    pub chunk_index: usize,
}

/// One search hit with its similarity score.
#[derive(Debug, Clone)]
pub struct ChunkSearchResult {
    pub chunk: StoredChunk,
    /// Cosine similarity (higher is closer).
    pub score: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Store one chunk with its embedding.
    async fn insert(&self, chunk: StoredChunk, embedding: Vec<f32>) -> Result<(), IndexError>;

    /// Insert multiple chunks in one transaction: either every item lands
    /// or none do. Returns the number inserted.
    async fn insert_batch(&self, items: Vec<(StoredChunk, Vec<f32>)>)
        -> Result<usize, IndexError>;

    /// Swap the whole corpus for `items`. Readers keep the old corpus
    /// until the swap commits; a failure leaves it untouched.
    async fn replace_all(&self, items: Vec<(StoredChunk, Vec<f32>)>) -> Result<usize, IndexError> {
        self.reset().await?;
        self.insert_batch(items).await
    }

    /// Chunks nearest the query embedding, best first, up to `limit`.
    /// Equal scores keep insertion order. Errors with `EmptyCorpus` when
    /// nothing is indexed.
    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkSearchResult>, IndexError>;

    /// Total chunk count.
    async fn count(&self) -> Result<usize, IndexError>;

    /// Discard every chunk. Idempotent.
    async fn reset(&self) -> Result<(), IndexError>;
}
