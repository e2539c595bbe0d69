//! SQLite-backed vector store.
//!
//! In-process corpus persistence with brute-force cosine similarity for
//! search. Fine at research-corpus scale; swap the backend behind
//! `VectorStore` if the corpus ever outgrows it.

use std::path::PathBuf;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::store::{ChunkSearchResult, StoredChunk, VectorStore};
use crate::core::config::AppPaths;
use crate::core::errors::IndexError;

pub struct SqliteVectorStore {
    pool: SqlitePool,
}

fn backend_err<E: std::fmt::Display>(err: E) -> IndexError {
    IndexError::BackendUnavailable(err.to_string())
}

impl SqliteVectorStore {
    pub async fn new(paths: &AppPaths) -> Result<Self, IndexError> {
        Self::with_path(paths.db_path.clone()).await
    }

    pub async fn with_path(db_path: PathBuf) -> Result<Self, IndexError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(backend_err)?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), IndexError> {
        // `id` carries insertion order; equal-score search results come
        // back in this order.
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS corpus_chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chunk_id TEXT NOT NULL UNIQUE,
                content TEXT NOT NULL,
                source TEXT NOT NULL DEFAULT '',
                chunk_index INTEGER NOT NULL DEFAULT 0,
                embedding BLOB NOT NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(backend_err)?;

        Ok(())
    }

    fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
        let mut blob = Vec::with_capacity(embedding.len() * 4);
        for value in embedding {
            blob.extend_from_slice(&value.to_le_bytes());
        }
        blob
    }

    fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|quad| f32::from_le_bytes([quad[0], quad[1], quad[2], quad[3]]))
            .collect()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.is_empty() || a.len() != b.len() {
            return 0.0;
        }

        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;
        for (x, y) in a.iter().zip(b) {
            dot += x * y;
            norm_a += x * x;
            norm_b += y * y;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > f32::EPSILON {
            dot / denom
        } else {
            0.0
        }
    }

    fn chunk_from_row(row: &sqlx::sqlite::SqliteRow) -> StoredChunk {
        StoredChunk {
            chunk_id: row.get("chunk_id"),
            content: row.get("content"),
            source: row.get("source"),
            chunk_index: row.get::<i64, _>("chunk_index") as usize,
        }
    }
}

async fn insert_one(
    executor: &mut sqlx::SqliteConnection,
    chunk: &StoredChunk,
    embedding: &[f32],
) -> Result<(), IndexError> {
    let blob = SqliteVectorStore::encode_embedding(embedding);

    sqlx::query(
        "INSERT INTO corpus_chunks (chunk_id, content, source, chunk_index, embedding)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(&chunk.chunk_id)
    .bind(&chunk.content)
    .bind(&chunk.source)
    .bind(chunk.chunk_index as i64)
    .bind(&blob)
    .execute(executor)
    .await
    .map_err(backend_err)?;

    Ok(())
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn insert(&self, chunk: StoredChunk, embedding: Vec<f32>) -> Result<(), IndexError> {
        let mut conn = self.pool.acquire().await.map_err(backend_err)?;
        insert_one(&mut conn, &chunk, &embedding).await
    }

    async fn insert_batch(
        &self,
        items: Vec<(StoredChunk, Vec<f32>)>,
    ) -> Result<usize, IndexError> {
        if items.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(backend_err)?;
        for (chunk, embedding) in &items {
            insert_one(&mut tx, chunk, embedding).await?;
        }
        tx.commit().await.map_err(backend_err)?;

        Ok(items.len())
    }

    async fn replace_all(&self, items: Vec<(StoredChunk, Vec<f32>)>) -> Result<usize, IndexError> {
        let mut tx = self.pool.begin().await.map_err(backend_err)?;

        sqlx::query("DELETE FROM corpus_chunks")
            .execute(&mut *tx)
            .await
            .map_err(backend_err)?;

        for (chunk, embedding) in &items {
            insert_one(&mut tx, chunk, embedding).await?;
        }

        tx.commit().await.map_err(backend_err)?;
        Ok(items.len())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkSearchResult>, IndexError> {
        let rows = sqlx::query(
            "SELECT chunk_id, content, source, chunk_index, embedding
             FROM corpus_chunks
             ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend_err)?;

        if rows.is_empty() {
            return Err(IndexError::EmptyCorpus);
        }

        let mut scored: Vec<ChunkSearchResult> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let stored = Self::decode_embedding(&blob);

                ChunkSearchResult {
                    chunk: Self::chunk_from_row(row),
                    score: Self::cosine_similarity(query_embedding, &stored),
                }
            })
            .collect();

        // Stable sort: ties stay in insertion order.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit.max(1));

        Ok(scored)
    }

    async fn count(&self) -> Result<usize, IndexError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM corpus_chunks")
            .fetch_one(&self.pool)
            .await
            .map_err(backend_err)?;

        Ok(count as usize)
    }

    async fn reset(&self) -> Result<(), IndexError> {
        sqlx::query("DELETE FROM corpus_chunks")
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;

        Ok(())
    }
}
