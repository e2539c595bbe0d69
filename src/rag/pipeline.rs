use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::answerer::{Answerer, GeneratedAnswer};
use super::chunker::{Chunker, TextChunk};
use super::loader::{self, Source, SourceLoader};
use super::retriever::Retriever;
use super::store::{StoredChunk, VectorStore};
use crate::core::config::Settings;
use crate::core::errors::{IngestError, LoadError, QueryError};
use crate::llm::LlmProvider;

/// Inputs per embedding request during ingestion.
const EMBED_BATCH_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelinePhase {
    Idle,
    Ingesting,
    Ready,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub phase: PipelinePhase,
    pub indexed_chunks: usize,
    pub last_ingest_at: Option<DateTime<Utc>>,
}

/// Outcome of one ingestion call. `status_messages` carries one entry per
/// source plus the index-build stages, in order.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub success: bool,
    pub message: String,
    pub status_messages: Vec<String>,
    pub chunks_indexed: usize,
}

struct ControllerState {
    phase: PipelinePhase,
    last_ingest_at: Option<DateTime<Utc>>,
}

/// Orchestrates load -> chunk -> embed -> index and retrieve -> answer.
///
/// Ingestion holds the corpus lock exclusively for the whole
/// replace sequence; queries share it. The corpus itself only changes
/// through `replace_all`, so a failed ingestion leaves the previous
/// corpus intact and queryable.
pub struct Pipeline {
    loader: SourceLoader,
    chunker: Chunker,
    store: Arc<dyn VectorStore>,
    provider: Arc<dyn LlmProvider>,
    retriever: Retriever,
    answerer: Answerer,
    embedding_model: String,
    corpus_lock: RwLock<()>,
    state: Mutex<ControllerState>,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn VectorStore>,
        provider: Arc<dyn LlmProvider>,
        settings: &Settings,
    ) -> anyhow::Result<Self> {
        let loader = SourceLoader::new(&settings.loader)?;
        let chunker = Chunker::new(&settings.chunking)?;
        let retriever = Retriever::new(store.clone(), provider.clone(), settings);
        let answerer = Answerer::new(provider.clone(), settings);

        Ok(Self {
            loader,
            chunker,
            store,
            provider,
            retriever,
            answerer,
            embedding_model: settings.llm.embedding_model.clone(),
            corpus_lock: RwLock::new(()),
            state: Mutex::new(ControllerState {
                phase: PipelinePhase::Idle,
                last_ingest_at: None,
            }),
        })
    }

    /// Called once at startup. A corpus persisted by a previous run makes
    /// the service immediately ready.
    pub async fn restore_phase(&self) {
        if let Ok(count) = self.store.count().await {
            if count > 0 {
                self.set_phase(PipelinePhase::Ready).await;
            }
        }
    }

    pub async fn status(&self) -> PipelineStatus {
        let (phase, last_ingest_at) = {
            let state = self.state.lock().await;
            (state.phase, state.last_ingest_at)
        };
        let indexed_chunks = self.store.count().await.unwrap_or(0);

        PipelineStatus {
            phase,
            indexed_chunks,
            last_ingest_at,
        }
    }

    /// Fetch every URL, chunk and embed what loaded, and swap the corpus.
    /// One bad fetch is recorded in the trail and skipped; only a batch
    /// with zero usable sources comes back with `success: false`.
    pub async fn ingest_urls(&self, urls: &[String]) -> Result<IngestReport, IngestError> {
        for url in urls {
            loader::validate_url(url)?;
        }

        let _write = self.corpus_lock.write().await;
        self.set_phase(PipelinePhase::Ingesting).await;

        let mut trail = vec![format!("Loading data from {} URL(s)", urls.len())];

        let loads = join_all(urls.iter().map(|url| self.loader.load_url(url))).await;

        let mut sources = Vec::new();
        for (url, outcome) in urls.iter().zip(loads) {
            match outcome {
                Ok(source) => {
                    trail.push(format!(
                        "Loaded {} ({} characters)",
                        url,
                        source.text.chars().count()
                    ));
                    sources.push(source);
                }
                Err(err) => {
                    tracing::warn!(url = %url, error = %err, "failed to load URL");
                    trail.push(format!("Error loading {}: {}", url, err));
                }
            }
        }

        let outcome = self.index_sources(sources, &mut trail).await;
        self.finish_ingest(
            outcome,
            trail,
            "URLs processed successfully",
            "No URLs were successfully loaded. Please check the URLs and try again.",
        )
        .await
    }

    /// Same as `ingest_urls` for uploaded files. Unsupported extensions
    /// are skipped with a warning instead of an error entry.
    pub async fn ingest_documents(
        &self,
        files: &[(String, Vec<u8>)],
    ) -> Result<IngestReport, IngestError> {
        let _write = self.corpus_lock.write().await;
        self.set_phase(PipelinePhase::Ingesting).await;

        let mut trail = vec![format!("Processing {} file(s)", files.len())];

        let mut sources = Vec::new();
        for (filename, bytes) in files {
            match self.loader.load_document(filename, bytes).await {
                Ok(source) => {
                    trail.push(format!(
                        "Loaded {} ({} characters)",
                        filename,
                        source.text.chars().count()
                    ));
                    sources.push(source);
                }
                Err(err @ LoadError::UnsupportedType(_)) => {
                    tracing::warn!(file = %filename, error = %err, "skipping file");
                    trail.push(format!("Warning: skipped {}: {}", filename, err));
                }
                Err(err) => {
                    tracing::warn!(file = %filename, error = %err, "failed to load file");
                    trail.push(format!("Error loading {}: {}", filename, err));
                }
            }
        }

        let outcome = self.index_sources(sources, &mut trail).await;
        self.finish_ingest(
            outcome,
            trail,
            "Documents processed successfully",
            "No documents were successfully loaded. Please check the files and try again.",
        )
        .await
    }

    pub async fn query(&self, question: &str) -> Result<GeneratedAnswer, QueryError> {
        let _read = self.corpus_lock.read().await;

        let results = self.retriever.retrieve(question).await?;
        let generated = self.answerer.answer(question, &results).await?;

        tracing::info!(
            chunks = results.len(),
            sources = generated.sources.len(),
            "answered query"
        );

        Ok(generated)
    }

    /// Chunk, embed and atomically swap the corpus for the loaded sources.
    /// Caller holds the write lock.
    async fn index_sources(
        &self,
        sources: Vec<Source>,
        trail: &mut Vec<String>,
    ) -> Result<usize, IngestError> {
        if sources.is_empty() {
            return Err(IngestError::NoContent);
        }

        trail.push("Splitting text into chunks".to_string());
        let source_count = sources.len();
        let mut chunks: Vec<TextChunk> = Vec::new();
        for source in &sources {
            tracing::debug!(
                source = %source.id,
                kind = ?source.kind,
                chars = source.text.chars().count(),
                "chunking source"
            );
            let mut split = self.chunker.split(&source.text, &source.id);
            if split.is_empty() {
                tracing::warn!(source = %source.id, "source produced no chunks");
                trail.push(format!("Warning: {} produced no chunks", source.id));
                continue;
            }
            chunks.append(&mut split);
        }

        if chunks.is_empty() {
            return Err(IngestError::NoContent);
        }
        trail.push(format!(
            "Created {} chunks from {} source(s)",
            chunks.len(),
            source_count
        ));

        trail.push("Computing embeddings".to_string());
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            let mut vectors = self
                .provider
                .embed(batch, &self.embedding_model)
                .await
                .map_err(|e| IngestError::Embedding(e.to_string()))?;
            embeddings.append(&mut vectors);
        }
        if embeddings.len() != chunks.len() {
            return Err(IngestError::Embedding(format!(
                "got {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        trail.push("Rebuilding vector store".to_string());
        let items: Vec<(StoredChunk, Vec<f32>)> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                (
                    StoredChunk {
                        chunk_id: Uuid::new_v4().to_string(),
                        content: chunk.text,
                        source: chunk.source,
                        chunk_index: chunk.chunk_index,
                    },
                    embedding,
                )
            })
            .collect();

        let indexed = self.store.replace_all(items).await?;
        trail.push(format!(
            "Added {} chunks to vector database. You can now ask questions.",
            indexed
        ));

        tracing::info!(chunks = indexed, sources = source_count, "corpus rebuilt");
        Ok(indexed)
    }

    async fn finish_ingest(
        &self,
        outcome: Result<usize, IngestError>,
        mut trail: Vec<String>,
        success_message: &str,
        failure_message: &str,
    ) -> Result<IngestReport, IngestError> {
        match outcome {
            Ok(indexed) => {
                let mut state = self.state.lock().await;
                state.phase = PipelinePhase::Ready;
                state.last_ingest_at = Some(Utc::now());
                drop(state);

                Ok(IngestReport {
                    success: true,
                    message: success_message.to_string(),
                    status_messages: trail,
                    chunks_indexed: indexed,
                })
            }
            Err(IngestError::NoContent) => {
                trail.push(failure_message.to_string());
                self.settle_phase().await;

                Ok(IngestReport {
                    success: false,
                    message: failure_message.to_string(),
                    status_messages: trail,
                    chunks_indexed: 0,
                })
            }
            Err(err) => {
                self.settle_phase().await;
                Err(err)
            }
        }
    }

    async fn set_phase(&self, phase: PipelinePhase) {
        self.state.lock().await.phase = phase;
    }

    /// After a failed ingest the previous corpus is still in place; the
    /// phase goes back to whatever that corpus supports.
    async fn settle_phase(&self) {
        let phase = match self.store.count().await {
            Ok(0) | Err(_) => PipelinePhase::Idle,
            Ok(_) => PipelinePhase::Ready,
        };
        self.state.lock().await.phase = phase;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::MockProvider;
    use crate::rag::sqlite::SqliteVectorStore;

    async fn temp_store() -> Arc<SqliteVectorStore> {
        let tmp = std::env::temp_dir().join(format!(
            "research-pipeline-test-{}.db",
            Uuid::new_v4()
        ));
        Arc::new(SqliteVectorStore::with_path(tmp).await.unwrap())
    }

    async fn pipeline_with(provider: MockProvider) -> Pipeline {
        let store = temp_store().await;
        Pipeline::new(store, Arc::new(provider), &Settings::default()).unwrap()
    }

    fn txt_file(name: &str, content: &str) -> (String, Vec<u8>) {
        (name.to_string(), content.as_bytes().to_vec())
    }

    /// Minimal local HTTP server handing out one HTML page per path.
    async fn serve_pages() -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 2048];
                    let _ = socket.read(&mut buf).await;
                    let request = String::from_utf8_lossy(&buf);

                    let body = if request.starts_with("GET /gardens") {
                        "<html><body><p>a long page about gardens</p></body></html>"
                    } else {
                        "<html><body><p>a long page about rockets</p></body></html>"
                    };
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn document_ingest_builds_a_queryable_corpus() {
        let pipeline = pipeline_with(MockProvider::with_answer("the answer")).await;

        let report = pipeline
            .ingest_documents(&[
                txt_file("notes.txt", "apples are red and sweet"),
                txt_file("more.txt", "bananas are yellow"),
            ])
            .await
            .unwrap();

        assert!(report.success);
        assert!(report.chunks_indexed >= 2);
        assert!(report
            .status_messages
            .iter()
            .any(|m| m.contains("Loaded notes.txt")));
        assert!(report
            .status_messages
            .last()
            .unwrap()
            .contains("You can now ask questions"));

        let status = pipeline.status().await;
        assert_eq!(status.phase, PipelinePhase::Ready);
        assert_eq!(status.indexed_chunks, report.chunks_indexed);
        assert!(status.last_ingest_at.is_some());

        let generated = pipeline.query("what color are apples?").await.unwrap();
        assert_eq!(generated.answer, "the answer");
        assert!(!generated.sources.is_empty());
    }

    #[tokio::test]
    async fn reingest_replaces_the_previous_corpus() {
        let pipeline = pipeline_with(MockProvider::new()).await;

        pipeline
            .ingest_documents(&[txt_file("fruits.txt", "apples bananas cherries")])
            .await
            .unwrap();
        let first = pipeline.query("apples").await.unwrap();
        assert_eq!(first.sources, vec!["fruits.txt"]);

        pipeline
            .ingest_documents(&[txt_file("space.txt", "rockets orbit the planet")])
            .await
            .unwrap();
        let second = pipeline.query("apples bananas cherries").await.unwrap();
        assert_eq!(second.sources, vec!["space.txt"]);
    }

    #[tokio::test]
    async fn unsupported_files_are_skipped_with_a_warning() {
        let pipeline = pipeline_with(MockProvider::new()).await;

        let report = pipeline
            .ingest_documents(&[
                txt_file("good.txt", "useful indexed text"),
                txt_file("data.xyz", "binary-ish payload"),
            ])
            .await
            .unwrap();

        assert!(report.success);
        assert!(report
            .status_messages
            .iter()
            .any(|m| m.contains("Warning: skipped data.xyz")));

        let generated = pipeline.query("useful indexed text").await.unwrap();
        assert_eq!(generated.sources, vec!["good.txt"]);
    }

    #[tokio::test]
    async fn batch_with_no_usable_sources_fails_soft() {
        let pipeline = pipeline_with(MockProvider::new()).await;

        let report = pipeline
            .ingest_documents(&[
                txt_file("data.xyz", "unsupported"),
                txt_file("blank.txt", "   \n  "),
            ])
            .await
            .unwrap();

        assert!(!report.success);
        assert_eq!(report.chunks_indexed, 0);
        assert!(report.message.contains("No documents were successfully loaded"));
        assert!(report
            .status_messages
            .iter()
            .any(|m| m.contains("Warning: skipped data.xyz")));
        assert!(report
            .status_messages
            .iter()
            .any(|m| m.contains("Error loading blank.txt")));

        assert_eq!(pipeline.status().await.phase, PipelinePhase::Idle);
        assert!(matches!(
            pipeline.query("anything").await,
            Err(QueryError::CorpusEmpty)
        ));
    }

    #[tokio::test]
    async fn failed_ingest_keeps_the_previous_corpus() {
        let store = temp_store().await;
        let good = Pipeline::new(
            store.clone(),
            Arc::new(MockProvider::new()),
            &Settings::default(),
        )
        .unwrap();
        let broken = Pipeline::new(
            store,
            Arc::new(MockProvider::failing_embed()),
            &Settings::default(),
        )
        .unwrap();

        good.ingest_documents(&[txt_file("keep.txt", "original corpus text")])
            .await
            .unwrap();

        let err = broken
            .ingest_documents(&[txt_file("new.txt", "replacement that will not embed")])
            .await;
        assert!(matches!(err, Err(IngestError::Embedding(_))));

        // The original corpus is still there and still answers.
        let generated = good.query("original corpus text").await.unwrap();
        assert_eq!(generated.sources, vec!["keep.txt"]);
        assert_eq!(broken.status().await.phase, PipelinePhase::Ready);
    }

    #[tokio::test]
    async fn query_before_any_ingest_is_corpus_empty() {
        let pipeline = pipeline_with(MockProvider::new()).await;
        assert!(matches!(
            pipeline.query("anything").await,
            Err(QueryError::CorpusEmpty)
        ));
    }

    #[tokio::test]
    async fn repeated_queries_return_identical_sources() {
        let pipeline = pipeline_with(MockProvider::new()).await;
        pipeline
            .ingest_documents(&[
                txt_file("a.txt", "first document about gardens"),
                txt_file("b.txt", "second document about engines"),
            ])
            .await
            .unwrap();

        let once = pipeline.query("document about gardens").await.unwrap();
        let again = pipeline.query("document about gardens").await.unwrap();
        assert_eq!(once.sources, again.sources);
    }

    #[tokio::test]
    async fn malformed_url_fails_before_any_fetch() {
        let pipeline = pipeline_with(MockProvider::new()).await;

        let err = pipeline
            .ingest_urls(&["definitely not a url".to_string()])
            .await;
        assert!(matches!(err, Err(IngestError::Config(_))));
        assert_eq!(pipeline.status().await.phase, PipelinePhase::Idle);
    }

    #[tokio::test]
    async fn mixed_url_batch_indexes_only_reachable_pages() {
        let pipeline = pipeline_with(MockProvider::new()).await;
        let base = serve_pages().await;

        let urls = vec![
            format!("{}/gardens", base),
            format!("{}/rockets", base),
            // Nothing listens on port 9; this one is refused locally.
            "http://127.0.0.1:9/".to_string(),
        ];
        let report = pipeline.ingest_urls(&urls).await.unwrap();

        assert!(report.success);
        let loaded = report
            .status_messages
            .iter()
            .filter(|m| m.starts_with("Loaded "))
            .count();
        let failed = report
            .status_messages
            .iter()
            .filter(|m| m.starts_with("Error loading "))
            .count();
        assert_eq!(loaded, 2);
        assert_eq!(failed, 1);

        let generated = pipeline.query("a long page about gardens").await.unwrap();
        assert!(!generated.sources.is_empty());
        assert!(generated.sources.iter().all(|s| s.starts_with(&base)));
    }

    #[tokio::test]
    async fn unreachable_urls_fail_soft_with_trail() {
        let pipeline = pipeline_with(MockProvider::new()).await;

        // Nothing listens on port 9; the connection is refused locally.
        let report = pipeline
            .ingest_urls(&["http://127.0.0.1:9/".to_string()])
            .await
            .unwrap();

        assert!(!report.success);
        assert!(report
            .status_messages
            .iter()
            .any(|m| m.contains("Error loading http://127.0.0.1:9/")));
        assert!(report.message.contains("No URLs were successfully loaded"));
    }

    #[tokio::test]
    async fn persisted_corpus_restores_ready_phase() {
        let store = temp_store().await;
        let first = Pipeline::new(
            store.clone(),
            Arc::new(MockProvider::new()),
            &Settings::default(),
        )
        .unwrap();
        first
            .ingest_documents(&[txt_file("kept.txt", "persisted across restarts")])
            .await
            .unwrap();

        let second = Pipeline::new(
            store,
            Arc::new(MockProvider::new()),
            &Settings::default(),
        )
        .unwrap();
        assert_eq!(second.status().await.phase, PipelinePhase::Idle);

        second.restore_phase().await;
        assert_eq!(second.status().await.phase, PipelinePhase::Ready);
    }
}
