//! Retrieval-augmented answering.
//!
//! Sources are loaded and normalized, split into overlapping chunks,
//! embedded, and indexed in the vector store. Queries embed the question,
//! rank stored chunks by cosine similarity and answer from the top hits.

pub mod answerer;
pub mod chunker;
pub mod extract;
pub mod loader;
pub mod pipeline;
pub mod retriever;
pub mod sqlite;
pub mod store;

pub use answerer::GeneratedAnswer;
pub use pipeline::{IngestReport, Pipeline, PipelinePhase, PipelineStatus};
pub use sqlite::SqliteVectorStore;
pub use store::VectorStore;
