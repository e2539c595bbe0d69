use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to load configuration: {0}")]
    Config(#[source] anyhow::Error),

    #[error("Failed to initialize vector store: {0}")]
    VectorStore(#[source] anyhow::Error),

    #[error("Failed to initialize LLM provider: {0}")]
    Provider(#[source] anyhow::Error),

    #[error("Failed to assemble pipeline: {0}")]
    Pipeline(#[source] anyhow::Error),
}
