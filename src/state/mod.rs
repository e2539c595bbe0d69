use std::sync::Arc;
use std::time::Duration;

use crate::core::config::{AppPaths, Settings};
use crate::llm::{LlmProvider, OpenAiCompatProvider};
use crate::rag::{Pipeline, SqliteVectorStore};

pub mod error;

use error::InitializationError;

/// Global application state shared across all routes.
///
/// Contains the loaded configuration, resolved paths, the LLM provider
/// handle and the ingestion/query pipeline built on top of it.
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub settings: Settings,
    pub provider: Arc<dyn LlmProvider>,
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    /// Builds the shared state from scratch at startup.
    ///
    /// Resolves paths, loads `config.yml`, opens the SQLite-backed vector
    /// store and wires the pipeline. A corpus left behind by a previous
    /// run makes the pipeline ready immediately.
    pub async fn initialize() -> Result<Arc<Self>, InitializationError> {
        let paths = Arc::new(AppPaths::new());
        let settings =
            Settings::load(&paths.config_path()).map_err(InitializationError::Config)?;

        let store = Arc::new(
            SqliteVectorStore::new(paths.as_ref())
                .await
                .map_err(|e| InitializationError::VectorStore(e.into()))?,
        );

        let provider: Arc<dyn LlmProvider> = Arc::new(
            OpenAiCompatProvider::new(
                settings.llm.base_url.clone(),
                settings.llm.resolve_api_key(),
                Duration::from_secs(settings.llm.request_timeout_secs),
            )
            .map_err(InitializationError::Provider)?,
        );

        let pipeline = Arc::new(
            Pipeline::new(store, provider.clone(), &settings)
                .map_err(InitializationError::Pipeline)?,
        );
        pipeline.restore_phase().await;

        Ok(Arc::new(AppState {
            paths,
            settings,
            provider,
            pipeline,
        }))
    }
}
