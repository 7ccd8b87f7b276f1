use std::sync::Arc;

use crate::agent::RetrievalTool;
use crate::core::config::{AppPaths, ConfigService, Settings};
use crate::db::Database;
use crate::documents::UploadStore;
use crate::llm::{LlmProvider, OpenAiProvider};
use crate::rag::{self, RagStore};

pub mod error;

use error::InitializationError;

/// Application state shared across all routes.
///
/// Holds configuration, the relational database, the vector store, the LLM
/// provider and the upload directory. Nothing in here is mutated after
/// startup; every request works against the stores directly.
#[derive(Clone)]
pub struct AppState {
    pub config: ConfigService,
    pub settings: Arc<Settings>,
    pub db: Database,
    pub rag_store: Arc<dyn RagStore>,
    pub llm: Arc<dyn LlmProvider>,
    pub uploads: UploadStore,
}

impl AppState {
    /// Builds the application state from loaded settings.
    ///
    /// This process includes:
    /// 1. Connecting the relational database (schema + seed)
    /// 2. Opening the configured vector store
    /// 3. Building the LLM provider
    /// 4. Preparing the upload directory
    pub async fn with_settings(
        paths: &AppPaths,
        config: ConfigService,
        settings: Settings,
    ) -> Result<Arc<Self>, InitializationError> {
        let db = Database::connect(&settings.database_url(paths))
            .await
            .map_err(|e| InitializationError::Database(e.into()))?;

        let rag_store = rag::open_store(&settings, paths)
            .await
            .map_err(|e| InitializationError::Rag(e.into()))?;

        if settings.llm.api_key.is_none() {
            tracing::warn!("No LLM API key configured; ingestion and generation will fail");
        }
        let llm: Arc<dyn LlmProvider> = Arc::new(
            OpenAiProvider::new(&settings.llm).map_err(|e| InitializationError::Llm(e.into()))?,
        );

        let uploads = UploadStore::new(settings.upload_dir(paths))
            .map_err(|e| InitializationError::Uploads(e.into()))?;

        tracing::info!(
            "State ready (rag backend: {}, llm provider: {})",
            rag_store.name(),
            llm.name()
        );

        Ok(Self::from_parts(config, settings, db, rag_store, llm, uploads))
    }

    /// Assembles state from already-built components.
    pub fn from_parts(
        config: ConfigService,
        settings: Settings,
        db: Database,
        rag_store: Arc<dyn RagStore>,
        llm: Arc<dyn LlmProvider>,
        uploads: UploadStore,
    ) -> Arc<Self> {
        Arc::new(AppState {
            config,
            settings: Arc::new(settings),
            db,
            rag_store,
            llm,
            uploads,
        })
    }

    pub fn retrieval_tool(&self) -> RetrievalTool {
        RetrievalTool::new(
            self.llm.clone(),
            self.rag_store.clone(),
            self.settings.llm.embedding_model.clone(),
            self.settings.rag.match_threshold,
            self.settings.rag.match_count,
        )
    }
}
