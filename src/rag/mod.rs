//! Collection-partitioned vector store used by ingestion and retrieval.

pub mod sqlite;
pub mod store;
pub mod supabase;

use std::sync::Arc;

use crate::core::config::{AppPaths, RagBackend, Settings};
use crate::core::errors::ApiError;

pub use sqlite::SqliteRagStore;
pub use store::{group_by_source, ChunkMatch, CollectionEntry, DocumentChunk, RagStore, SourceSummary};
pub use supabase::SupabaseRagStore;

/// Builds the configured backend.
pub async fn open_store(settings: &Settings, paths: &AppPaths) -> Result<Arc<dyn RagStore>, ApiError> {
    match settings.rag.backend {
        RagBackend::Sqlite => {
            let store = SqliteRagStore::with_path(paths.rag_db_path.clone()).await?;
            Ok(Arc::new(store))
        }
        RagBackend::Supabase => {
            let url = settings.rag.supabase_url.as_deref().unwrap_or_default();
            let key = settings.rag.supabase_key.as_deref().unwrap_or_default();
            if url.trim().is_empty() || key.trim().is_empty() {
                return Err(ApiError::BadRequest(
                    "rag.supabase_url and rag.supabase_key are required for the supabase backend"
                        .to_string(),
                ));
            }
            let store = SupabaseRagStore::new(url, key, settings.llm.timeout_secs)?;
            Ok(Arc::new(store))
        }
    }
}
