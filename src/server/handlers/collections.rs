use std::sync::Arc;
use axum::extract::{Multipart, Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::agent::ingestion::{ingest_document, IngestRequest};
use crate::agent::COLLECTION_CATEGORIES;
use crate::core::errors::ApiError;
use crate::documents::{self, load_document, sanitize_file_name, sha256_hex};
use crate::rag::{group_by_source, CollectionEntry};
use crate::server::handlers::utils::read_form;
use crate::state::AppState;

/// Ingests one knowledge-base document: extract, chunk with the model,
/// embed and store. The file name is the source key and must be unique.
pub async fn upload_document(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = read_form(multipart).await?;
    let file = form
        .file
        .ok_or_else(|| ApiError::BadRequest("No file name provided.".to_string()))?;
    let file_name = sanitize_file_name(&file.file_name)?;
    tracing::info!("Receiving file: {}", file_name);

    if !documents::extract::is_supported(&file_name) {
        let extension = std::path::Path::new(&file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_ascii_lowercase()))
            .unwrap_or_default();
        return Err(ApiError::BadRequest(format!("Unsupported file type: {}", extension)));
    }

    let existing = state
        .rag_store
        .count_source(&file_name)
        .await
        .map_err(|e| e.mask_internal("An error occurred during ingestion."))?;
    if existing > 0 {
        return Err(ApiError::Conflict(format!(
            "A document named '{}' already exists in the knowledge base.",
            file_name
        )));
    }

    let temp = state
        .uploads
        .save_temporary(&file_name, &file.bytes)
        .await
        .map_err(|e| e.mask_internal("Could not save file."))?;
    let text = load_document(temp.path().to_path_buf())
        .await
        .map_err(|e| ApiError::from(e).mask_internal("An error occurred during ingestion."))?;
    if text.trim().is_empty() {
        tracing::warn!("Document '{}' is empty or could not be read", file_name);
        return Err(ApiError::BadRequest("Document is empty or could not be read.".to_string()));
    }
    tracing::info!("Document content read, length: {} characters", text.len());

    let digest = sha256_hex(&file.bytes);
    let count = ingest_document(
        state.llm.as_ref(),
        state.rag_store.as_ref(),
        &state.settings.llm,
        IngestRequest {
            file_name: &file_name,
            sha256: &digest,
            text: &text,
        },
    )
    .await
    .map_err(|e| ApiError::from(e).mask_internal("An error occurred during ingestion."))?;

    Ok(Json(json!({
        "message": format!("Successfully ingested {} chunks from '{}'.", count, file_name)
    })))
}

/// Chunk counts per collection, grouped by source document.
pub async fn list_collections(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let entries: Vec<CollectionEntry> = state
        .rag_store
        .list_entries()
        .await
        .map_err(|e| e.mask_internal("Failed to fetch collections."))?
        .into_iter()
        .filter(|entry| !entry.source.is_empty())
        .collect();

    let summaries = group_by_source(&entries);
    tracing::info!("Found {} sources", summaries.len());
    Ok(Json(summaries))
}

pub async fn list_categories() -> impl IntoResponse {
    Json(COLLECTION_CATEGORIES)
}

pub async fn get_chunks(
    State(state): State<Arc<AppState>>,
    Path((source, collection)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let chunks = state
        .rag_store
        .chunks_for(&source, &collection)
        .await
        .map_err(|e| e.mask_internal("Failed to fetch chunks."))?;
    Ok(Json(chunks))
}

pub async fn delete_source(
    State(state): State<Arc<AppState>>,
    Path(source): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .rag_store
        .delete_source(&source)
        .await
        .map_err(|e| e.mask_internal("An error occurred during deletion."))?;
    tracing::info!("Deleted {} chunks from source '{}'", deleted, source);

    Ok(Json(json!({
        "message": format!("All documents from source '{}' have been deleted.", source)
    })))
}
