use std::path::Path as FsPath;
use std::sync::Arc;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::db::models::{NewTemplate, TemplateUpdate};
use crate::state::AppState;

pub async fn list_templates(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let templates = state.db.list_templates().await?;
    Ok(Json(templates))
}

pub async fn get_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let template = state
        .db
        .get_template(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Template not found".to_string()))?;
    Ok(Json(template))
}

pub async fn create_template(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewTemplate>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }
    let template = state.db.create_template(payload).await?;
    Ok((StatusCode::CREATED, Json(template)))
}

pub async fn update_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(payload): Json<TemplateUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let template = state
        .db
        .update_template(id, payload)
        .await?
        .ok_or_else(|| ApiError::NotFound("Template not found".to_string()))?;
    Ok(Json(template))
}

/// Refuses while a proposal without final content still uses the template;
/// otherwise the template and its proposals are removed.
pub async fn delete_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    if state.db.get_template(id).await?.is_none() {
        return Err(ApiError::NotFound("Template not found".to_string()));
    }

    let drafts = state.db.draft_proposals_using_template(id).await?;
    if !drafts.is_empty() {
        return Err(ApiError::Conflict(format!(
            "Template cannot be deleted as proposal(s) '{}' are in a draft state and are using this template.",
            drafts.join(", ")
        )));
    }

    let scope_paths = state
        .db
        .delete_template(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Template not found".to_string()))?;
    for path in &scope_paths {
        state.uploads.remove(FsPath::new(path)).await;
    }
    tracing::info!("Deleted template {} and {} scope document(s)", id, scope_paths.len());
    Ok(Json(json!({"ok": true})))
}
