use std::sync::Arc;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::db::models::{NewSection, SectionUpdate};
use crate::state::AppState;

pub async fn list_sections(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let sections = state.db.list_sections().await?;
    Ok(Json(sections))
}

pub async fn get_section(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let section = state
        .db
        .get_section(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Section not found".to_string()))?;
    Ok(Json(section))
}

pub async fn create_section(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewSection>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.section_name.trim().is_empty() {
        return Err(ApiError::BadRequest("section_name is required".to_string()));
    }
    let section = state.db.create_section(payload).await?;
    Ok((StatusCode::CREATED, Json(section)))
}

pub async fn update_section(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(payload): Json<SectionUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let section = state
        .db
        .update_section(id, payload)
        .await?
        .ok_or_else(|| ApiError::NotFound("Section not found".to_string()))?;
    Ok(Json(section))
}

pub async fn delete_section(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.db.delete_section(id).await? {
        return Err(ApiError::NotFound("Section not found".to_string()));
    }
    Ok(Json(json!({"ok": true})))
}
