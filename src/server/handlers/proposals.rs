use std::path::Path as FsPath;
use std::sync::Arc;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::db::models::{NewProposal, ProposalSectionUpdate, ProposalUpdate};
use crate::server::handlers::utils::read_form;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ProposalContentUpdate {
    pub final_rfp_json: String,
}

pub async fn list_proposals(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let proposals = state.db.list_proposals().await?;
    Ok(Json(proposals))
}

pub async fn get_proposal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let proposal = state
        .db
        .get_proposal_detail(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Proposal not found".to_string()))?;
    Ok(Json(proposal))
}

/// Multipart form: `name`, `description`, `client_name`, `template_id` and
/// the scope document as `file`.
pub async fn create_proposal(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = read_form(multipart).await?;
    let name = form.required("name")?.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }
    let template_id: i64 = form
        .required("template_id")?
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest("template_id must be an integer".to_string()))?;
    let file = form
        .file
        .as_ref()
        .ok_or_else(|| ApiError::BadRequest("A scope document file is required".to_string()))?;

    tracing::info!("Creating proposal '{}' with template {}", name, template_id);

    let path = state
        .uploads
        .save_scope_document(&file.file_name, &file.bytes)
        .await
        .map_err(|e| e.mask_internal("Could not save file."))?;

    let created = state
        .db
        .create_proposal(NewProposal {
            name,
            description: form.optional("description").to_string(),
            client_name: form.optional("client_name").to_string(),
            template_id,
            scope_document_path: Some(path.to_string_lossy().into_owned()),
        })
        .await;

    match created {
        Ok(proposal) => {
            tracing::info!("Proposal '{}' created with id {}", proposal.name, proposal.id);
            Ok((StatusCode::CREATED, Json(proposal)))
        }
        Err(err) => {
            state.uploads.remove(&path).await;
            Err(err)
        }
    }
}

pub async fn update_proposal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(payload): Json<ProposalUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let proposal = state
        .db
        .update_proposal(id, payload)
        .await?
        .ok_or_else(|| ApiError::NotFound("Proposal not found".to_string()))?;
    Ok(Json(proposal))
}

pub async fn delete_proposal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let proposal = state
        .db
        .delete_proposal(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Proposal not found".to_string()))?;

    if let Some(path) = proposal.scope_document_path.as_deref() {
        state.uploads.remove(FsPath::new(path)).await;
    }
    tracing::info!("Proposal {} deleted", id);
    Ok(Json(json!({"ok": true})))
}

pub async fn list_proposal_sections(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let sections = state.db.list_proposal_sections(id).await?;
    Ok(Json(sections))
}

pub async fn update_proposal_section(
    State(state): State<Arc<AppState>>,
    Path((proposal_id, section_id)): Path<(i64, i64)>,
    Json(payload): Json<ProposalSectionUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let section = state
        .db
        .get_proposal_section(section_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Proposal section not found".to_string()))?;
    if section.proposal_id != proposal_id {
        return Err(ApiError::Forbidden(
            "Proposal section does not belong to this proposal".to_string(),
        ));
    }

    let updated = state
        .db
        .update_proposal_section(section_id, payload)
        .await?
        .ok_or_else(|| ApiError::NotFound("Proposal section not found".to_string()))?;
    Ok(Json(updated))
}

pub async fn update_proposal_content(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(payload): Json<ProposalContentUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let proposal = state
        .db
        .set_final_content(id, &payload.final_rfp_json)
        .await?
        .ok_or_else(|| ApiError::NotFound("Proposal not found".to_string()))?;
    Ok(Json(proposal))
}
