use std::sync::Arc;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::db::models::{ApprovalDecision, NewApproval};
use crate::state::AppState;

pub async fn list_approvals(
    State(state): State<Arc<AppState>>,
    Path(proposal_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let approvals = state.db.list_approvals(proposal_id).await?;
    Ok(Json(approvals))
}

pub async fn create_approval(
    State(state): State<Arc<AppState>>,
    Path(proposal_id): Path<i64>,
    Json(payload): Json<NewApproval>,
) -> Result<impl IntoResponse, ApiError> {
    if state.db.get_proposal(proposal_id).await?.is_none() {
        return Err(ApiError::NotFound("Proposal not found".to_string()));
    }
    if payload.approved_by.trim().is_empty() {
        return Err(ApiError::BadRequest("approved_by is required".to_string()));
    }

    let approval = state.db.create_approval(proposal_id, payload).await?;
    tracing::info!("Approval {} requested for proposal {}", approval.id, proposal_id);
    Ok((StatusCode::CREATED, Json(approval)))
}

pub async fn get_approval(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let approval = state
        .db
        .get_approval(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Approval not found".to_string()))?;
    Ok(Json(approval))
}

pub async fn decide_approval(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(payload): Json<ApprovalDecision>,
) -> Result<impl IntoResponse, ApiError> {
    let approval = state
        .db
        .decide_approval(id, payload)
        .await?
        .ok_or_else(|| ApiError::NotFound("Approval not found".to_string()))?;
    tracing::info!("Approval {} marked {}", id, approval.status);
    Ok(Json(approval))
}

pub async fn delete_approval(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.db.delete_approval(id).await? {
        return Err(ApiError::NotFound("Approval not found".to_string()));
    }
    Ok(Json(json!({"ok": true})))
}
