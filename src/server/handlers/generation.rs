use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::agent::drafting;
use crate::agent::writer::{self, FinalAssembly, SectionMapping, SectionRewrite};
use crate::core::errors::ApiError;
use crate::db::models::ProposalSectionDetail;
use crate::documents::load_scope_document;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct InitialDraftRequest {
    pub proposal_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct RegenerateSectionRequest {
    pub source_content: String,
}

#[derive(Debug, Deserialize)]
pub struct FinalProposalRequest {
    pub proposal_id: i64,
    /// Proposal section id (or section title) -> chosen version content.
    pub selected_versions: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateVersionContentRequest {
    pub content: String,
}

pub async fn generate_initial_draft(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<InitialDraftRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("Initial draft requested for proposal {}", payload.proposal_id);

    let proposal = state
        .db
        .get_proposal(payload.proposal_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Proposal not found".to_string()))?;
    let template = state
        .db
        .get_template(proposal.template_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Template not found".to_string()))?;
    let scope_path = proposal
        .scope_document_path
        .as_deref()
        .filter(|path| !path.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Proposal has no scope document".to_string()))?;

    let scope_document = load_scope_document(PathBuf::from(scope_path))
        .await
        .map_err(|e| {
            ApiError::Internal(format!("Error reading scope document: {}", e))
                .mask_internal("Failed to generate initial draft.")
        })?;

    let draft = drafting::generate_initial_draft(
        state.llm.as_ref(),
        &state.settings.llm.draft_model,
        &scope_document,
        &template.sections,
    )
    .await
    .map_err(|e| ApiError::from(e).mask_internal("Failed to generate initial draft."))?;

    let sections = state
        .db
        .save_draft(proposal.id, &draft)
        .await
        .map_err(|e| e.mask_internal("Failed to generate initial draft."))?;
    tracing::info!(
        "Initial draft for proposal {} stored in {} sections",
        proposal.id,
        sections.len()
    );

    Ok(Json(json!({
        "message": "Initial draft generated successfully.",
        "proposal_sections": sections,
    })))
}

pub async fn regenerate_section(
    State(state): State<Arc<AppState>>,
    Path(section_id): Path<i64>,
    Json(payload): Json<RegenerateSectionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("[REGEN_SECTION] Request for section {}", section_id);

    let section = state
        .db
        .get_proposal_section(section_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("ProposalSection not found".to_string()))?;

    let tool = state.retrieval_tool();
    let custom_prompt = Some(section.custom_prompt.as_str()).filter(|p| !p.trim().is_empty());
    let content = writer::regenerate_section(
        state.llm.as_ref(),
        &state.settings.llm.final_generation_model,
        &tool,
        SectionRewrite {
            source_content: &payload.source_content,
            collection_mappings: &section.collection_mappings,
            custom_prompt,
        },
        state.settings.agent.regeneration_max_turns,
    )
    .await
    .map_err(|e| ApiError::from(e).mask_internal("Failed to regenerate section."))?;

    let version = state
        .db
        .add_version(section_id, &content)
        .await
        .map_err(|e| e.mask_internal("Failed to regenerate section."))?;
    tracing::info!(
        "[REGEN_SECTION] Section {} now at version {}",
        section_id,
        version.version_number
    );
    Ok(Json(version))
}

pub async fn generate_final_proposal(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<FinalProposalRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("[PROPOSAL_GEN] Final proposal requested for proposal {}", payload.proposal_id);

    let detail = state
        .db
        .get_proposal_detail(payload.proposal_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Proposal not found".to_string()))?;

    let selected = label_selected_versions(&payload.selected_versions, &detail.proposal_sections);
    let mappings: Vec<SectionMapping> = detail
        .proposal_sections
        .iter()
        .map(|detail| SectionMapping {
            section_name: detail.section.section_name.clone(),
            collection_mappings: detail.section.collection_mappings.clone(),
            custom_prompt: Some(detail.section.custom_prompt.clone()).filter(|p| !p.trim().is_empty()),
        })
        .collect();

    let tool = state.retrieval_tool();
    let html = writer::assemble_final_proposal(
        state.llm.as_ref(),
        &state.settings.llm.final_generation_model,
        &tool,
        FinalAssembly {
            proposal_name: &detail.proposal.name,
            selected: &selected,
            mappings: &mappings,
        },
        state.settings.agent.final_max_turns,
    )
    .await
    .map_err(|e| ApiError::from(e).mask_internal("Failed to generate final proposal."))?;

    state
        .db
        .set_final_content(detail.proposal.id, &html)
        .await
        .map_err(|e| e.mask_internal("Failed to generate final proposal."))?;
    tracing::info!("[PROPOSAL_GEN] Final proposal stored for proposal {}", detail.proposal.id);

    Ok(Json(json!({ "rfp_content": html })))
}

pub async fn update_section_version(
    State(state): State<Arc<AppState>>,
    Path(version_id): Path<i64>,
    Json(payload): Json<UpdateVersionContentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let version = state
        .db
        .update_version_content(version_id, &payload.content)
        .await?
        .ok_or_else(|| ApiError::NotFound("SectionVersion not found".to_string()))?;
    tracing::info!("Updated content of version {}", version_id);
    Ok(Json(version))
}

/// Keys naming one of the proposal's sections by id are replaced with the
/// section title; any other key is kept as given.
fn label_selected_versions(
    selected: &HashMap<String, String>,
    sections: &[ProposalSectionDetail],
) -> Value {
    let mut labelled = Map::new();
    let mut used = Vec::new();

    for detail in sections {
        let key = detail.section.id.to_string();
        if let Some(content) = selected.get(&key) {
            labelled.insert(detail.section.section_name.clone(), Value::String(content.clone()));
            used.push(key);
        }
    }

    for (key, content) in selected.iter().filter(|(key, _)| !used.contains(key)) {
        labelled.entry(key.clone()).or_insert_with(|| Value::String(content.clone()));
    }

    Value::Object(labelled)
}
