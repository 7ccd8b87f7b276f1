use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::server::handlers::{
    approvals, collections, config, generation, health, proposals, sections, templates,
};
use crate::state::AppState;

/// Creates the main application router with all routes and middleware.
///
/// This function sets up:
/// - CORS middleware and request tracing
/// - The upload body limit
/// - Catalog, template, proposal and approval endpoints
/// - Generation and knowledge-base endpoints
///
/// # Arguments
///
/// * `state` - Shared application state
pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = build_cors_layer(&state);
    let body_limit = DefaultBodyLimit::max(state.settings.uploads.max_upload_bytes);

    Router::new()
        .route("/health", get(health::health))
        .route("/config", get(config::get_config))
        .route(
            "/sections",
            get(sections::list_sections).post(sections::create_section),
        )
        .route(
            "/sections/:id",
            get(sections::get_section)
                .put(sections::update_section)
                .delete(sections::delete_section),
        )
        .route(
            "/templates",
            get(templates::list_templates).post(templates::create_template),
        )
        .route(
            "/templates/:id",
            get(templates::get_template)
                .put(templates::update_template)
                .delete(templates::delete_template),
        )
        .route(
            "/proposals",
            get(proposals::list_proposals).post(proposals::create_proposal),
        )
        .route(
            "/proposals/:id",
            get(proposals::get_proposal)
                .put(proposals::update_proposal)
                .delete(proposals::delete_proposal),
        )
        .route(
            "/proposals/:id/sections",
            get(proposals::list_proposal_sections),
        )
        .route(
            "/proposals/:id/sections/:section_id",
            put(proposals::update_proposal_section),
        )
        .route(
            "/proposals/:id/content",
            patch(proposals::update_proposal_content),
        )
        .route(
            "/proposals/:id/approvals",
            get(approvals::list_approvals).post(approvals::create_approval),
        )
        .route(
            "/approvals/:id",
            get(approvals::get_approval)
                .patch(approvals::decide_approval)
                .delete(approvals::delete_approval),
        )
        .route(
            "/generation/generate_initial_draft",
            post(generation::generate_initial_draft),
        )
        .route(
            "/generation/section/:section_id/regenerate",
            post(generation::regenerate_section),
        )
        .route(
            "/generation/generate_final_proposal",
            post(generation::generate_final_proposal),
        )
        .route(
            "/generation/section_versions/:version_id",
            put(generation::update_section_version),
        )
        .route("/collections", get(collections::list_collections))
        .route("/collections/upload", post(collections::upload_document))
        .route("/collections/categories", get(collections::list_categories))
        .route(
            "/collections/source/:source",
            delete(collections::delete_source),
        )
        .route(
            "/collections/:source/:collection",
            get(collections::get_chunks),
        )
        .with_state(state)
        .layer(body_limit)
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
}

fn build_cors_layer(state: &Arc<AppState>) -> CorsLayer {
    let allowed_origins = resolve_allowed_origins(&state.settings.server.cors_allowed_origins)
        .into_iter()
        .filter_map(|origin| HeaderValue::from_str(&origin).ok())
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE, header::AUTHORIZATION])
}

fn resolve_allowed_origins(configured: &[String]) -> Vec<String> {
    let origins = configured
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(|item| item.to_string())
        .collect::<Vec<_>>();

    if origins.is_empty() {
        return default_local_origins();
    }

    origins
}

fn default_local_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
        "http://127.0.0.1:3000".to_string(),
        "http://127.0.0.1:5173".to_string(),
    ]
}
