use std::sync::Arc;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;

use rfpgenie_backend::agent::instructions::{
    build_chunking_instructions, DRAFT_INSTRUCTIONS, FINAL_PROPOSAL_INSTRUCTIONS,
    REGENERATION_INSTRUCTIONS,
};
use rfpgenie_backend::core::config::{AppPaths, ConfigService, Settings};
use rfpgenie_backend::core::errors::ApiError;
use rfpgenie_backend::db::Database;
use rfpgenie_backend::documents::UploadStore;
use rfpgenie_backend::llm::{ChatMessage, ChatRequest, LlmProvider, ToolCall};
use rfpgenie_backend::rag::SqliteRagStore;
use rfpgenie_backend::server::router::router;
use rfpgenie_backend::state::AppState;

/// Answers each agent by its system instruction, like a well-behaved model.
struct FakeModel;

#[async_trait]
impl LlmProvider for FakeModel {
    fn name(&self) -> &str {
        "fake"
    }

    async fn chat(&self, request: ChatRequest, _model_id: &str) -> Result<ChatMessage, ApiError> {
        let system = request.system_prompt().unwrap_or_default().to_string();

        if system == build_chunking_instructions() {
            let user = request.messages.last().map(|m| m.text()).unwrap_or_default();
            let source = user
                .lines()
                .next()
                .and_then(|line| line.strip_prefix("Source: "))
                .unwrap_or_default();
            let chunks = json!([
                {"collection": "Commercials", "content": "Fixed price of 50k, paid in two milestones.", "metadata": {"source": source}},
                {"collection": "Case studies", "content": "Payments platform for a regional bank.", "metadata": {"source": source}},
                {"collection": "Commercials", "content": "Malformed, no metadata"}
            ]);
            return Ok(ChatMessage::assistant(format!("```json\n{}\n```", chunks)));
        }

        if system == DRAFT_INSTRUCTIONS {
            return Ok(ChatMessage::assistant(
                "```json\n{\"Executive Summary\": \"We will deliver the portal.\", \"Pricing\": \"Pricing will be confirmed.\"}\n```",
            ));
        }

        if system == REGENERATION_INSTRUCTIONS {
            let last = request.messages.last().cloned();
            return Ok(match last {
                Some(message) if message.role == "tool" => {
                    ChatMessage::assistant(format!("Revised pricing. {}", message.text()))
                }
                _ => ChatMessage {
                    role: "assistant".to_string(),
                    content: None,
                    tool_calls: Some(vec![ToolCall::new(
                        "call_1",
                        "query_collections",
                        r#"{"query": "pricing", "collections": ["Commercials"]}"#,
                    )]),
                    tool_call_id: None,
                },
            });
        }

        if system == FINAL_PROPOSAL_INSTRUCTIONS {
            return Ok(ChatMessage::assistant(
                "```html\n<html><body><h1 style=\"color: red\">Final proposal</h1></body></html>\n```",
            ));
        }

        Err(ApiError::Internal("unexpected agent".to_string()))
    }

    async fn embed(&self, inputs: &[String], _model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        Ok(inputs.iter().map(|_| vec![1.0, 0.0]).collect())
    }
}

/// Fails every call the way an unreachable upstream does.
struct BrokenModel;

const UPSTREAM_DETAIL: &str = "connection to upstream 10.0.0.3:8443 refused";

#[async_trait]
impl LlmProvider for BrokenModel {
    fn name(&self) -> &str {
        "broken"
    }

    async fn chat(&self, _request: ChatRequest, _model_id: &str) -> Result<ChatMessage, ApiError> {
        Err(ApiError::Internal(UPSTREAM_DETAIL.to_string()))
    }

    async fn embed(&self, _inputs: &[String], _model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        Err(ApiError::Internal(UPSTREAM_DETAIL.to_string()))
    }
}

struct TestApp {
    base: String,
    client: Client,
    _dir: TempDir,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }

    async fn post_json(&self, path: &str, body: Value) -> reqwest::Response {
        self.client.post(self.url(path)).json(&body).send().await.unwrap()
    }

    async fn put_json(&self, path: &str, body: Value) -> reqwest::Response {
        self.client.put(self.url(path)).json(&body).send().await.unwrap()
    }

    async fn patch_json(&self, path: &str, body: Value) -> reqwest::Response {
        self.client.patch(self.url(path)).json(&body).send().await.unwrap()
    }

    async fn delete(&self, path: &str) -> reqwest::Response {
        self.client.delete(self.url(path)).send().await.unwrap()
    }

    async fn upload(&self, file_name: &str, bytes: &[u8]) -> reqwest::Response {
        let form = Form::new().part("file", Part::bytes(bytes.to_vec()).file_name(file_name.to_string()));
        self.client
            .post(self.url("/collections/upload"))
            .multipart(form)
            .send()
            .await
            .unwrap()
    }

    async fn create_proposal(&self, name: &str, template_id: i64) -> reqwest::Response {
        self.create_proposal_with_scope(
            name,
            template_id,
            "scope.txt",
            b"Build a customer portal with SSO and reporting.",
        )
        .await
    }

    async fn create_proposal_with_scope(
        &self,
        name: &str,
        template_id: i64,
        scope_name: &str,
        scope: &[u8],
    ) -> reqwest::Response {
        let form = Form::new()
            .text("name", name.to_string())
            .text("description", "Customer portal rebuild")
            .text("client_name", "Acme")
            .text("template_id", template_id.to_string())
            .part("file", Part::bytes(scope.to_vec()).file_name(scope_name.to_string()));
        self.client
            .post(self.url("/proposals"))
            .multipart(form)
            .send()
            .await
            .unwrap()
    }
}

async fn spawn_app() -> TestApp {
    spawn_app_with(Arc::new(FakeModel)).await
}

async fn spawn_app_with(llm: Arc<dyn LlmProvider>) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let paths = Arc::new(AppPaths::with_data_dir(
        dir.path().to_path_buf(),
        dir.path().join("data"),
    ));
    let config = ConfigService::new(paths.clone());
    let settings = Settings::default();

    let db = Database::connect(&settings.database_url(&paths)).await.unwrap();
    let rag_store = Arc::new(SqliteRagStore::with_path(paths.rag_db_path.clone()).await.unwrap());
    let uploads = UploadStore::new(settings.upload_dir(&paths)).unwrap();

    let state = AppState::from_parts(config, settings, db, rag_store, llm, uploads);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });

    TestApp {
        base: format!("http://{}", addr),
        client: Client::new(),
        _dir: dir,
    }
}

async fn create_template(app: &TestApp) -> i64 {
    let res = app
        .post_json(
            "/templates",
            json!({"name": "Standard", "description": "Default layout", "sections": ["Executive Summary", "Pricing"]}),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let template: Value = res.json().await.unwrap();
    template["id"].as_i64().unwrap()
}

#[tokio::test]
async fn health_and_redacted_config() {
    let app = spawn_app().await;

    let res = app.get("/health").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["rag_backend"], "sqlite");

    let res = app.get("/config").await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn section_catalog_crud() {
    let app = spawn_app().await;

    let seeded: Vec<Value> = app.get("/sections").await.json().await.unwrap();
    assert_eq!(seeded.len(), 9);

    let res = app
        .post_json("/sections", json!({"section_name": "Security", "description": "Controls"}))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = res.json().await.unwrap();
    assert_eq!(created["category"], "General");
    let id = created["id"].as_i64().unwrap();

    let updated: Value = app
        .put_json(&format!("/sections/{}", id), json!({"category": "Technical"}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(updated["category"], "Technical");
    assert_eq!(updated["section_name"], "Security");

    assert_eq!(app.delete(&format!("/sections/{}", id)).await.status(), StatusCode::OK);
    assert_eq!(app.get(&format!("/sections/{}", id)).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn knowledge_base_upload_listing_and_deletion() {
    let app = spawn_app().await;

    let res = app.upload("profile.txt", b"We built a payments platform. Fixed price of 50k.").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Successfully ingested 2 chunks from 'profile.txt'.");

    let res = app.upload("profile.txt", b"Same name again.").await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = app.upload("diagram.png", b"not text").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app.upload("blank.txt", b"   \n").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Document is empty or could not be read.");

    let listing: Value = app.get("/collections").await.json().await.unwrap();
    assert_eq!(
        listing,
        json!([{"source": "profile.txt", "collections": {"Case studies": 1, "Commercials": 1}}])
    );

    let chunks: Vec<String> = app
        .get("/collections/profile.txt/Commercials")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(chunks, vec!["Fixed price of 50k, paid in two milestones.".to_string()]);

    let categories: Vec<String> = app.get("/collections/categories").await.json().await.unwrap();
    assert_eq!(categories.len(), 7);

    let res = app.delete("/collections/source/profile.txt").await;
    assert_eq!(res.status(), StatusCode::OK);
    let listing: Value = app.get("/collections").await.json().await.unwrap();
    assert_eq!(listing, json!([]));
}

#[tokio::test]
async fn proposal_generation_flow() {
    let app = spawn_app().await;
    app.upload("pricing.txt", b"Fixed price of 50k.").await;
    let template_id = create_template(&app).await;

    let res = app.create_proposal("Acme portal", template_id).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let proposal: Value = res.json().await.unwrap();
    let proposal_id = proposal["id"].as_i64().unwrap();
    assert_eq!(proposal["draft_rfp_json"], false);

    let res = app.create_proposal("Orphan", 9999).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // Draft proposals keep their template alive.
    let res = app.delete(&format!("/templates/{}", template_id)).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("'Acme portal'"));

    let res = app
        .post_json("/generation/generate_initial_draft", json!({"proposal_id": proposal_id}))
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let sections: Vec<Value> = app
        .get(&format!("/proposals/{}/sections", proposal_id))
        .await
        .json()
        .await
        .unwrap();
    let names: Vec<&str> = sections.iter().map(|s| s["section_name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Executive Summary", "Pricing"]);
    assert_eq!(sections[1]["versions"][0]["version_number"], 1);
    let pricing_id = sections[1]["id"].as_i64().unwrap();

    let res = app
        .put_json(
            &format!("/proposals/{}/sections/{}", proposal_id + 1, pricing_id),
            json!({"custom_prompt": "Be brief"}),
        )
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app
        .put_json(
            &format!("/proposals/{}/sections/{}", proposal_id, pricing_id),
            json!({"collection_mappings": ["Commercials"]}),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .post_json(
            &format!("/generation/section/{}/regenerate", pricing_id),
            json!({"source_content": "Pricing will be confirmed."}),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let version: Value = res.json().await.unwrap();
    assert_eq!(version["version_number"], 2);
    assert!(version["content"]
        .as_str()
        .unwrap()
        .contains("Fixed price of 50k, paid in two milestones."));
    let version_id = version["id"].as_i64().unwrap();

    let edited: Value = app
        .put_json(
            &format!("/generation/section_versions/{}", version_id),
            json!({"content": "Edited pricing."}),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(edited["content"], "Edited pricing.");
    assert_eq!(edited["version_number"], 2);

    let mut selected = serde_json::Map::new();
    selected.insert(pricing_id.to_string(), json!("Edited pricing."));
    let res = app
        .post_json(
            "/generation/generate_final_proposal",
            json!({"proposal_id": proposal_id, "selected_versions": selected}),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["rfp_content"], "<h1>Final proposal</h1>");

    let detail: Value = app.get(&format!("/proposals/{}", proposal_id)).await.json().await.unwrap();
    assert_eq!(detail["final_rfp_json"], "<h1>Final proposal</h1>");
    assert_eq!(detail["draft_rfp_json"], true);
    assert_eq!(detail["proposal_sections"].as_array().unwrap().len(), 2);

    let updated: Value = app
        .patch_json(
            &format!("/proposals/{}/content", proposal_id),
            json!({"final_rfp_json": "<p>Signed off</p>"}),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(updated["final_rfp_json"], "<p>Signed off</p>");

    assert_eq!(
        app.delete(&format!("/proposals/{}", proposal_id)).await.status(),
        StatusCode::OK
    );
    assert_eq!(
        app.get(&format!("/proposals/{}", proposal_id)).await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        app.delete(&format!("/templates/{}", template_id)).await.status(),
        StatusCode::OK
    );
}

/// Status and raw body of an error response.
async fn error_of(res: reqwest::Response) -> (StatusCode, String, Value) {
    let status = res.status();
    let text = res.text().await.unwrap();
    let body: Value = serde_json::from_str(&text).unwrap();
    (status, text, body)
}

#[tokio::test]
async fn generation_on_missing_records_is_not_found() {
    let app = spawn_app().await;

    let res = app
        .post_json("/generation/generate_initial_draft", json!({"proposal_id": 42}))
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = app
        .post_json("/generation/section/42/regenerate", json!({"source_content": "x"}))
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn upstream_failures_return_generic_errors() {
    let app = spawn_app_with(Arc::new(BrokenModel)).await;

    let (status, text, body) = error_of(app.upload("profile.txt", b"Fixed price of 50k.").await).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "An error occurred during ingestion."}));
    assert!(!text.contains("10.0.0.3"));

    let template_id = create_template(&app).await;
    let proposal: Value = app
        .create_proposal("Acme portal", template_id)
        .await
        .json()
        .await
        .unwrap();

    let res = app
        .post_json(
            "/generation/generate_initial_draft",
            json!({"proposal_id": proposal["id"]}),
        )
        .await;
    let (status, text, body) = error_of(res).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Failed to generate initial draft."}));
    assert!(!text.contains("10.0.0.3"));

    // Nothing was half-written.
    let sections: Vec<Value> = app
        .get(&format!("/proposals/{}/sections", proposal["id"]))
        .await
        .json()
        .await
        .unwrap();
    assert!(sections.is_empty());
}

#[tokio::test]
async fn unreadable_documents_do_not_expose_server_paths() {
    let app = spawn_app().await;

    let (status, text, body) = error_of(app.upload("broken.docx", b"this is not a zip archive").await).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "An error occurred during ingestion."}));
    assert!(!text.contains("tmp-"));
    assert!(!text.contains("uploads"));

    let listing: Value = app.get("/collections").await.json().await.unwrap();
    assert_eq!(listing, json!([]));

    let template_id = create_template(&app).await;
    let proposal: Value = app
        .create_proposal_with_scope("Acme portal", template_id, "scope.docx", b"not a zip either")
        .await
        .json()
        .await
        .unwrap();
    let scope_path = proposal["scope_document_path"].as_str().unwrap().to_string();

    let res = app
        .post_json(
            "/generation/generate_initial_draft",
            json!({"proposal_id": proposal["id"]}),
        )
        .await;
    let (status, text, body) = error_of(res).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Failed to generate initial draft."}));
    assert!(!text.contains(&scope_path));
}

#[tokio::test]
async fn deleting_template_removes_scope_documents() {
    let app = spawn_app().await;
    let template_id = create_template(&app).await;
    let proposal: Value = app
        .create_proposal("Acme portal", template_id)
        .await
        .json()
        .await
        .unwrap();
    let proposal_id = proposal["id"].as_i64().unwrap();
    let scope_path = std::path::PathBuf::from(proposal["scope_document_path"].as_str().unwrap());
    assert!(scope_path.exists());

    let res = app
        .patch_json(
            &format!("/proposals/{}/content", proposal_id),
            json!({"final_rfp_json": "<p>Signed off</p>"}),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = app.delete(&format!("/templates/{}", template_id)).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(!scope_path.exists());
    assert_eq!(
        app.get(&format!("/proposals/{}", proposal_id)).await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        app.delete(&format!("/templates/{}", template_id)).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn approval_lifecycle() {
    let app = spawn_app().await;
    let template_id = create_template(&app).await;
    let proposal: Value = app
        .create_proposal("Acme portal", template_id)
        .await
        .json()
        .await
        .unwrap();
    let proposal_id = proposal["id"].as_i64().unwrap();

    let res = app
        .post_json(
            &format!("/proposals/{}/approvals", proposal_id),
            json!({"approved_by": "dana", "comments": "Please review pricing"}),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let approval: Value = res.json().await.unwrap();
    assert_eq!(approval["status"], "pending");
    let approval_id = approval["id"].as_i64().unwrap();

    let decided: Value = app
        .patch_json(
            &format!("/approvals/{}", approval_id),
            json!({"status": "approved", "comments": "Looks good"}),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(decided["status"], "approved");
    assert_eq!(decided["comments"], "Looks good");

    let res = app
        .patch_json(&format!("/approvals/{}", approval_id), json!({"status": "rejected"}))
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let listed: Vec<Value> = app
        .get(&format!("/proposals/{}/approvals", proposal_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);

    assert_eq!(
        app.delete(&format!("/approvals/{}", approval_id)).await.status(),
        StatusCode::OK
    );
    assert_eq!(
        app.get(&format!("/approvals/{}", approval_id)).await.status(),
        StatusCode::NOT_FOUND
    );

    let res = app
        .post_json("/proposals/999/approvals", json!({"approved_by": "dana"}))
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
