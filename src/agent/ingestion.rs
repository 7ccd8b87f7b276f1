//! Agentic chunking: the model splits a document into categorized snippets
//! which are embedded and written to the vector store.

use serde_json::{Map, Value};

use super::error::AgentError;
use super::instructions::{build_chunking_instructions, COLLECTION_CATEGORIES};
use super::output::strip_outer_fence;
use crate::core::config::settings::LlmSettings;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};
use crate::rag::{DocumentChunk, RagStore};

pub struct IngestRequest<'a> {
    pub file_name: &'a str,
    pub sha256: &'a str,
    pub text: &'a str,
}

/// Chunks, embeds and stores one document. Returns the number of chunks
/// written.
pub async fn ingest_document(
    llm: &dyn LlmProvider,
    store: &dyn RagStore,
    settings: &LlmSettings,
    request: IngestRequest<'_>,
) -> Result<usize, AgentError> {
    let mut chunks = chunk_document(llm, &settings.ingestion_model, request.file_name, request.text).await?;
    if chunks.is_empty() {
        tracing::warn!("No chunks extracted from '{}'", request.file_name);
        return Ok(0);
    }

    for chunk in &mut chunks {
        if let Some(metadata) = chunk.metadata.as_object_mut() {
            metadata.insert("sha256".to_string(), Value::String(request.sha256.to_string()));
        }
    }

    tracing::info!("Creating embeddings for {} chunks", chunks.len());
    let contents: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let embeddings = llm.embed(&contents, &settings.embedding_model).await?;
    if embeddings.len() != chunks.len() {
        return Err(AgentError::InvalidOutput(format!(
            "expected {} embeddings, got {}",
            chunks.len(),
            embeddings.len()
        )));
    }

    let count = chunks.len();
    store
        .insert_batch(chunks.into_iter().zip(embeddings).collect())
        .await?;
    tracing::info!("Stored {} chunks from '{}' in {}", count, request.file_name, store.name());
    Ok(count)
}

pub async fn chunk_document(
    llm: &dyn LlmProvider,
    model_id: &str,
    file_name: &str,
    text: &str,
) -> Result<Vec<DocumentChunk>, AgentError> {
    let request = ChatRequest::new(vec![
        ChatMessage::system(build_chunking_instructions()),
        ChatMessage::user(format!("Source: {}\n\n{}", file_name, text)),
    ]);
    let reply = llm.chat(request, model_id).await?;
    tracing::debug!("Raw chunking response: {}", reply.text());
    parse_chunks(reply.text(), file_name)
}

/// Parses the model's JSON array. Elements missing `collection`, `content`
/// or `metadata` are skipped; `metadata.source` is always the file name.
pub fn parse_chunks(reply: &str, file_name: &str) -> Result<Vec<DocumentChunk>, AgentError> {
    let cleaned = strip_outer_fence(reply);
    let parsed: Value = serde_json::from_str(cleaned).map_err(|e| {
        AgentError::InvalidOutput(format!("chunking response is not valid JSON: {}", e))
    })?;
    let Value::Array(items) = parsed else {
        return Err(AgentError::InvalidOutput(
            "chunking response is not a JSON array".to_string(),
        ));
    };
    tracing::info!("Parsed {} chunks from agent response", items.len());

    let mut chunks = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let collection = item.get("collection").and_then(|v| v.as_str()).map(str::trim);
        let content = item.get("content").and_then(|v| v.as_str()).map(str::trim);
        let metadata = item.get("metadata").and_then(|v| v.as_object());

        let (Some(collection), Some(content), Some(metadata)) = (collection, content, metadata) else {
            tracing::warn!("Skipping malformed chunk {}: {}", index + 1, item);
            continue;
        };
        if collection.is_empty() || content.is_empty() {
            tracing::warn!("Skipping empty chunk {}", index + 1);
            continue;
        }
        if !COLLECTION_CATEGORIES.contains(&collection) {
            tracing::warn!("Chunk {} uses unknown collection '{}'", index + 1, collection);
        }

        let mut metadata: Map<String, Value> = metadata.clone();
        metadata.insert("source".to_string(), Value::String(file_name.to_string()));

        chunks.push(DocumentChunk {
            collection: collection.to_string(),
            content: content.to_string(),
            metadata: Value::Object(metadata),
        });
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedProvider;
    use crate::rag::SqliteRagStore;
    use serde_json::json;

    #[test]
    fn parse_skips_malformed_and_forces_source() {
        let reply = r#"```json
[
  {"collection": "Commercials", "content": "Fixed price.", "metadata": {"source": "other.txt", "page": 2}},
  {"collection": "Case studies", "content": "Missing metadata"},
  {"content": "No collection", "metadata": {}},
  {"collection": "Project Planning", "content": "  ", "metadata": {}}
]
```"#;

        let chunks = parse_chunks(reply, "profile.pdf").unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].collection, "Commercials");
        assert_eq!(chunks[0].metadata, json!({"source": "profile.pdf", "page": 2}));
    }

    #[test]
    fn parse_keeps_code_fences_inside_content() {
        let reply = "```json\n[{\"collection\":\"Technical solution\",\"content\":\"Deploy with ```helm install```\",\"metadata\":{}}]\n```";
        let chunks = parse_chunks(reply, "runbook.md").unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Deploy with ```helm install```");
        assert_eq!(chunks[0].metadata, json!({"source": "runbook.md"}));
    }

    #[test]
    fn parse_rejects_invalid_json_and_objects() {
        assert!(matches!(
            parse_chunks("not json", "a.txt"),
            Err(AgentError::InvalidOutput(_))
        ));
        assert!(matches!(
            parse_chunks("{\"collection\": \"Commercials\"}", "a.txt"),
            Err(AgentError::InvalidOutput(_))
        ));
        assert!(parse_chunks("[]", "a.txt").unwrap().is_empty());
    }

    #[tokio::test]
    async fn ingest_embeds_and_stores_chunks() {
        let reply = json!([
            {"collection": "Commercials", "content": "Fixed price.", "metadata": {"source": "x"}},
            {"collection": "Case studies", "content": "Bank rollout.", "metadata": {}}
        ])
        .to_string();
        let llm = ScriptedProvider::new(vec![ChatMessage::assistant(reply)]);
        let path = std::env::temp_dir().join(format!("rfpgenie-ingest-{}.db", uuid::Uuid::new_v4()));
        let store = SqliteRagStore::with_path(path).await.unwrap();

        let count = ingest_document(
            &llm,
            &store,
            &LlmSettings::default(),
            IngestRequest {
                file_name: "profile.pdf",
                sha256: "abc123",
                text: "We delivered a bank rollout at a fixed price.",
            },
        )
        .await
        .unwrap();

        assert_eq!(count, 2);
        assert_eq!(store.count_source("profile.pdf").await.unwrap(), 2);

        let request = llm.last_request().unwrap();
        assert!(request.system_prompt().unwrap().contains("Capabilities and Resources"));
        assert!(request.messages[1].text().starts_with("Source: profile.pdf\n\n"));

        let hits = store
            .match_documents(&[1.0, 0.0], 0.0, 5, &["Commercials".to_string()])
            .await
            .unwrap();
        assert_eq!(hits[0].chunk.metadata["sha256"], "abc123");
    }

    #[tokio::test]
    async fn ingest_with_no_chunks_stores_nothing() {
        let llm = ScriptedProvider::new(vec![ChatMessage::assistant("[]")]);
        let path = std::env::temp_dir().join(format!("rfpgenie-ingest-{}.db", uuid::Uuid::new_v4()));
        let store = SqliteRagStore::with_path(path).await.unwrap();

        let count = ingest_document(
            &llm,
            &store,
            &LlmSettings::default(),
            IngestRequest { file_name: "empty.txt", sha256: "0", text: "coffee" },
        )
        .await
        .unwrap();
        assert_eq!(count, 0);
    }
}
