//! The `query_collections` tool: similarity search over the knowledge base
//! restricted to a set of collections.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::tool_loop::AgentTool;
use crate::core::errors::ApiError;
use crate::llm::{LlmProvider, ToolDefinition};
use crate::rag::RagStore;

pub const QUERY_TOOL_NAME: &str = "query_collections";

pub const NO_COLLECTIONS_MESSAGE: &str = "No collections were specified for the query.";
pub const NO_RESULTS_MESSAGE: &str =
    "No relevant information was found in the knowledge base for the specified query and collections.";
pub const QUERY_FAILED_MESSAGE: &str = "An error occurred while trying to query the knowledge base.";

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Deserialize)]
struct QueryArgs {
    query: String,
    #[serde(default)]
    collections: Vec<String>,
}

pub struct RetrievalTool {
    llm: Arc<dyn LlmProvider>,
    store: Arc<dyn RagStore>,
    embedding_model: String,
    match_threshold: f32,
    match_count: usize,
}

impl RetrievalTool {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        store: Arc<dyn RagStore>,
        embedding_model: impl Into<String>,
        match_threshold: f32,
        match_count: usize,
    ) -> Self {
        Self {
            llm,
            store,
            embedding_model: embedding_model.into(),
            match_threshold,
            match_count,
        }
    }

    /// Never fails: problems are described in the returned text.
    pub async fn query_collections(&self, query: &str, collections: &[String]) -> String {
        tracing::info!("[RAG_TOOL] Query '{}' over collections {:?}", query, collections);

        if collections.is_empty() {
            tracing::warn!("[RAG_TOOL] No collections specified. Aborting query.");
            return NO_COLLECTIONS_MESSAGE.to_string();
        }

        match self.search(query, collections).await {
            Ok(Some(context)) => context,
            Ok(None) => {
                tracing::info!("[RAG_TOOL] No matching documents found.");
                NO_RESULTS_MESSAGE.to_string()
            }
            Err(err) => {
                tracing::error!("[RAG_TOOL] Knowledge base query failed: {}", err);
                QUERY_FAILED_MESSAGE.to_string()
            }
        }
    }

    async fn search(&self, query: &str, collections: &[String]) -> Result<Option<String>, ApiError> {
        let embedding = self
            .llm
            .embed(&[query.to_string()], &self.embedding_model)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Internal("Embedding provider returned no vector".to_string()))?;

        let hits = self
            .store
            .match_documents(&embedding, self.match_threshold, self.match_count, collections)
            .await?;
        if hits.is_empty() {
            return Ok(None);
        }

        for (i, hit) in hits.iter().enumerate() {
            tracing::info!(
                "[RAG_TOOL] Chunk {} similarity {:.4}, source {}",
                i + 1,
                hit.similarity,
                hit.chunk.source().unwrap_or("N/A")
            );
        }

        let context = hits
            .into_iter()
            .map(|hit| hit.chunk.content)
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);
        Ok(Some(context))
    }
}

#[async_trait]
impl AgentTool for RetrievalTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            QUERY_TOOL_NAME,
            "Queries one or more collections of the knowledge base with a search query and returns the most relevant snippets.",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query to find relevant context."
                    },
                    "collections": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Collection names to search within."
                    }
                },
                "required": ["query", "collections"]
            }),
        )
    }

    async fn call(&self, arguments: &str) -> String {
        match serde_json::from_str::<QueryArgs>(arguments) {
            Ok(args) => self.query_collections(&args.query, &args.collections).await,
            Err(err) => {
                tracing::warn!("[RAG_TOOL] Invalid arguments {}: {}", arguments, err);
                format!("Invalid arguments for {}: {}", QUERY_TOOL_NAME, err)
            }
        }
    }
}
