//! Supabase (PostgREST) backed RAG store.
//!
//! Chunks live in the `documents` table (`collection`, `content`,
//! `metadata` jsonb, `embedding` vector) and similarity search goes through
//! the `match_documents` RPC, which takes `query_embedding`,
//! `match_threshold`, `match_count` and `collection_filter`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};

use super::store::{ChunkMatch, CollectionEntry, DocumentChunk, RagStore};
use crate::core::errors::ApiError;

const TABLE_PATH: &str = "rest/v1/documents";
const MATCH_RPC_PATH: &str = "rest/v1/rpc/match_documents";
const SOURCE_FILTER: &str = "metadata->>source";

pub struct SupabaseRagStore {
    base_url: String,
    api_key: String,
    client: Client,
}

#[derive(Deserialize)]
struct MatchRow {
    #[serde(default)]
    collection: String,
    content: String,
    #[serde(default)]
    metadata: Value,
    #[serde(default)]
    similarity: f32,
}

#[derive(Deserialize)]
struct EntryRow {
    #[serde(default)]
    collection: String,
    #[serde(default)]
    metadata: Value,
}

#[derive(Deserialize)]
struct ContentRow {
    content: String,
}

impl SupabaseRagStore {
    pub fn new(url: &str, api_key: &str, timeout_secs: u64) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(ApiError::internal)?;

        Ok(Self {
            base_url: url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn send(builder: RequestBuilder, what: &str) -> Result<Response, ApiError> {
        let res = builder.send().await.map_err(ApiError::internal)?;
        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Internal(format!(
                "Supabase {} failed ({}): {}",
                what, status, text
            )));
        }
        Ok(res)
    }

    fn source_eq(source: &str) -> (&'static str, String) {
        (SOURCE_FILTER, format!("eq.{}", source))
    }
}

/// Total from a PostgREST `Content-Range` header such as `0-4/5` or `*/0`.
pub(crate) fn parse_content_range_total(header: &str) -> Option<usize> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}

fn source_of(metadata: &Value) -> String {
    metadata
        .get("source")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl RagStore for SupabaseRagStore {
    fn name(&self) -> &str {
        "supabase"
    }

    async fn insert_batch(&self, items: Vec<(DocumentChunk, Vec<f32>)>) -> Result<(), ApiError> {
        if items.is_empty() {
            return Ok(());
        }

        let rows: Vec<Value> = items
            .into_iter()
            .map(|(chunk, embedding)| {
                json!({
                    "collection": chunk.collection,
                    "content": chunk.content,
                    "metadata": chunk.metadata,
                    "embedding": embedding,
                })
            })
            .collect();

        let builder = self
            .authorized(self.client.post(self.url(TABLE_PATH)))
            .header("Prefer", "return=minimal")
            .json(&rows);
        Self::send(builder, "insert").await?;
        Ok(())
    }

    async fn match_documents(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        count: usize,
        collections: &[String],
    ) -> Result<Vec<ChunkMatch>, ApiError> {
        if collections.is_empty() || count == 0 {
            return Ok(Vec::new());
        }

        let params = json!({
            "query_embedding": query_embedding,
            "match_threshold": threshold,
            "match_count": count,
            "collection_filter": collections,
        });
        let builder = self
            .authorized(self.client.post(self.url(MATCH_RPC_PATH)))
            .json(&params);
        let rows: Vec<MatchRow> = Self::send(builder, "match_documents")
            .await?
            .json()
            .await
            .map_err(ApiError::internal)?;

        let mut matches: Vec<ChunkMatch> = rows
            .into_iter()
            .map(|row| ChunkMatch {
                chunk: DocumentChunk {
                    collection: row.collection,
                    content: row.content,
                    metadata: row.metadata,
                },
                similarity: row.similarity,
            })
            .collect();
        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(count);
        Ok(matches)
    }

    async fn count_source(&self, source: &str) -> Result<usize, ApiError> {
        let builder = self
            .authorized(self.client.head(self.url(TABLE_PATH)))
            .header("Prefer", "count=exact")
            .query(&[("select", "id".to_string()), Self::source_eq(source)]);
        let res = Self::send(builder, "count").await?;

        let header = res
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Internal("Supabase count returned no Content-Range".to_string()))?;
        parse_content_range_total(header)
            .ok_or_else(|| ApiError::Internal(format!("Unparsable Content-Range: {}", header)))
    }

    async fn list_entries(&self) -> Result<Vec<CollectionEntry>, ApiError> {
        let builder = self
            .authorized(self.client.get(self.url(TABLE_PATH)))
            .query(&[("select", "collection,metadata")]);
        let rows: Vec<EntryRow> = Self::send(builder, "list")
            .await?
            .json()
            .await
            .map_err(ApiError::internal)?;

        Ok(rows
            .into_iter()
            .map(|row| CollectionEntry {
                source: source_of(&row.metadata),
                collection: row.collection,
            })
            .collect())
    }

    async fn chunks_for(&self, source: &str, collection: &str) -> Result<Vec<String>, ApiError> {
        let builder = self
            .authorized(self.client.get(self.url(TABLE_PATH)))
            .query(&[
                ("select", "content".to_string()),
                Self::source_eq(source),
                ("collection", format!("eq.{}", collection)),
            ]);
        let rows: Vec<ContentRow> = Self::send(builder, "chunks")
            .await?
            .json()
            .await
            .map_err(ApiError::internal)?;

        Ok(rows.into_iter().map(|row| row.content).collect())
    }

    async fn delete_source(&self, source: &str) -> Result<usize, ApiError> {
        let builder = self
            .authorized(self.client.delete(self.url(TABLE_PATH)))
            .header("Prefer", "return=representation")
            .query(&[("select", "id".to_string()), Self::source_eq(source)]);
        let deleted: Vec<Value> = Self::send(builder, "delete")
            .await?
            .json()
            .await
            .map_err(ApiError::internal)?;

        Ok(deleted.len())
    }
}
