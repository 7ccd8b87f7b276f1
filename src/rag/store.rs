//! RagStore trait: abstract interface for the collection-partitioned
//! vector store that backs retrieval.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::errors::ApiError;

/// A categorized snippet produced by ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// One of the collection categories.
    pub collection: String,
    pub content: String,
    /// Always carries `source` (the uploaded file name).
    pub metadata: Value,
}

impl DocumentChunk {
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(|v| v.as_str())
    }
}

/// Result of a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMatch {
    pub chunk: DocumentChunk,
    /// Cosine similarity (higher = better).
    pub similarity: f32,
}

/// One stored chunk reduced to its (source, collection) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionEntry {
    pub source: String,
    pub collection: String,
}

/// Chunk counts per collection for a single uploaded source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub source: String,
    pub collections: BTreeMap<String, usize>,
}

#[async_trait]
pub trait RagStore: Send + Sync {
    /// Backend name for logs and `/health`.
    fn name(&self) -> &str;

    /// Insert chunks with their embeddings (same length, same order).
    async fn insert_batch(&self, items: Vec<(DocumentChunk, Vec<f32>)>) -> Result<(), ApiError>;

    /// Similarity search restricted to `collections`. Results are filtered by
    /// `threshold`, sorted by descending similarity and capped at `count`.
    async fn match_documents(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        count: usize,
        collections: &[String],
    ) -> Result<Vec<ChunkMatch>, ApiError>;

    /// Number of chunks whose `metadata.source` equals `source`.
    async fn count_source(&self, source: &str) -> Result<usize, ApiError>;

    /// Every stored chunk as a (source, collection) pair.
    async fn list_entries(&self) -> Result<Vec<CollectionEntry>, ApiError>;

    /// Contents of the chunks of one source within one collection.
    async fn chunks_for(&self, source: &str, collection: &str) -> Result<Vec<String>, ApiError>;

    /// Delete every chunk of a source, returning how many were removed.
    async fn delete_source(&self, source: &str) -> Result<usize, ApiError>;
}

pub fn group_by_source(entries: &[CollectionEntry]) -> Vec<SourceSummary> {
    let mut grouped: BTreeMap<&str, BTreeMap<String, usize>> = BTreeMap::new();
    for entry in entries {
        *grouped
            .entry(entry.source.as_str())
            .or_default()
            .entry(entry.collection.clone())
            .or_default() += 1;
    }

    grouped
        .into_iter()
        .map(|(source, collections)| SourceSummary {
            source: source.to_string(),
            collections,
        })
        .collect()
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;

    if denom <= f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}
