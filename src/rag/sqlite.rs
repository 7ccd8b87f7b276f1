//! SQLite-backed RAG store.
//!
//! Local vector store using SQLite for the chunks and brute-force cosine
//! similarity for search. Used when no Supabase project is configured.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use super::store::{cosine_similarity, ChunkMatch, CollectionEntry, DocumentChunk, RagStore};
use crate::core::errors::ApiError;

pub struct SqliteRagStore {
    pool: SqlitePool,
}

impl SqliteRagStore {
    pub async fn with_path(db_path: PathBuf) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(ApiError::internal)?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                content TEXT NOT NULL,
                source TEXT NOT NULL DEFAULT '',
                metadata TEXT NOT NULL DEFAULT '{}',
                embedding BLOB,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_source ON documents(source)")
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection)")
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> Result<DocumentChunk, sqlx::Error> {
        let metadata_str: String = row.try_get("metadata")?;
        let metadata = serde_json::from_str::<Value>(&metadata_str)
            .unwrap_or_else(|_| Value::Object(Default::default()));

        Ok(DocumentChunk {
            collection: row.try_get("collection")?,
            content: row.try_get("content")?,
            metadata,
        })
    }
}

#[async_trait]
impl RagStore for SqliteRagStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn insert_batch(&self, items: Vec<(DocumentChunk, Vec<f32>)>) -> Result<(), ApiError> {
        if items.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        for (chunk, embedding) in &items {
            let blob = Self::serialize_embedding(embedding);
            let metadata_str = serde_json::to_string(&chunk.metadata).map_err(ApiError::internal)?;

            sqlx::query(
                "INSERT INTO documents (collection, content, source, metadata, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(&chunk.collection)
            .bind(&chunk.content)
            .bind(chunk.source().unwrap_or_default())
            .bind(&metadata_str)
            .bind(&blob)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        }

        tx.commit().await.map_err(ApiError::internal)?;
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

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT collection, content, metadata, embedding FROM documents WHERE collection IN (",
        );
        let mut separated = builder.separated(", ");
        for collection in collections {
            separated.push_bind(collection);
        }
        separated.push_unseparated(")");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        let mut scored = Vec::new();
        for row in &rows {
            let embedding_bytes: Option<Vec<u8>> = row.try_get("embedding").map_err(ApiError::internal)?;
            let Some(bytes) = embedding_bytes.filter(|b| !b.is_empty()) else {
                continue;
            };
            let similarity = cosine_similarity(query_embedding, &Self::deserialize_embedding(&bytes));
            if similarity < threshold {
                continue;
            }
            scored.push(ChunkMatch {
                chunk: Self::row_to_chunk(row).map_err(ApiError::internal)?,
                similarity,
            });
        }

        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(count);

        Ok(scored)
    }

    async fn count_source(&self, source: &str) -> Result<usize, ApiError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE source = ?1")
            .bind(source)
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(count as usize)
    }

    async fn list_entries(&self) -> Result<Vec<CollectionEntry>, ApiError> {
        let rows = sqlx::query("SELECT source, collection FROM documents ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        rows.iter()
            .map(|row| {
                Ok(CollectionEntry {
                    source: row.try_get("source")?,
                    collection: row.try_get("collection")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(ApiError::internal)
    }

    async fn chunks_for(&self, source: &str, collection: &str) -> Result<Vec<String>, ApiError> {
        sqlx::query_scalar(
            "SELECT content FROM documents WHERE source = ?1 AND collection = ?2 ORDER BY id",
        )
        .bind(source)
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)
    }

    async fn delete_source(&self, source: &str) -> Result<usize, ApiError> {
        let result = sqlx::query("DELETE FROM documents WHERE source = ?1")
            .bind(source)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(result.rows_affected() as usize)
    }
}
