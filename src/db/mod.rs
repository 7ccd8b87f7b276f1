//! Relational store for the section catalog, templates, proposals, their
//! sections and versions, and approvals.

pub mod approvals;
pub mod models;
pub mod proposals;
pub mod sections;
pub mod templates;
pub mod versions;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

use crate::core::errors::ApiError;

/// Catalog entries inserted when the `sections` table is empty.
pub const DEFAULT_SECTIONS: [(&str, &str); 9] = [
    ("Executive Summary", "A brief overview of the entire proposal."),
    (
        "Project objectives and background Information",
        "The goals and context of the project.",
    ),
    (
        "Functional and Technical Solution",
        "The proposed solution's functional and technical aspects.",
    ),
    (
        "Project Deliverables, Timelines and Outcome",
        "What will be delivered, when, and what the expected outcomes are.",
    ),
    ("Commercials and value proposition", "The pricing and the value offered."),
    ("Company Profile", "Information about the company."),
    ("Client Reference and Case Studies", "References and examples of past work."),
    ("Why Us", "Reasons to choose us."),
    ("Appendices", "Additional supporting documents."),
];

const SCHEMA: [&str; 10] = [
    "CREATE TABLE IF NOT EXISTS sections (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        section_name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        category TEXT NOT NULL DEFAULT 'General',
        is_custom INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS templates (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        sections TEXT NOT NULL DEFAULT '[]'
    )",
    "CREATE TABLE IF NOT EXISTS proposals (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        client_name TEXT NOT NULL DEFAULT '',
        scope_document_path TEXT,
        template_id INTEGER NOT NULL,
        final_rfp_json TEXT,
        FOREIGN KEY(template_id) REFERENCES templates(id) ON DELETE CASCADE
    )",
    "CREATE TABLE IF NOT EXISTS proposal_sections (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        proposal_id INTEGER NOT NULL,
        section_name TEXT NOT NULL,
        collection_mappings TEXT NOT NULL DEFAULT '[]',
        custom_prompt TEXT NOT NULL DEFAULT '',
        FOREIGN KEY(proposal_id) REFERENCES proposals(id) ON DELETE CASCADE
    )",
    "CREATE TABLE IF NOT EXISTS section_versions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        proposal_section_id INTEGER NOT NULL,
        version_number INTEGER NOT NULL,
        content TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE(proposal_section_id, version_number),
        FOREIGN KEY(proposal_section_id) REFERENCES proposal_sections(id) ON DELETE CASCADE
    )",
    "CREATE TABLE IF NOT EXISTS approvals (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        proposal_id INTEGER NOT NULL,
        approved_by TEXT NOT NULL,
        approved_at TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        comments TEXT,
        FOREIGN KEY(proposal_id) REFERENCES proposals(id) ON DELETE CASCADE
    )",
    "CREATE INDEX IF NOT EXISTS idx_proposals_template_id ON proposals(template_id)",
    "CREATE INDEX IF NOT EXISTS idx_proposal_sections_proposal_id ON proposal_sections(proposal_id)",
    "CREATE INDEX IF NOT EXISTS idx_section_versions_section_id ON section_versions(proposal_section_id)",
    "CREATE INDEX IF NOT EXISTS idx_approvals_proposal_id ON approvals(proposal_id)",
];

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connects to a `sqlite://` URL, creates the schema and seeds the
    /// section catalog.
    pub async fn connect(url: &str) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| ApiError::internal(format!("Invalid database url: {}", e)))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to connect to database: {}", e)))?;

        let db = Self { pool };
        db.init_schema().await?;
        db.seed_sections().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| ApiError::internal(format!("Failed to init schema: {}", e)))?;
        }
        Ok(())
    }

    async fn seed_sections(&self) -> Result<(), ApiError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sections")
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        if count > 0 {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;
        for (name, description) in DEFAULT_SECTIONS {
            sqlx::query(
                "INSERT INTO sections (section_name, description, category, is_custom) VALUES (?, ?, 'General', 0)",
            )
            .bind(name)
            .bind(description)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        }
        tx.commit().await.map_err(ApiError::internal)?;

        tracing::info!("Seeded {} default sections", DEFAULT_SECTIONS.len());
        Ok(())
    }
}

pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
pub(crate) async fn test_db() -> Database {
    let path = std::env::temp_dir().join(format!("rfpgenie-db-test-{}.db", uuid::Uuid::new_v4()));
    Database::connect(&format!("sqlite://{}", path.to_string_lossy()))
        .await
        .unwrap()
}
