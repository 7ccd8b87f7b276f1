use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor};

use super::models::{ProposalSectionDetail, SectionVersion};
use super::{now, Database};
use crate::core::errors::ApiError;

fn row_to_version(row: &SqliteRow) -> Result<SectionVersion, sqlx::Error> {
    Ok(SectionVersion {
        id: row.try_get("id")?,
        proposal_section_id: row.try_get("proposal_section_id")?,
        version_number: row.try_get("version_number")?,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Appends `max + 1` in a single statement so the read of the current
/// maximum and the insert share one write lock.
async fn insert_next_version<'e, E>(
    executor: E,
    section_id: i64,
    content: &str,
) -> Result<SectionVersion, ApiError>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(
        "INSERT INTO section_versions (proposal_section_id, version_number, content, created_at)
         SELECT ?, COALESCE(MAX(version_number), 0) + 1, ?, ?
         FROM section_versions WHERE proposal_section_id = ?
         RETURNING *",
    )
    .bind(section_id)
    .bind(content)
    .bind(now())
    .bind(section_id)
    .fetch_one(executor)
    .await
    .map_err(ApiError::internal)?;

    row_to_version(&row).map_err(ApiError::internal)
}

impl Database {
    pub async fn list_versions(&self, section_id: i64) -> Result<Vec<SectionVersion>, ApiError> {
        let rows = sqlx::query(
            "SELECT * FROM section_versions WHERE proposal_section_id = ? ORDER BY version_number",
        )
        .bind(section_id)
        .fetch_all(self.pool())
        .await
        .map_err(ApiError::internal)?;
        rows.iter()
            .map(row_to_version)
            .collect::<Result<_, _>>()
            .map_err(ApiError::internal)
    }

    pub async fn get_version(&self, id: i64) -> Result<Option<SectionVersion>, ApiError> {
        let row = sqlx::query("SELECT * FROM section_versions WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(ApiError::internal)?;
        row.as_ref()
            .map(row_to_version)
            .transpose()
            .map_err(ApiError::internal)
    }

    pub async fn add_version(&self, section_id: i64, content: &str) -> Result<SectionVersion, ApiError> {
        insert_next_version(self.pool(), section_id, content).await
    }

    /// Edits a version in place; the version number is unchanged.
    pub async fn update_version_content(&self, id: i64, content: &str) -> Result<Option<SectionVersion>, ApiError> {
        let result = sqlx::query("UPDATE section_versions SET content = ? WHERE id = ?")
            .bind(content)
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(ApiError::internal)?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_version(id).await
    }

    /// Stores a generated draft: each named section is reused when it
    /// already exists on the proposal (or created otherwise) and receives a
    /// new version. Runs as one transaction.
    pub async fn save_draft(
        &self,
        proposal_id: i64,
        draft: &[(String, String)],
    ) -> Result<Vec<ProposalSectionDetail>, ApiError> {
        let mut tx = self.pool().begin().await.map_err(ApiError::internal)?;

        for (section_name, content) in draft {
            // Writing first takes the lock for the rest of the transaction.
            sqlx::query(
                "INSERT INTO proposal_sections (proposal_id, section_name, collection_mappings, custom_prompt)
                 SELECT ?, ?, '[]', ''
                 WHERE NOT EXISTS (
                     SELECT 1 FROM proposal_sections WHERE proposal_id = ? AND section_name = ?
                 )",
            )
            .bind(proposal_id)
            .bind(section_name)
            .bind(proposal_id)
            .bind(section_name)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;

            let section_id: i64 = sqlx::query_scalar(
                "SELECT id FROM proposal_sections WHERE proposal_id = ? AND section_name = ? ORDER BY id LIMIT 1",
            )
            .bind(proposal_id)
            .bind(section_name)
            .fetch_one(&mut *tx)
            .await
            .map_err(ApiError::internal)?;

            insert_next_version(&mut *tx, section_id, content).await?;
        }

        tx.commit().await.map_err(ApiError::internal)?;
        tracing::info!("Saved draft with {} sections for proposal {}", draft.len(), proposal_id);
        self.list_proposal_sections(proposal_id).await
    }
}
