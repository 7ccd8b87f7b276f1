use sqlx::sqlite::SqliteRow;
use sqlx::types::Json;
use sqlx::Row;

use super::models::{NewTemplate, Template, TemplateUpdate};
use super::Database;
use crate::core::errors::ApiError;

fn row_to_template(row: &SqliteRow) -> Result<Template, sqlx::Error> {
    let Json(sections) = row.try_get::<Json<Vec<String>>, _>("sections")?;
    Ok(Template {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        sections,
    })
}

impl Database {
    pub async fn list_templates(&self) -> Result<Vec<Template>, ApiError> {
        let rows = sqlx::query("SELECT * FROM templates ORDER BY id")
            .fetch_all(self.pool())
            .await
            .map_err(ApiError::internal)?;
        rows.iter()
            .map(row_to_template)
            .collect::<Result<_, _>>()
            .map_err(ApiError::internal)
    }

    pub async fn get_template(&self, id: i64) -> Result<Option<Template>, ApiError> {
        let row = sqlx::query("SELECT * FROM templates WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(ApiError::internal)?;
        row.as_ref()
            .map(row_to_template)
            .transpose()
            .map_err(ApiError::internal)
    }

    pub async fn create_template(&self, template: NewTemplate) -> Result<Template, ApiError> {
        let id = sqlx::query("INSERT INTO templates (name, description, sections) VALUES (?, ?, ?)")
            .bind(&template.name)
            .bind(&template.description)
            .bind(Json(&template.sections))
            .execute(self.pool())
            .await
            .map_err(ApiError::internal)?
            .last_insert_rowid();

        Ok(Template {
            id,
            name: template.name,
            description: template.description,
            sections: template.sections,
        })
    }

    pub async fn update_template(&self, id: i64, update: TemplateUpdate) -> Result<Option<Template>, ApiError> {
        let Some(mut template) = self.get_template(id).await? else {
            return Ok(None);
        };
        if let Some(name) = update.name {
            template.name = name;
        }
        if let Some(description) = update.description {
            template.description = description;
        }
        if let Some(sections) = update.sections {
            template.sections = sections;
        }

        sqlx::query("UPDATE templates SET name = ?, description = ?, sections = ? WHERE id = ?")
            .bind(&template.name)
            .bind(&template.description)
            .bind(Json(&template.sections))
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(ApiError::internal)?;

        Ok(Some(template))
    }

    /// Names of proposals using the template that have no final content yet.
    pub async fn draft_proposals_using_template(&self, template_id: i64) -> Result<Vec<String>, ApiError> {
        sqlx::query_scalar(
            "SELECT name FROM proposals WHERE template_id = ? AND final_rfp_json IS NULL ORDER BY id",
        )
        .bind(template_id)
        .fetch_all(self.pool())
        .await
        .map_err(ApiError::internal)
    }

    /// Deletes the template and every proposal built from it. Returns the
    /// scope document paths of the removed proposals, or `None` when the
    /// template does not exist.
    pub async fn delete_template(&self, id: i64) -> Result<Option<Vec<String>>, ApiError> {
        let mut tx = self.pool().begin().await.map_err(ApiError::internal)?;

        let scope_paths: Vec<Option<String>> = sqlx::query_scalar(
            "DELETE FROM proposals WHERE template_id = ? RETURNING scope_document_path",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .map_err(ApiError::internal)?;

        let result = sqlx::query("DELETE FROM templates WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }

        tx.commit().await.map_err(ApiError::internal)?;
        Ok(Some(scope_paths.into_iter().flatten().collect()))
    }
}
