use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::models::{NewSection, Section, SectionUpdate};
use super::Database;
use crate::core::errors::ApiError;

fn row_to_section(row: &SqliteRow) -> Result<Section, sqlx::Error> {
    Ok(Section {
        id: row.try_get("id")?,
        section_name: row.try_get("section_name")?,
        description: row.try_get("description")?,
        category: row.try_get("category")?,
        is_custom: row.try_get("is_custom")?,
    })
}

impl Database {
    pub async fn list_sections(&self) -> Result<Vec<Section>, ApiError> {
        let rows = sqlx::query("SELECT * FROM sections ORDER BY id")
            .fetch_all(self.pool())
            .await
            .map_err(ApiError::internal)?;
        rows.iter()
            .map(row_to_section)
            .collect::<Result<_, _>>()
            .map_err(ApiError::internal)
    }

    pub async fn get_section(&self, id: i64) -> Result<Option<Section>, ApiError> {
        let row = sqlx::query("SELECT * FROM sections WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(ApiError::internal)?;
        row.as_ref()
            .map(row_to_section)
            .transpose()
            .map_err(ApiError::internal)
    }

    pub async fn create_section(&self, section: NewSection) -> Result<Section, ApiError> {
        let id = sqlx::query(
            "INSERT INTO sections (section_name, description, category, is_custom) VALUES (?, ?, ?, ?)",
        )
        .bind(&section.section_name)
        .bind(&section.description)
        .bind(&section.category)
        .bind(section.is_custom)
        .execute(self.pool())
        .await
        .map_err(ApiError::internal)?
        .last_insert_rowid();

        Ok(Section {
            id,
            section_name: section.section_name,
            description: section.description,
            category: section.category,
            is_custom: section.is_custom,
        })
    }

    pub async fn update_section(&self, id: i64, update: SectionUpdate) -> Result<Option<Section>, ApiError> {
        let Some(mut section) = self.get_section(id).await? else {
            return Ok(None);
        };
        if let Some(name) = update.section_name {
            section.section_name = name;
        }
        if let Some(description) = update.description {
            section.description = description;
        }
        if let Some(category) = update.category {
            section.category = category;
        }
        if let Some(is_custom) = update.is_custom {
            section.is_custom = is_custom;
        }

        sqlx::query(
            "UPDATE sections SET section_name = ?, description = ?, category = ?, is_custom = ? WHERE id = ?",
        )
        .bind(&section.section_name)
        .bind(&section.description)
        .bind(&section.category)
        .bind(section.is_custom)
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(ApiError::internal)?;

        Ok(Some(section))
    }

    pub async fn delete_section(&self, id: i64) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM sections WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(ApiError::internal)?;
        Ok(result.rows_affected() > 0)
    }
}
