use sqlx::sqlite::SqliteRow;
use sqlx::types::Json;
use sqlx::Row;

use super::models::{
    NewProposal, Proposal, ProposalDetail, ProposalSection, ProposalSectionDetail,
    ProposalSectionUpdate, ProposalUpdate,
};
use super::Database;
use crate::core::errors::ApiError;

const PROPOSAL_COLUMNS: &str = "p.id, p.name, p.description, p.client_name, p.scope_document_path, \
     p.template_id, p.final_rfp_json, \
     EXISTS (SELECT 1 FROM section_versions v \
             JOIN proposal_sections s ON v.proposal_section_id = s.id \
             WHERE s.proposal_id = p.id) AS draft_rfp_json";

fn row_to_proposal(row: &SqliteRow) -> Result<Proposal, sqlx::Error> {
    Ok(Proposal {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        client_name: row.try_get("client_name")?,
        scope_document_path: row.try_get("scope_document_path")?,
        template_id: row.try_get("template_id")?,
        final_rfp_json: row.try_get("final_rfp_json")?,
        draft_rfp_json: row.try_get("draft_rfp_json")?,
    })
}

pub(super) fn row_to_proposal_section(row: &SqliteRow) -> Result<ProposalSection, sqlx::Error> {
    let Json(collection_mappings) = row.try_get::<Json<Vec<String>>, _>("collection_mappings")?;
    Ok(ProposalSection {
        id: row.try_get("id")?,
        proposal_id: row.try_get("proposal_id")?,
        section_name: row.try_get("section_name")?,
        collection_mappings,
        custom_prompt: row.try_get("custom_prompt")?,
    })
}

impl Database {
    pub async fn list_proposals(&self) -> Result<Vec<Proposal>, ApiError> {
        let rows = sqlx::query(&format!("SELECT {} FROM proposals p ORDER BY p.id", PROPOSAL_COLUMNS))
            .fetch_all(self.pool())
            .await
            .map_err(ApiError::internal)?;
        rows.iter()
            .map(row_to_proposal)
            .collect::<Result<_, _>>()
            .map_err(ApiError::internal)
    }

    pub async fn get_proposal(&self, id: i64) -> Result<Option<Proposal>, ApiError> {
        let row = sqlx::query(&format!("SELECT {} FROM proposals p WHERE p.id = ?", PROPOSAL_COLUMNS))
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(ApiError::internal)?;
        row.as_ref()
            .map(row_to_proposal)
            .transpose()
            .map_err(ApiError::internal)
    }

    /// The proposal with its sections and their versions.
    pub async fn get_proposal_detail(&self, id: i64) -> Result<Option<ProposalDetail>, ApiError> {
        let Some(proposal) = self.get_proposal(id).await? else {
            return Ok(None);
        };
        let proposal_sections = self.list_proposal_sections(id).await?;
        Ok(Some(ProposalDetail {
            proposal,
            proposal_sections,
        }))
    }

    pub async fn create_proposal(&self, proposal: NewProposal) -> Result<Proposal, ApiError> {
        if self.get_template(proposal.template_id).await?.is_none() {
            return Err(ApiError::NotFound("Template not found".to_string()));
        }

        let id = sqlx::query(
            "INSERT INTO proposals (name, description, client_name, scope_document_path, template_id)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&proposal.name)
        .bind(&proposal.description)
        .bind(&proposal.client_name)
        .bind(&proposal.scope_document_path)
        .bind(proposal.template_id)
        .execute(self.pool())
        .await
        .map_err(ApiError::internal)?
        .last_insert_rowid();

        Ok(Proposal {
            id,
            name: proposal.name,
            description: proposal.description,
            client_name: proposal.client_name,
            scope_document_path: proposal.scope_document_path,
            template_id: proposal.template_id,
            final_rfp_json: None,
            draft_rfp_json: false,
        })
    }

    pub async fn update_proposal(&self, id: i64, update: ProposalUpdate) -> Result<Option<Proposal>, ApiError> {
        let Some(mut proposal) = self.get_proposal(id).await? else {
            return Ok(None);
        };
        if let Some(template_id) = update.template_id {
            if template_id != proposal.template_id && self.get_template(template_id).await?.is_none() {
                return Err(ApiError::NotFound("Template not found".to_string()));
            }
            proposal.template_id = template_id;
        }
        if let Some(name) = update.name {
            proposal.name = name;
        }
        if let Some(description) = update.description {
            proposal.description = description;
        }
        if let Some(client_name) = update.client_name {
            proposal.client_name = client_name;
        }
        if let Some(content) = update.final_rfp_json {
            proposal.final_rfp_json = Some(content);
        }

        sqlx::query(
            "UPDATE proposals SET name = ?, description = ?, client_name = ?, template_id = ?, final_rfp_json = ?
             WHERE id = ?",
        )
        .bind(&proposal.name)
        .bind(&proposal.description)
        .bind(&proposal.client_name)
        .bind(proposal.template_id)
        .bind(&proposal.final_rfp_json)
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(ApiError::internal)?;

        Ok(Some(proposal))
    }

    pub async fn set_final_content(&self, id: i64, content: &str) -> Result<Option<Proposal>, ApiError> {
        let result = sqlx::query("UPDATE proposals SET final_rfp_json = ? WHERE id = ?")
            .bind(content)
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(ApiError::internal)?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_proposal(id).await
    }

    /// Returns the deleted proposal so the caller can clean up its scope
    /// document.
    pub async fn delete_proposal(&self, id: i64) -> Result<Option<Proposal>, ApiError> {
        let Some(proposal) = self.get_proposal(id).await? else {
            return Ok(None);
        };
        sqlx::query("DELETE FROM proposals WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(ApiError::internal)?;
        Ok(Some(proposal))
    }

    pub async fn list_proposal_sections(&self, proposal_id: i64) -> Result<Vec<ProposalSectionDetail>, ApiError> {
        let rows = sqlx::query("SELECT * FROM proposal_sections WHERE proposal_id = ? ORDER BY id")
            .bind(proposal_id)
            .fetch_all(self.pool())
            .await
            .map_err(ApiError::internal)?;
        let sections: Vec<ProposalSection> = rows
            .iter()
            .map(row_to_proposal_section)
            .collect::<Result<_, _>>()
            .map_err(ApiError::internal)?;

        let mut details = Vec::with_capacity(sections.len());
        for section in sections {
            let versions = self.list_versions(section.id).await?;
            details.push(ProposalSectionDetail { section, versions });
        }
        Ok(details)
    }

    pub async fn get_proposal_section(&self, id: i64) -> Result<Option<ProposalSection>, ApiError> {
        let row = sqlx::query("SELECT * FROM proposal_sections WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(ApiError::internal)?;
        row.as_ref()
            .map(row_to_proposal_section)
            .transpose()
            .map_err(ApiError::internal)
    }

    pub async fn update_proposal_section(
        &self,
        id: i64,
        update: ProposalSectionUpdate,
    ) -> Result<Option<ProposalSection>, ApiError> {
        let Some(mut section) = self.get_proposal_section(id).await? else {
            return Ok(None);
        };
        if let Some(name) = update.section_name {
            section.section_name = name;
        }
        if let Some(mappings) = update.collection_mappings {
            section.collection_mappings = mappings;
        }
        if let Some(prompt) = update.custom_prompt {
            section.custom_prompt = prompt;
        }

        sqlx::query(
            "UPDATE proposal_sections SET section_name = ?, collection_mappings = ?, custom_prompt = ? WHERE id = ?",
        )
        .bind(&section.section_name)
        .bind(Json(&section.collection_mappings))
        .bind(&section.custom_prompt)
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(ApiError::internal)?;

        Ok(Some(section))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::NewTemplate;
    use crate::db::test_db;

    async fn seeded(db: &Database) -> Proposal {
        let template = db
            .create_template(NewTemplate {
                name: "Banking".to_string(),
                description: String::new(),
                sections: vec!["Executive Summary".to_string()],
            })
            .await
            .unwrap();
        db.create_proposal(NewProposal {
            name: "Bank Portal".to_string(),
            description: "Customer portal".to_string(),
            client_name: "Acme".to_string(),
            template_id: template.id,
            scope_document_path: Some("/tmp/scope.pdf".to_string()),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn create_requires_existing_template() {
        let db = test_db().await;
        let err = db
            .create_proposal(NewProposal {
                name: "Orphan".to_string(),
                description: String::new(),
                client_name: String::new(),
                template_id: 999,
                scope_document_path: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn proposal_crud_round_trip() {
        let db = test_db().await;
        let proposal = seeded(&db).await;

        let fetched = db.get_proposal(proposal.id).await.unwrap().unwrap();
        assert_eq!(fetched, proposal);
        assert!(!fetched.draft_rfp_json);

        let updated = db
            .update_proposal(
                proposal.id,
                ProposalUpdate {
                    client_name: Some("Acme Bank".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.client_name, "Acme Bank");
        assert_eq!(updated.name, "Bank Portal");

        let with_content = db.set_final_content(proposal.id, "<h2>Done</h2>").await.unwrap().unwrap();
        assert_eq!(with_content.final_rfp_json.as_deref(), Some("<h2>Done</h2>"));

        assert_eq!(db.list_proposals().await.unwrap().len(), 1);
        let deleted = db.delete_proposal(proposal.id).await.unwrap().unwrap();
        assert_eq!(deleted.scope_document_path.as_deref(), Some("/tmp/scope.pdf"));
        assert!(db.get_proposal(proposal.id).await.unwrap().is_none());
        assert!(db.delete_proposal(proposal.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn draft_flag_and_section_cascade() {
        let db = test_db().await;
        let proposal = seeded(&db).await;

        let sections = db
            .save_draft(
                proposal.id,
                &[("Executive Summary".to_string(), "Overview.".to_string())],
            )
            .await
            .unwrap();
        let section_id = sections[0].section.id;

        let detail = db.get_proposal_detail(proposal.id).await.unwrap().unwrap();
        assert!(detail.proposal.draft_rfp_json);
        assert_eq!(detail.proposal_sections.len(), 1);
        assert_eq!(detail.proposal_sections[0].versions[0].content, "Overview.");

        let updated = db
            .update_proposal_section(
                section_id,
                ProposalSectionUpdate {
                    collection_mappings: Some(vec!["Commercials".to_string()]),
                    custom_prompt: Some("Be brief".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.collection_mappings, vec!["Commercials"]);
        assert_eq!(
            db.get_proposal_section(section_id).await.unwrap().unwrap(),
            updated
        );

        db.delete_proposal(proposal.id).await.unwrap();
        assert!(db.get_proposal_section(section_id).await.unwrap().is_none());
        assert!(db.list_versions(section_id).await.unwrap().is_empty());
    }
}
