use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::models::{Approval, ApprovalDecision, ApprovalStatus, NewApproval};
use super::{now, Database};
use crate::core::errors::ApiError;

fn row_to_approval(row: &SqliteRow) -> Result<Approval, ApiError> {
    let status: String = row.try_get("status").map_err(ApiError::internal)?;
    Ok(Approval {
        id: row.try_get("id").map_err(ApiError::internal)?,
        proposal_id: row.try_get("proposal_id").map_err(ApiError::internal)?,
        approved_by: row.try_get("approved_by").map_err(ApiError::internal)?,
        approved_at: row.try_get("approved_at").map_err(ApiError::internal)?,
        status: status.parse()?,
        comments: row.try_get("comments").map_err(ApiError::internal)?,
    })
}

impl Database {
    pub async fn list_approvals(&self, proposal_id: i64) -> Result<Vec<Approval>, ApiError> {
        let rows = sqlx::query("SELECT * FROM approvals WHERE proposal_id = ? ORDER BY id")
            .bind(proposal_id)
            .fetch_all(self.pool())
            .await
            .map_err(ApiError::internal)?;
        rows.iter().map(row_to_approval).collect()
    }

    pub async fn get_approval(&self, id: i64) -> Result<Option<Approval>, ApiError> {
        let row = sqlx::query("SELECT * FROM approvals WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(ApiError::internal)?;
        row.as_ref().map(row_to_approval).transpose()
    }

    /// Opens a pending approval request for the proposal.
    pub async fn create_approval(&self, proposal_id: i64, approval: NewApproval) -> Result<Approval, ApiError> {
        let approved_at = now();
        let status = ApprovalStatus::Pending;
        let id = sqlx::query(
            "INSERT INTO approvals (proposal_id, approved_by, approved_at, status, comments) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(proposal_id)
        .bind(&approval.approved_by)
        .bind(&approved_at)
        .bind(status.as_str())
        .bind(&approval.comments)
        .execute(self.pool())
        .await
        .map_err(ApiError::internal)?
        .last_insert_rowid();

        Ok(Approval {
            id,
            proposal_id,
            approved_by: approval.approved_by,
            approved_at,
            status,
            comments: approval.comments,
        })
    }

    /// Moves a pending approval to approved or rejected; any other
    /// transition is a conflict.
    pub async fn decide_approval(&self, id: i64, decision: ApprovalDecision) -> Result<Option<Approval>, ApiError> {
        let Some(mut approval) = self.get_approval(id).await? else {
            return Ok(None);
        };
        if !approval.status.can_transition_to(decision.status) {
            return Err(ApiError::Conflict(format!(
                "Approval {} cannot move from {} to {}",
                id, approval.status, decision.status
            )));
        }

        approval.status = decision.status;
        approval.approved_at = now();
        if let Some(by) = decision.approved_by {
            approval.approved_by = by;
        }
        if decision.comments.is_some() {
            approval.comments = decision.comments;
        }

        let result = sqlx::query(
            "UPDATE approvals SET status = ?, approved_at = ?, approved_by = ?, comments = ?
             WHERE id = ? AND status = 'pending'",
        )
        .bind(approval.status.as_str())
        .bind(&approval.approved_at)
        .bind(&approval.approved_by)
        .bind(&approval.comments)
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(ApiError::internal)?;

        if result.rows_affected() == 0 {
            return Err(ApiError::Conflict(format!("Approval {} was already decided", id)));
        }
        Ok(Some(approval))
    }

    pub async fn delete_approval(&self, id: i64) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM approvals WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(ApiError::internal)?;
        Ok(result.rows_affected() > 0)
    }
}
