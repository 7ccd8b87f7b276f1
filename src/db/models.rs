use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: i64,
    pub section_name: String,
    pub description: String,
    pub category: String,
    pub is_custom: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSection {
    pub section_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub is_custom: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SectionUpdate {
    pub section_name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub is_custom: Option<bool>,
}

fn default_category() -> String {
    "General".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: i64,
    pub name: String,
    pub description: String,
    /// Section names in proposal order.
    pub sections: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTemplate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub sections: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub sections: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub client_name: String,
    pub scope_document_path: Option<String>,
    pub template_id: i64,
    /// Final HTML once assembled or edited.
    pub final_rfp_json: Option<String>,
    /// True once any of its sections has a version.
    pub draft_rfp_json: bool,
}

#[derive(Debug, Clone)]
pub struct NewProposal {
    pub name: String,
    pub description: String,
    pub client_name: String,
    pub template_id: i64,
    pub scope_document_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProposalUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub client_name: Option<String>,
    pub template_id: Option<i64>,
    pub final_rfp_json: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProposalDetail {
    #[serde(flatten)]
    pub proposal: Proposal,
    pub proposal_sections: Vec<ProposalSectionDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalSection {
    pub id: i64,
    pub proposal_id: i64,
    pub section_name: String,
    pub collection_mappings: Vec<String>,
    pub custom_prompt: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProposalSectionUpdate {
    pub section_name: Option<String>,
    pub collection_mappings: Option<Vec<String>>,
    pub custom_prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProposalSectionDetail {
    #[serde(flatten)]
    pub section: ProposalSection,
    /// Sorted by version number.
    pub versions: Vec<SectionVersion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionVersion {
    pub id: i64,
    pub proposal_section_id: i64,
    pub version_number: i64,
    pub content: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }

    /// Only pending approvals can be decided, and only to a final state.
    pub fn can_transition_to(&self, next: ApprovalStatus) -> bool {
        matches!(
            (self, next),
            (ApprovalStatus::Pending, ApprovalStatus::Approved)
                | (ApprovalStatus::Pending, ApprovalStatus::Rejected)
        )
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalStatus {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "rejected" => Ok(ApprovalStatus::Rejected),
            other => Err(ApiError::Internal(format!("Unknown approval status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Approval {
    pub id: i64,
    pub proposal_id: i64,
    pub approved_by: String,
    pub approved_at: String,
    pub status: ApprovalStatus,
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewApproval {
    pub approved_by: String,
    #[serde(default)]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalDecision {
    pub status: ApprovalStatus,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
}
