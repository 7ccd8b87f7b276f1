//! Typed view over the merged YAML configuration.
//!
//! Every field has a default so an empty config still boots a local server
//! backed by SQLite for both the relational data and the vector store.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::paths::AppPaths;
use crate::core::errors::ApiError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub llm: LlmSettings,
    pub rag: RagSettings,
    pub agent: AgentSettings,
    pub uploads: UploadSettings,
}

impl Settings {
    pub fn from_value(value: &Value) -> Result<Self, ApiError> {
        serde_json::from_value(value.clone())
            .map_err(|e| ApiError::BadRequest(format!("Invalid configuration: {}", e)))
    }

    pub fn database_url(&self, paths: &AppPaths) -> String {
        match &self.database.url {
            Some(url) if !url.trim().is_empty() => url.clone(),
            _ => format!("sqlite://{}?mode=rwc", paths.db_path.to_string_lossy()),
        }
    }

    pub fn upload_dir(&self, paths: &AppPaths) -> PathBuf {
        match &self.uploads.dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => paths.user_data_dir.join(dir),
            None => paths.upload_dir.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: Option<String>,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub ingestion_model: String,
    pub draft_model: String,
    pub final_generation_model: String,
    pub embedding_model: String,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            api_key: None,
            ingestion_model: "gpt-4o-mini".to_string(),
            draft_model: "gpt-4-turbo".to_string(),
            final_generation_model: "gpt-4-turbo".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            timeout_secs: 180,
        }
    }
}

impl std::fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "****"))
            .field("ingestion_model", &self.ingestion_model)
            .field("draft_model", &self.draft_model)
            .field("final_generation_model", &self.final_generation_model)
            .field("embedding_model", &self.embedding_model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RagBackend {
    #[default]
    Sqlite,
    Supabase,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    pub backend: RagBackend,
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
    pub match_threshold: f32,
    pub match_count: usize,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            backend: RagBackend::Sqlite,
            supabase_url: None,
            supabase_key: None,
            match_threshold: 0.3,
            match_count: 5,
        }
    }
}

impl std::fmt::Debug for RagSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagSettings")
            .field("backend", &self.backend)
            .field("supabase_url", &self.supabase_url)
            .field("supabase_key", &self.supabase_key.as_ref().map(|_| "****"))
            .field("match_threshold", &self.match_threshold)
            .field("match_count", &self.match_count)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub regeneration_max_turns: usize,
    pub final_max_turns: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            regeneration_max_turns: 3,
            final_max_turns: 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    pub dir: Option<PathBuf>,
    pub max_upload_bytes: usize,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            dir: None,
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}
