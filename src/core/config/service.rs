use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use super::paths::AppPaths;
use super::settings::Settings;
use super::validation::validate_config;
use crate::core::errors::ApiError;

const REDACT_PLACEHOLDER: &str = "****";

const SENSITIVE_PATTERNS: [&str; 10] = [
    "api_key",
    "secret",
    "password",
    "_token",
    "token_",
    "credential",
    "private_key",
    "access_key",
    "supabase_key",
    "bearer",
];

const SENSITIVE_WHITELIST: [&str; 3] = ["max_tokens", "total_tokens", "max_upload_bytes"];

/// Environment variables honoured on top of the YAML files, mapped to the
/// config path they override.
const ENV_OVERRIDES: [(&str, &[&str]); 8] = [
    ("DATABASE_URL", &["database", "url"]),
    ("OPENAI_API_KEY", &["llm", "api_key"]),
    ("OPENAI_BASE_URL", &["llm", "base_url"]),
    ("FINAL_GENERATION_MODEL", &["llm", "final_generation_model"]),
    ("SUPABASE_RAG_URL", &["rag", "supabase_url"]),
    ("SUPABASE_RAG_KEY", &["rag", "supabase_key"]),
    ("RAG_MATCH_THRESHOLD", &["rag", "match_threshold"]),
    ("PORT", &["server", "port"]),
];

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("RFPGENIE_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        let user_config = self.paths.user_data_dir.join("config.yml");
        if user_config.exists() {
            return user_config;
        }

        self.paths.project_root.join("config.yml")
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.paths.secrets_path.clone()
    }

    /// Public config deep-merged with secrets, then environment overrides.
    pub fn load_config(&self) -> Result<Value, ApiError> {
        let public_config = load_yaml_file(&self.config_path());
        let secrets_config = load_yaml_file(&self.secrets_path());
        let mut merged = deep_merge(&public_config, &secrets_config);
        apply_env_overrides(&mut merged, |name| env::var(name).ok());
        validate_config(&merged)?;
        Ok(merged)
    }

    pub fn settings(&self) -> Result<Settings, ApiError> {
        let config = self.load_config()?;
        Settings::from_value(&config)
    }

    pub fn redact_sensitive_values(&self, value: &Value) -> Value {
        redact_sensitive_values(value)
    }
}

fn load_yaml_file(path: &Path) -> Value {
    if !path.exists() {
        return Value::Object(Map::new());
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<Value>(&contents) {
            Ok(value @ Value::Object(_)) => value,
            Ok(_) => Value::Object(Map::new()),
            Err(err) => {
                tracing::warn!("Ignoring unparsable config {}: {}", path.display(), err);
                Value::Object(Map::new())
            }
        },
        Err(_) => Value::Object(Map::new()),
    }
}

fn apply_env_overrides<F>(config: &mut Value, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    for (name, path) in ENV_OVERRIDES {
        let Some(raw) = lookup(name).filter(|v| !v.trim().is_empty()) else {
            continue;
        };
        ensure_object_path(config, path, env_value(&raw));
    }
}

/// Numbers stay numbers so `RAG_MATCH_THRESHOLD=0.5` validates as a float.
fn env_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if let Ok(int) = trimmed.parse::<i64>() {
        return Value::from(int);
    }
    if let Ok(float) = trimmed.parse::<f64>() {
        return Value::from(float);
    }
    Value::String(trimmed.to_string())
}

fn ensure_object_path(config: &mut Value, path: &[&str], value: Value) {
    if path.is_empty() {
        return;
    }

    let mut current = config;
    for (index, key) in path.iter().enumerate() {
        if index == path.len() - 1 {
            if let Some(map) = current.as_object_mut() {
                map.insert(key.to_string(), value);
            }
            return;
        }

        if !current.get(*key).map(|v| v.is_object()).unwrap_or(false) {
            let Some(map) = current.as_object_mut() else {
                return;
            };
            map.insert((*key).to_string(), Value::Object(Map::new()));
        }

        let Some(next) = current.get_mut(*key) else {
            return;
        };
        current = next;
    }
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

fn redact_sensitive_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) && !val.is_null() {
                    redacted.insert(key.clone(), Value::String(REDACT_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_values(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_values).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    if SENSITIVE_WHITELIST.iter().any(|allowed| *allowed == key_lower) {
        return false;
    }
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| key_lower.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deep_merge_merges_objects_and_overrides_scalars() {
        let base = json!({
            "llm": { "base_url": "https://api.openai.com", "timeout_secs": 60 },
            "server": { "cors_allowed_origins": ["http://localhost:5173"] }
        });
        let secrets = json!({
            "llm": { "api_key": "sk-test" },
            "server": { "cors_allowed_origins": ["http://localhost:3000"] }
        });

        let merged = deep_merge(&base, &secrets);

        assert_eq!(
            merged,
            json!({
                "llm": {
                    "base_url": "https://api.openai.com",
                    "timeout_secs": 60,
                    "api_key": "sk-test"
                },
                "server": { "cors_allowed_origins": ["http://localhost:3000"] }
            })
        );
    }

    #[test]
    fn env_overrides_create_nested_paths() {
        let mut config = json!({ "rag": { "match_count": 5 } });
        apply_env_overrides(&mut config, |name| match name {
            "RAG_MATCH_THRESHOLD" => Some("0.55".to_string()),
            "SUPABASE_RAG_URL" => Some("https://db.example.co".to_string()),
            "OPENAI_API_KEY" => Some("sk-env".to_string()),
            "PORT" => Some("9001".to_string()),
            _ => None,
        });

        assert_eq!(config["rag"]["match_count"], json!(5));
        assert_eq!(config["rag"]["match_threshold"], json!(0.55));
        assert_eq!(config["rag"]["supabase_url"], json!("https://db.example.co"));
        assert_eq!(config["llm"]["api_key"], json!("sk-env"));
        assert_eq!(config["server"]["port"], json!(9001));
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut config = json!({ "llm": { "api_key": "from-file" } });
        apply_env_overrides(&mut config, |name| {
            (name == "OPENAI_API_KEY").then(|| "  ".to_string())
        });
        assert_eq!(config["llm"]["api_key"], json!("from-file"));
    }

    #[test]
    fn redact_sensitive_values_replaces_secrets_only() {
        let input = json!({
            "llm": { "api_key": "sk-live", "embedding_model": "text-embedding-3-small" },
            "rag": { "supabase_key": "service", "match_count": 5 },
            "uploads": { "max_upload_bytes": 1024 }
        });

        let redacted = redact_sensitive_values(&input);

        assert_eq!(
            redacted,
            json!({
                "llm": { "api_key": "****", "embedding_model": "text-embedding-3-small" },
                "rag": { "supabase_key": "****", "match_count": 5 },
                "uploads": { "max_upload_bytes": 1024 }
            })
        );
    }

    #[test]
    fn load_config_reads_yaml_and_secrets() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = Arc::new(AppPaths::with_data_dir(
            tmp.path().to_path_buf(),
            tmp.path().to_path_buf(),
        ));
        fs::write(
            tmp.path().join("config.yml"),
            "rag:\n  backend: sqlite\n  match_count: 3\n",
        )
        .unwrap();
        fs::write(&paths.secrets_path, "llm:\n  api_key: sk-file\n").unwrap();

        let service = ConfigService::new(paths);
        let settings = service.settings().unwrap();
        assert_eq!(settings.rag.match_count, 3);
        assert!(settings.llm.api_key.is_some());
    }
}
