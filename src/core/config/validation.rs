use serde_json::{Map, Value};
use crate::core::errors::ApiError;

const RAG_BACKENDS: [&str; 2] = ["sqlite", "supabase"];

pub fn validate_config(config: &Value) -> Result<(), ApiError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 0, 65535)?;
        validate_string_array_field(
            server,
            "server.cors_allowed_origins",
            "cors_allowed_origins",
        )?;
    }

    if let Some(database) = expect_optional_object(root, "database")? {
        validate_optional_string_field(database, "database.url", "url")?;
    }

    if let Some(llm) = expect_optional_object(root, "llm")? {
        for key in [
            "base_url",
            "api_key",
            "ingestion_model",
            "draft_model",
            "final_generation_model",
            "embedding_model",
        ] {
            validate_optional_string_field(llm, &format!("llm.{}", key), key)?;
        }
        validate_u64_field(llm, "llm.timeout_secs", "timeout_secs", 1, 3_600)?;
    }

    if let Some(rag) = expect_optional_object(root, "rag")? {
        validate_optional_string_field(rag, "rag.backend", "backend")?;
        let backend = rag.get("backend").and_then(|v| v.as_str()).unwrap_or("sqlite");
        if !RAG_BACKENDS.contains(&backend) {
            return Err(ApiError::BadRequest(format!(
                "Invalid config at 'rag.backend': expected one of {}",
                RAG_BACKENDS.join(", ")
            )));
        }
        if backend == "supabase" {
            validate_required_string_field(rag, "rag.supabase_url", "supabase_url")?;
            validate_required_string_field(rag, "rag.supabase_key", "supabase_key")?;
        }
        validate_f64_field(rag, "rag.match_threshold", "match_threshold", 0.0, 1.0)?;
        validate_u64_field(rag, "rag.match_count", "match_count", 1, 100)?;
    }

    if let Some(agent) = expect_optional_object(root, "agent")? {
        validate_u64_field(
            agent,
            "agent.regeneration_max_turns",
            "regeneration_max_turns",
            1,
            50,
        )?;
        validate_u64_field(agent, "agent.final_max_turns", "final_max_turns", 1, 50)?;
    }

    if let Some(uploads) = expect_optional_object(root, "uploads")? {
        validate_optional_string_field(uploads, "uploads.dir", "dir")?;
        validate_u64_field(
            uploads,
            "uploads.max_upload_bytes",
            "max_upload_bytes",
            1,
            1_000_000_000,
        )?;
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ApiError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(config_type_error(key, "object")),
        None => Ok(None),
    }
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_f64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: f64,
    max: f64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_f64() else {
        return Err(config_type_error(path, "number"));
    };
    if number < min || number > max {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_required_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let value = section.get(key).ok_or_else(|| {
        ApiError::BadRequest(format!("Invalid config at '{}': value is required", path))
    })?;
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if text.trim().is_empty() {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': value cannot be empty",
            path
        )));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.is_null() || value.as_str().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "string"))
}

fn validate_string_array_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(items) = value.as_array() else {
        return Err(config_type_error(path, "array of strings"));
    };
    for (index, item) in items.iter().enumerate() {
        let Some(text) = item.as_str() else {
            return Err(config_type_error(&format!("{}[{}]", path, index), "string"));
        };
        if text.trim().is_empty() {
            return Err(ApiError::BadRequest(format!(
                "Invalid config at '{}[{}]': value cannot be empty",
                path, index
            )));
        }
    }
    Ok(())
}

fn config_type_error(path: &str, expected: &str) -> ApiError {
    ApiError::BadRequest(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}
