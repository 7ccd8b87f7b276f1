//! Single-call initial draft: scope document in, `section -> text` out.

use serde_json::{Map, Value};

use super::error::AgentError;
use super::instructions::DRAFT_INSTRUCTIONS;
use super::output::strip_json_fence;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};

/// Returns `(section_name, content)` pairs in template order, followed by
/// any extra sections the model produced.
pub async fn generate_initial_draft(
    llm: &dyn LlmProvider,
    model_id: &str,
    scope_document: &str,
    sections: &[String],
) -> Result<Vec<(String, String)>, AgentError> {
    let sections_json = serde_json::to_string(sections).map_err(|e| AgentError::InvalidOutput(e.to_string()))?;
    let request = ChatRequest::new(vec![
        ChatMessage::system(DRAFT_INSTRUCTIONS),
        ChatMessage::user(format!(
            "scope_document: {}\n\nsections: {}",
            scope_document, sections_json
        )),
    ]);

    let reply = llm.chat(request, model_id).await?;
    if reply.text().trim().is_empty() {
        return Err(AgentError::EmptyResponse);
    }
    parse_draft(reply.text(), sections)
}

pub fn parse_draft(reply: &str, sections: &[String]) -> Result<Vec<(String, String)>, AgentError> {
    let mut draft: Map<String, Value> = serde_json::from_str(strip_json_fence(reply))
        .map_err(|e| AgentError::InvalidOutput(format!("draft is not a JSON object: {}", e)))?;

    let mut ordered = Vec::with_capacity(draft.len());
    for name in sections {
        if let Some(value) = draft.remove(name) {
            push_section(&mut ordered, name.clone(), value);
        } else {
            tracing::warn!("Draft has no content for section '{}'", name);
        }
    }
    for (name, value) in draft {
        push_section(&mut ordered, name, value);
    }
    Ok(ordered)
}

fn push_section(out: &mut Vec<(String, String)>, name: String, value: Value) {
    match value {
        Value::Null => tracing::warn!("Draft section '{}' is null", name),
        Value::String(text) => out.push((name, text)),
        other => out.push((name, other.to_string())),
    }
}
