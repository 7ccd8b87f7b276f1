//! Tool-using agents that rewrite one section or assemble the final
//! proposal from the selected versions.

use serde::Serialize;
use serde_json::Value;

use super::error::AgentError;
use super::instructions::{FINAL_PROPOSAL_INSTRUCTIONS, REGENERATION_INSTRUCTIONS};
use super::output::clean_html;
use super::tool_loop::{run_tool_loop, AgentTool};
use crate::llm::{ChatMessage, LlmProvider};

pub struct SectionRewrite<'a> {
    pub source_content: &'a str,
    pub collection_mappings: &'a [String],
    pub custom_prompt: Option<&'a str>,
}

/// Per-section guidance passed to the final assembly.
#[derive(Debug, Clone, Serialize)]
pub struct SectionMapping {
    pub section_name: String,
    pub collection_mappings: Vec<String>,
    pub custom_prompt: Option<String>,
}

pub struct FinalAssembly<'a> {
    pub proposal_name: &'a str,
    /// Section title -> selected version content.
    pub selected: &'a Value,
    pub mappings: &'a [SectionMapping],
}

fn pretty(value: &impl Serialize) -> Result<String, AgentError> {
    serde_json::to_string_pretty(value).map_err(|e| AgentError::InvalidOutput(e.to_string()))
}

pub async fn regenerate_section(
    llm: &dyn LlmProvider,
    model_id: &str,
    tool: &dyn AgentTool,
    input: SectionRewrite<'_>,
    max_turns: usize,
) -> Result<String, AgentError> {
    let prompt = format!(
        "Source Content:\n{}\n\nCollection Mappings:\n{}\n\nCustom Prompt:\n{}",
        input.source_content,
        pretty(&input.collection_mappings)?,
        input.custom_prompt.unwrap_or("None")
    );
    let messages = vec![
        ChatMessage::system(REGENERATION_INSTRUCTIONS),
        ChatMessage::user(prompt),
    ];

    run_tool_loop(llm, model_id, tool, messages, max_turns).await
}

/// Returns the cleaned HTML body of the final proposal.
pub async fn assemble_final_proposal(
    llm: &dyn LlmProvider,
    model_id: &str,
    tool: &dyn AgentTool,
    input: FinalAssembly<'_>,
    max_turns: usize,
) -> Result<String, AgentError> {
    let prompt = format!(
        "Proposal Name: {}\n\nInitial Draft (from user selected versions):\n{}\n\nMappings:\n{}",
        input.proposal_name,
        pretty(input.selected)?,
        pretty(&input.mappings)?
    );
    let messages = vec![
        ChatMessage::system(FINAL_PROPOSAL_INSTRUCTIONS),
        ChatMessage::user(prompt),
    ];

    let raw = run_tool_loop(llm, model_id, tool, messages, max_turns).await?;
    let html = clean_html(&raw);
    if html.is_empty() {
        return Err(AgentError::EmptyResponse);
    }
    Ok(html)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedProvider;
    use crate::llm::{ToolCall, ToolDefinition};
    use async_trait::async_trait;
    use serde_json::json;

    struct FixedTool;

    #[async_trait]
    impl AgentTool for FixedTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::function("query_collections", "fixed", json!({"type": "object"}))
        }

        async fn call(&self, _arguments: &str) -> String {
            "We have delivered 40 banking projects.".to_string()
        }
    }

    fn tool_call() -> ChatMessage {
        ChatMessage {
            role: "assistant".to_string(),
            content: None,
            tool_calls: Some(vec![ToolCall::new(
                "call_1",
                "query_collections",
                "{\"query\":\"experience\",\"collections\":[\"Case studies\"]}",
            )]),
            tool_call_id: None,
        }
    }

    #[tokio::test]
    async fn regeneration_prompt_carries_mappings_and_custom_prompt() {
        let llm = ScriptedProvider::new(vec![tool_call(), ChatMessage::assistant("<p>New text</p>")]);
        let mappings = vec!["Case studies".to_string()];

        let out = regenerate_section(
            &llm,
            "gpt-4-turbo",
            &FixedTool,
            SectionRewrite {
                source_content: "Old text",
                collection_mappings: &mappings,
                custom_prompt: Some("Make it formal"),
            },
            3,
        )
        .await
        .unwrap();
        assert_eq!(out, "<p>New text</p>");

        let first = llm.requests.lock().unwrap()[0].clone();
        let prompt = first.messages[1].text().to_string();
        assert!(prompt.starts_with("Source Content:\nOld text\n\nCollection Mappings:\n[\n  \"Case studies\"\n]"));
        assert!(prompt.ends_with("Custom Prompt:\nMake it formal"));
        assert_eq!(first.system_prompt(), Some(REGENERATION_INSTRUCTIONS));
    }

    #[tokio::test]
    async fn final_assembly_cleans_html() {
        let llm = ScriptedProvider::new(vec![
            tool_call(),
            ChatMessage::assistant(
                "```html\n<html><body><h2 style=\"margin:0\">Why Us</h2><p>40 projects.</p></body></html>\n```",
            ),
        ]);
        let selected = json!({ "Why Us": "We are experienced." });
        let mappings = vec![SectionMapping {
            section_name: "Why Us".to_string(),
            collection_mappings: vec!["Case studies".to_string()],
            custom_prompt: None,
        }];

        let html = assemble_final_proposal(
            &llm,
            "gpt-4-turbo",
            &FixedTool,
            FinalAssembly {
                proposal_name: "Bank Portal",
                selected: &selected,
                mappings: &mappings,
            },
            7,
        )
        .await
        .unwrap();

        assert_eq!(html, "<h2>Why Us</h2><p>40 projects.</p>");
        let prompt = llm.requests.lock().unwrap()[0].messages[1].text().to_string();
        assert!(prompt.starts_with("Proposal Name: Bank Portal\n\nInitial Draft (from user selected versions):\n"));
        assert!(prompt.contains("\"collection_mappings\""));
    }

    #[tokio::test]
    async fn final_assembly_respects_turn_cap() {
        let llm = ScriptedProvider::new(vec![tool_call(), tool_call()]);
        let selected = json!({});

        let err = assemble_final_proposal(
            &llm,
            "m",
            &FixedTool,
            FinalAssembly { proposal_name: "P", selected: &selected, mappings: &[] },
            2,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AgentError::MaxTurnsExceeded(2)));
    }
}
