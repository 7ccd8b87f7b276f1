//! Chat/tool alternation shared by the regeneration and final-assembly
//! agents.

use async_trait::async_trait;

use super::error::AgentError;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider, ToolDefinition};

#[async_trait]
pub trait AgentTool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    /// Runs the tool with the raw JSON arguments from the model. Failures are
    /// reported back to the model as text.
    async fn call(&self, arguments: &str) -> String;
}

/// Alternates chat calls with tool execution until the model answers
/// without requesting a tool. Every chat call counts as one turn.
pub async fn run_tool_loop(
    llm: &dyn LlmProvider,
    model_id: &str,
    tool: &dyn AgentTool,
    mut messages: Vec<ChatMessage>,
    max_turns: usize,
) -> Result<String, AgentError> {
    let definition = tool.definition();
    let tool_name = definition.function.name.clone();

    for turn in 1..=max_turns {
        tracing::info!("Agent turn {}/{} (model: {})", turn, max_turns, model_id);

        let request = ChatRequest::new(messages.clone()).with_tools(vec![definition.clone()]);
        let reply = llm.chat(request, model_id).await?;

        let calls = reply.requested_tools().to_vec();
        messages.push(reply.clone());

        if calls.is_empty() {
            let content = reply.text().trim();
            if content.is_empty() {
                return Err(AgentError::EmptyResponse);
            }
            return Ok(content.to_string());
        }

        for call in calls {
            let result = if call.function.name == tool_name {
                tracing::info!(
                    "Invoking tool {} with arguments {}",
                    call.function.name,
                    call.function.arguments
                );
                tool.call(&call.function.arguments).await
            } else {
                tracing::warn!("Model requested unknown tool: {}", call.function.name);
                format!("Unknown tool: {}", call.function.name)
            };
            messages.push(ChatMessage::tool_result(call.id, result));
        }
    }

    Err(AgentError::MaxTurnsExceeded(max_turns))
}
