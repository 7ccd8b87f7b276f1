use async_trait::async_trait;

use crate::core::errors::ApiError;
use super::types::{ChatMessage, ChatRequest};

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// return the provider name (e.g. "openai")
    fn name(&self) -> &str;

    /// chat completion (non-streaming); returns the assistant message,
    /// which may carry tool calls instead of content
    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<ChatMessage, ApiError>;

    /// generate one embedding per input, in input order
    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, ApiError>;
}
