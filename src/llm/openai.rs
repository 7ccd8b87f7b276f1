use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::config::settings::LlmSettings;
use crate::core::errors::ApiError;
use super::provider::LlmProvider;
use super::types::{ChatMessage, ChatRequest};

/// Client for any OpenAI-compatible chat/embedding endpoint.
#[derive(Clone)]
pub struct OpenAiProvider {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(settings: &LlmSettings) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(settings.timeout_secs.min(30)))
            .build()
            .map_err(ApiError::internal)?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone().filter(|k| !k.trim().is_empty()),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        if self.base_url.ends_with("/v1") {
            format!("{}/{}", self.base_url, path)
        } else {
            format!("{}/v1/{}", self.base_url, path)
        }
    }

    async fn post(&self, path: &str, body: &Value) -> Result<reqwest::Response, ApiError> {
        let mut builder = self.client.post(self.endpoint(path)).json(body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let res = builder.send().await.map_err(ApiError::internal)?;
        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Internal(format!(
                "LLM provider {} error ({}): {}",
                path, status, text
            )));
        }
        Ok(res)
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

pub(crate) fn chat_body(request: &ChatRequest, model_id: &str) -> Value {
    let mut body = json!({
        "model": model_id,
        "messages": request.messages,
        "stream": false,
    });

    if let Some(obj) = body.as_object_mut() {
        if !request.tools.is_empty() {
            obj.insert("tools".to_string(), json!(request.tools));
        }
    }

    body
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<ChatMessage, ApiError> {
        let body = chat_body(&request, model_id);
        let res = self.post("chat/completions", &body).await?;

        let payload: ChatCompletionResponse = res.json().await.map_err(ApiError::internal)?;
        payload
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| ApiError::Internal("LLM provider returned no choices".to_string()))
    }

    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let body = json!({
            "model": model_id,
            "input": inputs,
        });
        let res = self.post("embeddings", &body).await?;

        let mut payload: EmbeddingResponse = res.json().await.map_err(ApiError::internal)?;
        payload.data.sort_by_key(|item| item.index);

        if payload.data.len() != inputs.len() {
            return Err(ApiError::Internal(format!(
                "Expected {} embeddings, provider returned {}",
                inputs.len(),
                payload.data.len()
            )));
        }

        Ok(payload.data.into_iter().map(|item| item.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::ToolDefinition;

    fn provider(base_url: &str) -> OpenAiProvider {
        let settings = LlmSettings {
            base_url: base_url.to_string(),
            ..LlmSettings::default()
        };
        OpenAiProvider::new(&settings).unwrap()
    }

    #[test]
    fn endpoint_handles_base_with_or_without_version() {
        assert_eq!(
            provider("https://api.openai.com/").endpoint("embeddings"),
            "https://api.openai.com/v1/embeddings"
        );
        assert_eq!(
            provider("http://localhost:1234/v1").endpoint("chat/completions"),
            "http://localhost:1234/v1/chat/completions"
        );
    }

    #[test]
    fn chat_body_includes_tools_only_when_present() {
        let plain = chat_body(&ChatRequest::new(vec![ChatMessage::user("hi")]), "gpt-4-turbo");
        assert!(plain.get("tools").is_none());
        assert_eq!(plain["model"], "gpt-4-turbo");

        let with_tools = ChatRequest::new(vec![ChatMessage::user("hi")]).with_tools(vec![
            ToolDefinition::function("query_collections", "search", json!({"type": "object"})),
        ]);
        let body = chat_body(&with_tools, "gpt-4-turbo");
        assert_eq!(body["tools"][0]["function"]["name"], "query_collections");
        assert_eq!(body["tools"][0]["type"], "function");
    }

    #[tokio::test]
    #[ignore]
    async fn live_openai_embedding() {
        let settings = LlmSettings {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            ..LlmSettings::default()
        };
        let provider = OpenAiProvider::new(&settings).unwrap();
        let vectors = provider
            .embed(&["proposal pricing".to_string()], &settings.embedding_model)
            .await
            .unwrap();
        assert_eq!(vectors.len(), 1);
        assert!(!vectors[0].is_empty());
    }
}
