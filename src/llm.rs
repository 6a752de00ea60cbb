//! Chat model clients
//!
//! Agents talk to the model through [`ChatModel`]. The OpenAI-compatible
//! client covers OpenAI, OpenRouter and local gateways; [`DisabledModel`]
//! makes every call fail so agents take their offline fallbacks.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::LlmConfig;
use crate::error::{DeskError, Result};

/// One message in a chat completion request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatTurn>,
    pub temperature: f32,
}

impl ChatRequest {
    pub fn new(temperature: f32) -> Self {
        Self {
            messages: Vec::new(),
            temperature,
        }
    }

    pub fn system(mut self, content: impl Into<String>) -> Self {
        self.messages.push(ChatTurn::system(content));
        self
    }

    pub fn user(mut self, content: impl Into<String>) -> Self {
        self.messages.push(ChatTurn::user(content));
        self
    }

    pub fn turn(mut self, turn: ChatTurn) -> Self {
        self.messages.push(turn);
        self
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Return the assistant's reply text, trimmed and non-empty
    async fn complete(&self, request: &ChatRequest) -> Result<String>;

    fn model_name(&self) -> &str;

    /// False for models that never answer
    fn is_enabled(&self) -> bool {
        true
    }
}

/// OpenAI-compatible `/chat/completions` client
pub struct OpenAiChatModel {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiChatModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                DeskError::Config(
                    "OPENAI_API_KEY required when SUPPORTDESK_LLM_PROVIDER=openai".to_string(),
                )
            })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "messages": request.messages,
                "temperature": request.temperature,
            }))
            .send()
            .await
            .map_err(|e| DeskError::Llm(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DeskError::Llm(format!("model returned {}: {}", status, body)));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| DeskError::Llm(format!("response parse failed: {}", e)))?;
        let text = payload
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|msg| msg.get("content"))
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or("");

        if text.is_empty() {
            return Err(DeskError::Llm("response had empty content".to_string()));
        }
        Ok(text.to_string())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Model used when no provider is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledModel;

#[async_trait]
impl ChatModel for DisabledModel {
    async fn complete(&self, _request: &ChatRequest) -> Result<String> {
        Err(DeskError::Llm("no language model configured".to_string()))
    }

    fn model_name(&self) -> &str {
        "none"
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Replays canned replies in order, for demos and tests
///
/// Once the queue is empty every call fails like [`DisabledModel`].
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests seen so far
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        self.requests.lock().push(request.clone());
        self.replies
            .lock()
            .pop_front()
            .ok_or_else(|| DeskError::Llm("script exhausted".to_string()))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Build the configured chat model
pub fn create_chat_model(config: &LlmConfig) -> Result<Arc<dyn ChatModel>> {
    match config.provider.to_lowercase().as_str() {
        "openai" => Ok(Arc::new(OpenAiChatModel::new(config)?)),
        "none" | "disabled" | "" => Ok(Arc::new(DisabledModel)),
        other => Err(DeskError::Config(format!(
            "Unknown LLM provider: '{}'. Use 'openai' or 'none'",
            other
        ))),
    }
}

/// Pull the outermost JSON object out of model output
///
/// Handles ```json fences and prose around the object.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        body = rest.trim_end().strip_suffix("```").unwrap_or(rest).trim();
    }

    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&body[start..=end]) {
        Ok(value) if value.is_object() => Some(value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_object() {
        let fenced = "```json\n{\"title\": \"Signup\"}\n```";
        assert_eq!(
            extract_json_object(fenced).unwrap()["title"],
            "Signup"
        );

        let prose = "Sure! Here it is: {\"tool\": \"get_weather\", \"arguments\": {\"city\": \"Oslo\"}} hope that helps";
        let value = extract_json_object(prose).unwrap();
        assert_eq!(value["arguments"]["city"], "Oslo");

        assert!(extract_json_object("no json here").is_none());
        assert!(extract_json_object("} backwards {").is_none());
        assert!(extract_json_object("{broken").is_none());
    }

    #[test]
    fn test_create_chat_model() {
        let disabled = create_chat_model(&LlmConfig::default()).unwrap();
        assert!(!disabled.is_enabled());
        assert_eq!(disabled.model_name(), "none");

        let missing_key = LlmConfig {
            provider: "openai".into(),
            ..LlmConfig::default()
        };
        assert!(create_chat_model(&missing_key).is_err());

        let unknown = LlmConfig {
            provider: "bard".into(),
            ..LlmConfig::default()
        };
        assert!(create_chat_model(&unknown).is_err());
    }

    #[tokio::test]
    async fn test_scripted_model_replays_then_fails() {
        let model = ScriptedModel::new(["doc_qa"]);
        let request = ChatRequest::new(0.0).system("route").user("what is in the pdf");
        assert_eq!(model.complete(&request).await.unwrap(), "doc_qa");
        assert!(model.complete(&request).await.is_err());
        assert_eq!(model.requests().len(), 2);
        assert_eq!(model.requests()[0].messages[1].content, "what is in the pdf");
    }

    #[tokio::test]
    async fn test_disabled_model_fails() {
        let err = DisabledModel
            .complete(&ChatRequest::new(0.5).user("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::Llm(_)));
    }
}
