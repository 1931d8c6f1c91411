//! Chat model backed by Ollama's native API.
//!
//! [`OllamaChatModel`] posts message lists to `/api/chat` with streaming
//! disabled and returns `message.content` from the response.

use super::{ChatModel, ModelError};
use crate::message::ChatMessage;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

/// Default Ollama endpoint.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Generation settings for a chat model.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Temperature (0.0 = deterministic, 1.0 = creative).
    pub temperature: f64,

    /// Maximum tokens to generate.
    pub max_tokens: u32,

    /// Request JSON format output from the model.
    pub json_mode: bool,

    /// Custom options merged into the Ollama options object.
    pub options: Option<Value>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2048,
            json_mode: false,
            options: None,
        }
    }
}

impl ModelConfig {
    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = temp;
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = tokens;
        self
    }

    pub fn with_json_mode(mut self, enabled: bool) -> Self {
        self.json_mode = enabled;
        self
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = Some(options);
        self
    }
}

/// Chat model for a locally served Ollama model.
///
/// # Example
///
/// ```no_run
/// use llm_runnable::{ChatModelUnit, ModelConfig, OllamaChatModel};
/// use std::sync::Arc;
///
/// let model = OllamaChatModel::new("llama3.2")
///     .with_config(ModelConfig::default().with_temperature(0.0));
/// let unit = ChatModelUnit::new(Arc::new(model));
/// ```
#[derive(Debug, Clone)]
pub struct OllamaChatModel {
    client: Client,
    base_url: String,
    model: String,
    config: ModelConfig,
}

impl OllamaChatModel {
    /// Create a model talking to [`DEFAULT_BASE_URL`].
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            config: ModelConfig::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_config(mut self, config: ModelConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a shared HTTP client (connection pool).
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Build the Ollama `options` object from the config.
    fn build_options(&self) -> Value {
        let mut opts = json!({
            "temperature": self.config.temperature,
            "num_predict": self.config.max_tokens,
        });
        if let Some(ref custom) = self.config.options {
            if let (Some(base), Some(extra)) = (opts.as_object_mut(), custom.as_object()) {
                for (k, v) in extra {
                    base.insert(k.clone(), v.clone());
                }
            }
        }
        opts
    }

    /// Build the JSON body for `/api/chat`.
    fn build_chat_body(&self, messages: &[ChatMessage]) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
            "options": self.build_options(),
        });
        if self.config.json_mode {
            body["format"] = json!("json");
        }
        body
    }

    fn extract_content(json_resp: &Value) -> Result<String, ModelError> {
        json_resp
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| ModelError::UnexpectedResponse("missing message.content".into()))
    }
}

#[async_trait]
impl ChatModel for OllamaChatModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let body = self.build_chat_body(messages);

        let resp = self.client.post(&url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            tracing::warn!(%url, status = status.as_u16(), "ollama request failed");
            return Err(ModelError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        let json_resp: Value = resp.json().await?;
        Self::extract_content(&json_resp)
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}
