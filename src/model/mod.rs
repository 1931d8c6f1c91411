//! Chat model trait and the runnable that wraps it.
//!
//! The [`ChatModel`] trait abstracts over LLM providers. A model is handed
//! to a [`ChatModelUnit`] at construction, so compositions never reach for
//! global clients. Built-in implementations: [`OllamaChatModel`] and
//! [`MockChatModel`].
//!
//! ```text
//! PromptTemplate ──► ChatModelUnit ──► ChatModel::complete() ──► text
//!                                             │
//!                                  ┌──────────┴──────────┐
//!                          OllamaChatModel         MockChatModel
//!                            /api/chat          canned / echo / failing
//! ```

pub mod mock;
pub mod ollama;

pub use mock::MockChatModel;
pub use ollama::{ModelConfig, OllamaChatModel};

use crate::{
    error::Result,
    exec_ctx::ExecCtx,
    message::{messages_from_value, ChatMessage},
    prompt::json_type,
    runnable::{BoxFut, Runnable},
    RunnableError,
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Errors produced by chat models.
#[derive(Error, Debug)]
pub enum ModelError {
    /// Low-level HTTP transport failure (connection refused, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Http {
        /// HTTP status code (e.g. 429, 500, 503).
        status: u16,
        /// Response body text.
        body: String,
    },

    /// The provider's response did not have the expected shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The model was given something that is neither a prompt nor messages.
    #[error("chat model input must be a string or a list of messages, got {0}")]
    InvalidInput(&'static str),

    /// Catch-all for other provider failures.
    #[error("{0}")]
    Other(String),
}

/// Abstraction over chat-capable LLM providers.
///
/// Implementations may block on the network. They must be safe to call
/// concurrently; any client or connection pool is owned by the
/// implementation.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate a reply to `messages`.
    async fn complete(&self, messages: &[ChatMessage]) -> std::result::Result<String, ModelError>;

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Runnable that sends its input to a [`ChatModel`] and returns the reply text.
///
/// Accepts a prompt string (sent as one user message) or a message list as
/// produced by [`ChatPromptTemplate`](crate::ChatPromptTemplate).
#[derive(Clone)]
pub struct ChatModelUnit {
    name: String,
    model: Arc<dyn ChatModel>,
}

impl ChatModelUnit {
    /// Wrap a model; the instance name defaults to the model's name.
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            name: model.name().to_string(),
            model,
        }
    }

    /// Set the instance name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The wrapped model.
    pub fn model(&self) -> &Arc<dyn ChatModel> {
        &self.model
    }
}

impl std::fmt::Debug for ChatModelUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatModelUnit")
            .field("name", &self.name)
            .field("model", &self.model.name())
            .finish()
    }
}

impl Runnable for ChatModelUnit {
    fn kind(&self) -> &'static str {
        "chat_model"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn invoke<'a>(&'a self, _ctx: &'a ExecCtx, input: Value) -> BoxFut<'a, Result<Value>> {
        Box::pin(async move {
            let messages = messages_from_value(&input).ok_or_else(|| {
                RunnableError::unit(&self.name, ModelError::InvalidInput(json_type(&input)))
            })?;
            tracing::debug!(
                unit = %self.name,
                model = self.model.name(),
                messages = messages.len(),
                "calling chat model"
            );
            let text = self
                .model
                .complete(&messages)
                .await
                .map_err(|e| RunnableError::unit(&self.name, e))?;
            Ok(Value::String(text))
        })
    }
}
