//! Mock chat model for testing without a live LLM.
//!
//! [`MockChatModel`] answers deterministically, allowing downstream
//! consumers to write tests against compositions that include a model.
//!
//! # Example
//!
//! ```
//! use llm_runnable::model::MockChatModel;
//!
//! let mock = MockChatModel::new(vec!["Hello, world!".to_string()]);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{ChatModel, ModelError};
use crate::message::ChatMessage;

#[derive(Debug)]
enum Mode {
    Canned(Vec<String>),
    Echo,
    Failing(String),
}

/// A test model with canned, echoed, or failing replies.
///
/// Canned responses are returned in order and cycle back to the beginning
/// when exhausted. Every call is counted, including failing ones.
#[derive(Debug)]
pub struct MockChatModel {
    mode: Mode,
    index: AtomicUsize,
    calls: AtomicUsize,
}

impl MockChatModel {
    /// Create a mock with the given canned responses.
    pub fn new(responses: Vec<String>) -> Self {
        assert!(!responses.is_empty(), "MockChatModel requires at least one response");
        Self::with_mode(Mode::Canned(responses))
    }

    /// Create a mock that always returns the same response.
    pub fn fixed(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Create a mock that replies with the content of the last message.
    pub fn echo() -> Self {
        Self::with_mode(Mode::Echo)
    }

    /// Create a mock whose every call fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_mode(Mode::Failing(message.into()))
    }

    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            index: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `complete` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.mode {
            Mode::Canned(responses) => {
                let idx = self.index.fetch_add(1, Ordering::Relaxed) % responses.len();
                Ok(responses[idx].clone())
            }
            Mode::Echo => Ok(messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default()),
            Mode::Failing(message) => Err(ModelError::Other(message.clone())),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
