//! Chat message types shared by prompt templates and chat models.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The role of a chat message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// User input.
    #[serde(alias = "human")]
    User,
    /// Assistant (model) response.
    #[serde(alias = "ai")]
    Assistant,
}

/// A single message in a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message author.
    pub role: Role,
    /// The message content.
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Coerce a runnable value into a message list.
///
/// - a string becomes one user message
/// - an object with `role` and `content` becomes one message
/// - an array may mix message objects and strings (strings become user messages)
///
/// Returns `None` for anything else.
pub fn messages_from_value(value: &Value) -> Option<Vec<ChatMessage>> {
    match value {
        Value::String(text) => Some(vec![ChatMessage::user(text.clone())]),
        Value::Object(_) => message_from_value(value).map(|m| vec![m]),
        Value::Array(items) => items.iter().map(message_from_value).collect(),
        _ => None,
    }
}

fn message_from_value(value: &Value) -> Option<ChatMessage> {
    match value {
        Value::String(text) => Some(ChatMessage::user(text.clone())),
        Value::Object(_) => serde_json::from_value(value.clone()).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_is_user_message() {
        let msgs = messages_from_value(&json!("hi")).unwrap();
        assert_eq!(msgs, vec![ChatMessage::user("hi")]);
    }

    #[test]
    fn test_array_with_aliases() {
        let msgs = messages_from_value(&json!([
            {"role": "system", "content": "be brief"},
            {"role": "human", "content": "hello"},
            {"role": "ai", "content": "hey"},
            "follow-up"
        ]))
        .unwrap();
        assert_eq!(
            msgs,
            vec![
                ChatMessage::system("be brief"),
                ChatMessage::user("hello"),
                ChatMessage::assistant("hey"),
                ChatMessage::user("follow-up"),
            ]
        );
    }

    #[test]
    fn test_rejects_other_shapes() {
        assert!(messages_from_value(&json!(3)).is_none());
        assert!(messages_from_value(&json!({"topic": "x"})).is_none());
        assert!(messages_from_value(&json!([1, 2])).is_none());
    }

    #[test]
    fn test_serializes_lowercase_role() {
        let v = serde_json::to_value(ChatMessage::assistant("ok")).unwrap();
        assert_eq!(v, json!({"role": "assistant", "content": "ok"}));
    }
}
