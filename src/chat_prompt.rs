//! Chat prompt templates with message placeholders.

use crate::{
    error::Result,
    exec_ctx::ExecCtx,
    message::{messages_from_value, ChatMessage, Role},
    prompt::{bind_input, PromptError, PromptTemplate},
    runnable::{BoxFut, Runnable},
    RunnableError,
};
use serde_json::{Map, Value};

/// One entry of a [`ChatPromptTemplate`].
#[derive(Debug, Clone)]
pub enum MessageTemplate {
    /// A message whose content is a template.
    Templated {
        /// Author role of the produced message.
        role: Role,
        /// Content template.
        template: PromptTemplate,
    },
    /// Splices the list of messages bound to `variable`.
    Placeholder {
        /// Input variable holding the messages.
        variable: String,
    },
}

/// Formats an input mapping into a list of chat messages.
///
/// The output is a JSON array of `{role, content}` objects, which a
/// [`ChatModelUnit`](crate::ChatModelUnit) accepts directly.
///
/// # Example
///
/// ```
/// use llm_runnable::ChatPromptTemplate;
/// use serde_json::json;
///
/// let prompt = ChatPromptTemplate::new()
///     .system("You are a helpful AI biologist.")
///     .placeholder("chat_history")
///     .human("{query}");
///
/// let messages = prompt
///     .format_messages(json!({"chat_history": ["Hi"], "query": "What is DNA?"}))
///     .unwrap();
/// assert_eq!(messages.len(), 3);
/// assert_eq!(messages[2].content, "What is DNA?");
/// ```
#[derive(Debug, Clone)]
pub struct ChatPromptTemplate {
    name: String,
    messages: Vec<MessageTemplate>,
}

impl ChatPromptTemplate {
    pub fn new() -> Self {
        Self {
            name: "chat_prompt".to_string(),
            messages: Vec::new(),
        }
    }

    /// Set the instance name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Append a templated message with the given role.
    pub fn message(mut self, role: Role, template: impl Into<String>) -> Self {
        self.messages.push(MessageTemplate::Templated {
            role,
            template: PromptTemplate::new(template),
        });
        self
    }

    pub fn system(self, template: impl Into<String>) -> Self {
        self.message(Role::System, template)
    }

    pub fn human(self, template: impl Into<String>) -> Self {
        self.message(Role::User, template)
    }

    pub fn ai(self, template: impl Into<String>) -> Self {
        self.message(Role::Assistant, template)
    }

    /// Append a placeholder filled from the input variable `variable`.
    pub fn placeholder(mut self, variable: impl Into<String>) -> Self {
        self.messages.push(MessageTemplate::Placeholder {
            variable: variable.into(),
        });
        self
    }

    /// Every input variable, templated or placeholder, in order of appearance.
    pub fn input_variables(&self) -> Vec<String> {
        let mut vars: Vec<String> = Vec::new();
        for entry in &self.messages {
            let names = match entry {
                MessageTemplate::Templated { template, .. } => template
                    .input_variables()
                    .into_iter()
                    .map(String::from)
                    .collect(),
                MessageTemplate::Placeholder { variable } => vec![variable.clone()],
            };
            for name in names {
                if !vars.contains(&name) {
                    vars.push(name);
                }
            }
        }
        vars
    }

    /// Format into messages.
    pub fn format_messages(&self, input: Value) -> std::result::Result<Vec<ChatMessage>, PromptError> {
        let bindings = bind_input(input, &self.input_variables())?;
        self.format_map(&bindings)
    }

    fn format_map(&self, bindings: &Map<String, Value>) -> std::result::Result<Vec<ChatMessage>, PromptError> {
        let mut out = Vec::with_capacity(self.messages.len());
        for entry in &self.messages {
            match entry {
                MessageTemplate::Templated { role, template } => {
                    out.push(ChatMessage::new(*role, template.format_map(bindings)?));
                }
                MessageTemplate::Placeholder { variable } => {
                    let value = bindings
                        .get(variable)
                        .ok_or_else(|| PromptError::MissingVariable(variable.clone()))?;
                    let spliced = messages_from_value(value)
                        .filter(|_| value.is_array())
                        .ok_or_else(|| PromptError::NotMessages(variable.clone()))?;
                    out.extend(spliced);
                }
            }
        }
        Ok(out)
    }
}

impl Default for ChatPromptTemplate {
    fn default() -> Self {
        Self::new()
    }
}

impl Runnable for ChatPromptTemplate {
    fn kind(&self) -> &'static str {
        "chat_prompt"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn invoke<'a>(&'a self, _ctx: &'a ExecCtx, input: Value) -> BoxFut<'a, Result<Value>> {
        Box::pin(async move {
            let messages = self
                .format_messages(input)
                .map_err(|e| RunnableError::unit(&self.name, e))?;
            Ok(serde_json::to_value(messages)?)
        })
    }
}
