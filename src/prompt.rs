//! Prompt templates.
//!
//! [`PromptTemplate`] turns a mapping of variables into a prompt string.
//! Placeholders are written `{name}`; use `{{` and `}}` for literal braces.

use crate::{
    error::Result,
    exec_ctx::ExecCtx,
    runnable::{BoxFut, Runnable},
    RunnableError,
};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Errors produced while formatting prompts.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    /// A variable used by the template has no value.
    #[error("missing value for prompt variable '{0}'")]
    MissingVariable(String),

    /// The input cannot be bound to the template's variables.
    #[error("prompt input must be an object with keys {expected:?}, got {got}")]
    InvalidInput {
        /// Variables the template still needs.
        expected: Vec<String>,
        /// JSON type of the received input.
        got: &'static str,
    },

    /// A placeholder value was not a list of messages.
    #[error("prompt variable '{0}' must be a list of messages")]
    NotMessages(String),
}

/// A piece of a parsed template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    /// Text copied as is. Escaped braces are already reduced to one.
    Literal(&'a str),
    /// A `{name}` placeholder.
    Variable(&'a str),
}

/// Split `template` into literal text and placeholders in one left-to-right
/// pass. `{{` and `}}` yield a single brace; a `{` without a matching `}`
/// (or with another `{` before it) is literal.
fn segments(template: &str) -> Vec<Segment<'_>> {
    let bytes = template.as_bytes();
    let mut out = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' | b'}' if bytes.get(i + 1) == Some(&bytes[i]) => {
                out.push(Segment::Literal(&template[literal_start..=i]));
                i += 2;
                literal_start = i;
            }
            b'{' => {
                let rest = &template[i + 1..];
                match rest.find(&['{', '}'][..]) {
                    Some(close) if close > 0 && rest.as_bytes()[close] == b'}' => {
                        if literal_start < i {
                            out.push(Segment::Literal(&template[literal_start..i]));
                        }
                        out.push(Segment::Variable(&rest[..close]));
                        i += close + 2;
                        literal_start = i;
                    }
                    _ => i += 1,
                }
            }
            _ => i += 1,
        }
    }
    if literal_start < bytes.len() {
        out.push(Segment::Literal(&template[literal_start..]));
    }
    out
}

/// Placeholder names in `template`, in first-appearance order, without duplicates.
pub fn template_variables(template: &str) -> Vec<String> {
    let mut vars: Vec<String> = Vec::new();
    for segment in segments(template) {
        if let Segment::Variable(name) = segment {
            if !vars.iter().any(|v| v == name) {
                vars.push(name.to_string());
            }
        }
    }
    vars
}

/// Substitute `{key}` placeholders from `values`.
///
/// Each placeholder is looked up once; substituted text is never scanned
/// again, so values may contain braces. Unknown placeholders are left as
/// they are; `{{`/`}}` become literal braces.
///
/// # Example
///
/// ```
/// use llm_runnable::prompt::render;
/// use std::collections::HashMap;
///
/// let values = HashMap::from([("name".to_string(), "Alice".to_string())]);
/// let result = render("Hello {name}, here is JSON: {{\"key\": \"val\"}}", &values);
/// assert_eq!(result, r#"Hello Alice, here is JSON: {"key": "val"}"#);
/// ```
pub fn render(template: &str, values: &HashMap<String, String>) -> String {
    let mut rendered = String::with_capacity(template.len());
    for segment in segments(template) {
        match segment {
            Segment::Literal(text) => rendered.push_str(text),
            Segment::Variable(name) => match values.get(name) {
                Some(value) => rendered.push_str(value),
                None => {
                    rendered.push('{');
                    rendered.push_str(name);
                    rendered.push('}');
                }
            },
        }
    }
    rendered
}

/// Convert a `Value` to the text substituted into a template.
pub(crate) fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Bind an invocation input to template variables.
///
/// Objects bind by key. Any other value binds to the single unbound
/// variable when exactly one exists, so a prompt can follow a unit that
/// produces plain text.
pub(crate) fn bind_input(input: Value, unbound: &[String]) -> std::result::Result<Map<String, Value>, PromptError> {
    match input {
        Value::Object(map) => Ok(map),
        other if unbound.len() == 1 => {
            let mut map = Map::new();
            map.insert(unbound[0].clone(), other);
            Ok(map)
        }
        other => Err(PromptError::InvalidInput {
            expected: unbound.to_vec(),
            got: json_type(&other),
        }),
    }
}

/// A string prompt template.
///
/// Input variables are inferred from the template. Partial variables are
/// bound at construction (e.g. a parser's format instructions) and may be
/// overridden by the input.
///
/// # Example
///
/// ```
/// use llm_runnable::PromptTemplate;
/// use serde_json::json;
///
/// let prompt = PromptTemplate::new("Write a {kind} about {topic}")
///     .with_partial("kind", "tweet");
/// assert_eq!(prompt.input_variables(), ["topic"]);
///
/// let text = prompt.format(json!({"topic": "CRISPR"})).unwrap();
/// assert_eq!(text, "Write a tweet about CRISPR");
/// ```
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    name: String,
    template: String,
    variables: Vec<String>,
    partials: HashMap<String, String>,
}

impl PromptTemplate {
    /// Create a template; its variables are read from the placeholders.
    pub fn new(template: impl Into<String>) -> Self {
        let template = template.into();
        Self {
            name: "prompt".to_string(),
            variables: template_variables(&template),
            template,
            partials: HashMap::new(),
        }
    }

    /// Set the instance name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Pre-bind a variable.
    pub fn with_partial(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.partials.insert(key.into(), value.into());
        self
    }

    /// Returns the raw template.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Variables that must come from the input (partials excluded).
    pub fn input_variables(&self) -> Vec<&str> {
        self.variables
            .iter()
            .filter(|v| !self.partials.contains_key(v.as_str()))
            .map(|v| v.as_str())
            .collect()
    }

    /// Format the template from an invocation input.
    pub fn format(&self, input: Value) -> std::result::Result<String, PromptError> {
        let unbound: Vec<String> = self.input_variables().into_iter().map(String::from).collect();
        let bindings = bind_input(input, &unbound)?;
        self.format_map(&bindings)
    }

    /// Format the template from an explicit variable map.
    pub fn format_map(&self, bindings: &Map<String, Value>) -> std::result::Result<String, PromptError> {
        let mut values = HashMap::with_capacity(self.variables.len());
        for var in &self.variables {
            let text = match bindings.get(var) {
                Some(value) => value_to_text(value),
                None => self
                    .partials
                    .get(var)
                    .cloned()
                    .ok_or_else(|| PromptError::MissingVariable(var.clone()))?,
            };
            values.insert(var.clone(), text);
        }
        Ok(render(&self.template, &values))
    }
}

impl Runnable for PromptTemplate {
    fn kind(&self) -> &'static str {
        "prompt"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn invoke<'a>(&'a self, _ctx: &'a ExecCtx, input: Value) -> BoxFut<'a, Result<Value>> {
        Box::pin(async move {
            self.format(input)
                .map(Value::String)
                .map_err(|e| RunnableError::unit(&self.name, e))
        })
    }
}
