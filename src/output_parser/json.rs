//! JSON extraction from model responses.
//!
//! [`parse_json`] tries, in order: the whole cleaned text, a ```` ```json ````
//! block, any fenced block that looks like JSON, then the last bracketed
//! object or array in the prose.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::{truncate, ParseError};
use super::extract::{code_block_for, code_blocks, find_bracketed, preprocess};
use super::input_text;
use crate::{
    error::Result,
    exec_ctx::ExecCtx,
    runnable::{BoxFut, Runnable},
    RunnableError,
};

/// Parse a model response into a typed value.
///
/// # Examples
///
/// ```
/// use serde::Deserialize;
/// use llm_runnable::output_parser::parse_json;
///
/// #[derive(Deserialize)]
/// struct Review {
///     sentiment: String,
/// }
///
/// let response = r#"<think>weighing it</think>Result: {"sentiment": "positive"}"#;
/// let review: Review = parse_json(response).unwrap();
/// assert_eq!(review.sentiment, "positive");
/// ```
pub fn parse_json<T: DeserializeOwned>(response: &str) -> std::result::Result<T, ParseError> {
    let candidate = json_candidate(response)?;
    serde_json::from_str::<T>(&candidate).map_err(|e| ParseError::DeserializationFailed {
        reason: e.to_string(),
        raw_json: truncate(&candidate, 200),
    })
}

/// Parse into an untyped [`Value`].
pub fn parse_json_value(response: &str) -> std::result::Result<Value, ParseError> {
    parse_json(response)
}

/// The most plausible JSON text in `response`.
fn json_candidate(response: &str) -> std::result::Result<String, ParseError> {
    let cleaned = preprocess(response);
    if cleaned.is_empty() {
        return Err(ParseError::EmptyResponse);
    }

    let is_json = |s: &str| serde_json::from_str::<Value>(s).is_ok();

    if is_json(&cleaned) {
        return Ok(cleaned);
    }

    // A ```json block wins even when it does not parse.
    if let Some(content) = code_block_for(&cleaned, "json") {
        return Ok(content.to_string());
    }

    if let Some(block) = code_blocks(&cleaned)
        .into_iter()
        .find(|b| b.content.starts_with('{') || b.content.starts_with('['))
    {
        return Ok(block.content.to_string());
    }

    for (open, close) in [('{', '}'), ('[', ']')] {
        if let Some(found) = find_bracketed(&cleaned, open, close) {
            return Ok(found.to_string());
        }
    }

    Err(ParseError::Unparseable {
        expected_format: "JSON",
        text: truncate(&cleaned, 200),
    })
}

/// Runnable parsing model text into a JSON value.
///
/// With [`with_required_keys`](Self::with_required_keys) the result must be
/// an object in which each listed key is present and non-null.
///
/// # Example
///
/// ```
/// use llm_runnable::{ExecCtx, JsonOutputParser, RunnableExt};
/// use serde_json::json;
///
/// let parser = JsonOutputParser::new().with_required_keys(&["sentiment"]);
/// let ctx = ExecCtx::new();
/// let out = tokio_test::block_on(
///     parser.run(&ctx, json!("```json\n{\"sentiment\": \"negative\"}\n```")),
/// )
/// .unwrap();
/// assert_eq!(out, json!({"sentiment": "negative"}));
/// ```
#[derive(Debug, Clone)]
pub struct JsonOutputParser {
    name: String,
    required_keys: Vec<String>,
}

impl JsonOutputParser {
    pub fn new() -> Self {
        Self {
            name: "json_parser".to_string(),
            required_keys: Vec::new(),
        }
    }

    /// Set the instance name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Require these keys to be present and non-null.
    pub fn with_required_keys(mut self, keys: &[&str]) -> Self {
        self.required_keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    /// Instructions to embed in a prompt, e.g. as a partial variable.
    pub fn format_instructions(&self) -> String {
        if self.required_keys.is_empty() {
            "Return a JSON object.".to_string()
        } else {
            format!(
                "Return a JSON object with the keys {}. Respond with JSON only.",
                self.required_keys
                    .iter()
                    .map(|k| format!("\"{k}\""))
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        }
    }

    /// Parse `text` and check required keys.
    pub fn parse(&self, text: &str) -> std::result::Result<Value, ParseError> {
        let value = parse_json_value(text)?;
        if self.required_keys.is_empty() {
            return Ok(value);
        }
        let missing: Vec<String> = self
            .required_keys
            .iter()
            .filter(|k| value.get(k.as_str()).map_or(true, Value::is_null))
            .cloned()
            .collect();
        if missing.is_empty() {
            Ok(value)
        } else {
            Err(ParseError::MissingKeys(missing))
        }
    }
}

impl Default for JsonOutputParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Runnable for JsonOutputParser {
    fn kind(&self) -> &'static str {
        "json_parser"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn invoke<'a>(&'a self, _ctx: &'a ExecCtx, input: Value) -> BoxFut<'a, Result<Value>> {
        Box::pin(async move {
            input_text(&input)
                .and_then(|text| self.parse(text))
                .map_err(|e| RunnableError::unit(&self.name, e))
        })
    }
}
