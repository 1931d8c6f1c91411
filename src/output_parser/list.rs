//! String list extraction.

use serde_json::Value;

use super::error::{truncate, ParseError};
use super::extract::{code_blocks, find_bracketed, preprocess};
use super::input_text;
use crate::{
    error::Result,
    exec_ctx::ExecCtx,
    runnable::{BoxFut, Runnable},
    RunnableError,
};

/// Object keys searched for a list when the model wraps it in an object.
const LIST_KEYS: &[&str] = &["items", "list", "results", "tags"];

/// Parse a model response into a list of trimmed, non-empty strings.
///
/// Strategies (in order):
/// 1. JSON array (whole text, fenced block, or bracketed in prose)
/// 2. JSON object holding an array under a common key ("items", "list", ...)
/// 3. Numbered or bulleted lines (at least two)
/// 4. Comma-separated fallback
///
/// Non-string JSON items are kept as their JSON text.
///
/// ```
/// use llm_runnable::output_parser::parse_list;
///
/// let items = parse_list("1. mitochondria\n2. ribosome\n3. nucleus").unwrap();
/// assert_eq!(items, ["mitochondria", "ribosome", "nucleus"]);
/// ```
pub fn parse_list(response: &str) -> std::result::Result<Vec<String>, ParseError> {
    let cleaned = preprocess(response);
    if cleaned.is_empty() {
        return Err(ParseError::EmptyResponse);
    }

    let items = json_list(&cleaned)
        .or_else(|| code_blocks(&cleaned).into_iter().find_map(|b| json_list(b.content)))
        .or_else(|| find_bracketed(&cleaned, '[', ']').and_then(json_list))
        .or_else(|| marked_lines(&cleaned))
        .unwrap_or_else(|| cleaned.split(',').map(str::to_string).collect());

    let items: Vec<String> = items
        .into_iter()
        .map(|s| s.trim().trim_matches('"').trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if items.is_empty() {
        return Err(ParseError::Unparseable {
            expected_format: "string list",
            text: truncate(&cleaned, 200),
        });
    }
    Ok(items)
}

/// A JSON array, or an object holding one under [`LIST_KEYS`].
fn json_list(text: &str) -> Option<Vec<String>> {
    let value: Value = serde_json::from_str(text.trim()).ok()?;
    let array = match &value {
        Value::Array(items) => items,
        Value::Object(map) => LIST_KEYS
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_array))?,
        _ => return None,
    };
    Some(
        array
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
    )
}

/// Items of a numbered (`1.`, `2)`) or bulleted (`-`, `*`, `•`) list.
fn marked_lines(text: &str) -> Option<Vec<String>> {
    let items: Vec<String> = text
        .lines()
        .filter_map(|line| strip_marker(line.trim()))
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect();
    (items.len() >= 2).then_some(items)
}

fn strip_marker(line: &str) -> Option<&str> {
    let digits = line.trim_start_matches(|c: char| c.is_ascii_digit());
    if digits.len() < line.len() {
        return digits
            .strip_prefix('.')
            .or_else(|| digits.strip_prefix(')'))
            .map(str::trim);
    }
    ["-", "*", "\u{2022}"]
        .iter()
        .find_map(|bullet| line.strip_prefix(bullet))
        .map(str::trim)
}

/// Runnable parsing model text into a JSON array of strings.
#[derive(Debug, Clone)]
pub struct ListOutputParser {
    name: String,
}

impl ListOutputParser {
    pub fn new() -> Self {
        Self {
            name: "list_parser".to_string(),
        }
    }

    /// Set the instance name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Instructions to embed in a prompt.
    pub fn format_instructions(&self) -> String {
        "Your response should be a list of comma separated values, eg: `foo, bar, baz`".to_string()
    }
}

impl Default for ListOutputParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Runnable for ListOutputParser {
    fn kind(&self) -> &'static str {
        "list_parser"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn invoke<'a>(&'a self, _ctx: &'a ExecCtx, input: Value) -> BoxFut<'a, Result<Value>> {
        Box::pin(async move {
            let items = input_text(&input)
                .and_then(parse_list)
                .map_err(|e| RunnableError::unit(&self.name, e))?;
            Ok(Value::from(items))
        })
    }
}
