//! Plain-text output.

use serde_json::Value;

use super::error::ParseError;
use super::extract::preprocess;
use super::input_text;
use crate::{
    error::Result,
    exec_ctx::ExecCtx,
    runnable::{BoxFut, Runnable},
    RunnableError,
};

/// Openers removed along with the text that follows them.
const SIMPLE_PREFIXES: &[&str] = &[
    "Sure! ",
    "Sure, ",
    "Sure.\n",
    "Of course! ",
    "Of course, ",
    "Of course.\n",
    "Certainly! ",
    "Certainly, ",
    "Certainly.\n",
    "Absolutely! ",
    "Absolutely, ",
];

/// Openers removed up to the end of their line (or first colon).
const LINE_PREFIXES: &[&str] = &["Here's ", "Here is "];

/// Clean a model response for use as prose.
///
/// Strips `<think>` blocks and one boilerplate opener such as "Sure!" or
/// "Here's the answer:". Fails with [`ParseError::EmptyResponse`] if nothing
/// is left.
///
/// ```
/// use llm_runnable::output_parser::parse_text;
///
/// assert_eq!(parse_text("Sure! Paris is the capital.").unwrap(), "Paris is the capital.");
/// ```
pub fn parse_text(response: &str) -> std::result::Result<String, ParseError> {
    let cleaned = preprocess(response);
    let text = strip_opener(&cleaned).trim();
    if text.is_empty() {
        return Err(ParseError::EmptyResponse);
    }
    Ok(text.to_string())
}

fn strip_opener(text: &str) -> &str {
    if let Some(rest) = SIMPLE_PREFIXES.iter().find_map(|p| text.strip_prefix(p)) {
        return rest;
    }
    for prefix in LINE_PREFIXES {
        if let Some(rest) = text.strip_prefix(prefix) {
            if let Some(pos) = rest.find('\n').or_else(|| rest.find(':')) {
                return rest[pos + 1..].trim_start();
            }
        }
    }
    text
}

/// Runnable producing the model's text as a string.
///
/// By default the text passes through untouched; message objects contribute
/// their `content`. [`cleaned`](Self::cleaned) additionally applies
/// [`parse_text`].
#[derive(Debug, Clone)]
pub struct StrOutputParser {
    name: String,
    clean: bool,
}

impl StrOutputParser {
    pub fn new() -> Self {
        Self {
            name: "str_parser".to_string(),
            clean: false,
        }
    }

    /// Strip think blocks and boilerplate openers.
    pub fn cleaned(mut self) -> Self {
        self.clean = true;
        self
    }

    /// Set the instance name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Parse a response according to this parser's settings.
    pub fn parse(&self, text: &str) -> std::result::Result<String, ParseError> {
        if self.clean {
            parse_text(text)
        } else {
            Ok(text.to_string())
        }
    }
}

impl Default for StrOutputParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Runnable for StrOutputParser {
    fn kind(&self) -> &'static str {
        "str_parser"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn invoke<'a>(&'a self, _ctx: &'a ExecCtx, input: Value) -> BoxFut<'a, Result<Value>> {
        Box::pin(async move {
            input_text(&input)
                .and_then(|text| self.parse(text))
                .map(Value::String)
                .map_err(|e| RunnableError::unit(&self.name, e))
        })
    }
}
