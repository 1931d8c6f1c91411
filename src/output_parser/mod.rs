//! # Output parsers
//!
//! Runnables that turn raw model text into structured values, plus the
//! parsing functions behind them. Every parser strips `<think>` blocks
//! first and tolerates markdown fences and surrounding prose.
//!
//! | Unit | Function | Output |
//! |------|----------|--------|
//! | [`StrOutputParser`] | [`parse_text`] | string |
//! | [`JsonOutputParser`] | [`parse_json_value`] | any JSON value |
//! | [`ListOutputParser`] | [`parse_list`] | array of strings |

pub mod error;
pub mod extract;
pub mod json;
pub mod list;
pub mod text;

pub use error::ParseError;
pub use extract::{preprocess, strip_think_tags};
pub use json::{parse_json, parse_json_value, JsonOutputParser};
pub use list::{parse_list, ListOutputParser};
pub use text::{parse_text, StrOutputParser};

use serde_json::Value;

/// Text of a value handed to a parser.
///
/// Strings are used as-is and message objects contribute their `content`.
pub(crate) fn input_text(value: &Value) -> Result<&str, ParseError> {
    match value {
        Value::String(s) => Ok(s),
        Value::Object(map) => map
            .get("content")
            .and_then(Value::as_str)
            .ok_or(ParseError::NotText("object without string 'content'")),
        Value::Null => Err(ParseError::NotText("null")),
        Value::Bool(_) => Err(ParseError::NotText("boolean")),
        Value::Number(_) => Err(ParseError::NotText("number")),
        Value::Array(_) => Err(ParseError::NotText("array")),
    }
}
