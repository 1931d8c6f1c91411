//! Error types for output parsers.

/// Errors returned by output parsers.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The model response was empty or whitespace-only.
    #[error("empty LLM response")]
    EmptyResponse,

    /// The parser input was not text.
    #[error("output parser expects text, got {0}")]
    NotText(&'static str),

    /// No parsing strategy could extract the expected format.
    #[error("could not parse {expected_format} from LLM response: {text}")]
    Unparseable {
        /// The format the parser was trying to extract.
        expected_format: &'static str,
        /// A truncated copy of the cleaned text (max 200 chars).
        text: String,
    },

    /// JSON was found but failed to deserialize into the target type.
    #[error("JSON deserialization failed: {reason}")]
    DeserializationFailed {
        /// The serde error message.
        reason: String,
        /// The candidate JSON string, truncated.
        raw_json: String,
    },

    /// Parsed JSON lacks keys the parser was told to require.
    #[error("JSON output is missing required keys {0:?}")]
    MissingKeys(Vec<String>),
}

/// Truncate to at most `max_chars` characters, appending "..." if truncated.
pub(crate) fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
