//! Extraction helpers shared by every parser: preprocessing, fenced code
//! blocks and bracket matching.

/// Strip `<think>` blocks, then trim whitespace.
pub fn preprocess(text: &str) -> String {
    strip_think_tags(text).trim().to_string()
}

/// Remove every `<think>...</think>` and `<thinking>...</thinking>` block.
///
/// An unclosed block swallows the rest of the text.
///
/// ```
/// use llm_runnable::output_parser::strip_think_tags;
///
/// assert_eq!(strip_think_tags("<think>hmm</think>42"), "42");
/// assert_eq!(strip_think_tags("<thinking>cut off"), "");
/// ```
pub fn strip_think_tags(text: &str) -> String {
    ["think", "thinking"]
        .iter()
        .fold(text.to_string(), |acc, tag| strip_tag(&acc, tag))
}

fn strip_tag(text: &str, tag: &str) -> String {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(&open) {
        out.push_str(&rest[..start]);
        match rest[start..].find(&close) {
            Some(end) => rest = &rest[start + end + close.len()..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

/// A fenced markdown code block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeBlock<'a> {
    /// Language hint after the opening fence, if any.
    pub lang: Option<&'a str>,
    /// Trimmed block content.
    pub content: &'a str,
}

/// Every complete fenced code block in `text`, in order.
///
/// ```
/// use llm_runnable::output_parser::extract::code_blocks;
///
/// let blocks = code_blocks("Here:\n```json\n{\"a\": 1}\n```");
/// assert_eq!(blocks[0].lang, Some("json"));
/// assert_eq!(blocks[0].content, "{\"a\": 1}");
/// ```
pub fn code_blocks(text: &str) -> Vec<CodeBlock<'_>> {
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find("```") {
        let after = &rest[open + 3..];
        let Some(line_end) = after.find('\n') else {
            break;
        };
        let hint = after[..line_end].trim();
        let body = &after[line_end + 1..];
        let Some(close) = body.find("```") else {
            break;
        };
        blocks.push(CodeBlock {
            lang: (!hint.is_empty()).then_some(hint),
            content: body[..close].trim(),
        });
        rest = &body[close + 3..];
    }
    blocks
}

/// Content of the first code block tagged `lang` (case-insensitive).
pub fn code_block_for<'a>(text: &'a str, lang: &str) -> Option<&'a str> {
    code_blocks(text)
        .into_iter()
        .find(|b| b.lang.is_some_and(|l| l.eq_ignore_ascii_case(lang)))
        .map(|b| b.content)
}

/// The last complete top-level region delimited by `open`/`close`.
///
/// Nesting-aware and skips delimiters inside JSON strings. The last match
/// wins since models tend to put their answer after any preamble.
///
/// ```
/// use llm_runnable::output_parser::extract::find_bracketed;
///
/// let text = r#"Example {"x": 0}. Answer: {"a": [1, 2]}"#;
/// assert_eq!(find_bracketed(text, '{', '}'), Some(r#"{"a": [1, 2]}"#));
/// ```
pub fn find_bracketed(text: &str, open: char, close: char) -> Option<&str> {
    let mut best = None;
    let mut from = 0;
    while let Some(offset) = text[from..].find(open) {
        let start = from + offset;
        let Some(end) = matching_close(&text[start..], open, close) else {
            break;
        };
        best = Some(&text[start..=start + end]);
        from = start + end + close.len_utf8();
    }
    best
}

/// Byte offset of the delimiter closing the one at the start of `text`.
fn matching_close(text: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        if ch == '"' {
            in_string = true;
        } else if ch == open {
            depth += 1;
        } else if ch == close {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn think_blocks_removed() {
        assert_eq!(strip_think_tags("<think>a</think>mid<thinking>b</thinking>end"), "midend");
        assert_eq!(strip_think_tags("<think>1</think>x<think>2</think>y"), "xy");
        assert_eq!(strip_think_tags("plain"), "plain");
    }

    #[test]
    fn unclosed_think_block_drops_tail() {
        assert_eq!(strip_think_tags("keep<think>lost"), "keep");
    }

    #[test]
    fn preprocess_trims() {
        assert_eq!(preprocess("  <think>x</think>  hello  "), "hello");
    }

    #[test]
    fn bare_and_tagged_blocks() {
        let text = "```\nfirst\n```\nthen\n```JSON\n[1]\n```";
        let blocks = code_blocks(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0], CodeBlock { lang: None, content: "first" });
        assert_eq!(code_block_for(text, "json"), Some("[1]"));
        assert_eq!(code_block_for(text, "yaml"), None);
    }

    #[test]
    fn unterminated_block_ignored() {
        assert!(code_blocks("```json\n{\"a\": 1}").is_empty());
    }

    #[test]
    fn bracketed_nested_and_strings() {
        assert_eq!(
            find_bracketed(r#"{"outer": {"inner": "[}"}}"#, '{', '}'),
            Some(r#"{"outer": {"inner": "[}"}}"#)
        );
        assert_eq!(find_bracketed(r#"[1] then ["a"]"#, '[', ']'), Some(r#"["a"]"#));
        assert_eq!(find_bracketed("none here", '{', '}'), None);
        assert_eq!(find_bracketed("{ unclosed", '{', '}'), None);
    }
}
