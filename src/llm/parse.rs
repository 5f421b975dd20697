//! Tolerant parsing of model planning output
//!
//! The planning prompt asks for a JSON list of zero or one tool calls, but
//! models routinely wrap the list in a fenced code block or emit a single
//! object instead of a list. Anything unparseable means "no tool call".

use serde_json::Value;

use crate::providers::ToolCall;

/// Parse the model's planning output into tool calls.
///
/// Returns an empty list on any parse failure; the loop treats that as
/// "done".
pub fn parse_tool_calls(response: &str) -> Vec<ToolCall> {
    let body = strip_code_fence(response).trim();

    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return Vec::new();
    };

    let items: Vec<Value> = match value {
        Value::Array(items) => items,
        object @ Value::Object(_) => vec![object],
        _ => return Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| {
            let name = item.get("name")?.as_str()?.to_string();
            let arguments = item
                .get("arguments")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            Some(ToolCall { name, arguments })
        })
        .collect()
}

/// Strip a surrounding markdown code fence, tolerating a language tag.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let after_fence = &trimmed[start + 3..];
    // Skip an optional language tag up to the first newline.
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    match body.rfind("```") {
        Some(end) => &body[..end],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_plain_list() {
        let calls =
            parse_tool_calls(r#"[{"name": "mouse_click", "arguments": {"x": 300, "y": 300}}]"#);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "mouse_click");
        assert_eq!(calls[0].arguments["x"], 300);
    }

    #[test]
    fn parses_a_fenced_list() {
        let calls = parse_tool_calls(
            "Here you go:\n```json\n[{\"name\": \"list_directory\", \"arguments\": {\"path\": \"./tmp\"}}]\n```",
        );
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "list_directory");
    }

    #[test]
    fn parses_a_bare_fence_without_language_tag() {
        let calls = parse_tool_calls("```\n[{\"name\": \"sleep\", \"arguments\": {\"ms\": 5}}]\n```");
        assert_eq!(calls.len(), 1);
    }

    #[test]
    fn single_object_is_wrapped() {
        let calls = parse_tool_calls(r#"{"name": "read_file", "arguments": {"path": "a"}}"#);
        assert_eq!(calls.len(), 1);
    }

    #[test]
    fn empty_list_means_done() {
        assert!(parse_tool_calls("[]").is_empty());
        assert!(parse_tool_calls("```json\n[]\n```").is_empty());
    }

    #[test]
    fn garbage_means_no_tool_call() {
        assert!(parse_tool_calls("I think we're finished here.").is_empty());
        assert!(parse_tool_calls("[{\"name\":").is_empty());
        assert!(parse_tool_calls("42").is_empty());
    }

    #[test]
    fn entries_without_a_name_are_dropped() {
        let calls = parse_tool_calls(r#"[{"arguments": {"x": 1}}]"#);
        assert!(calls.is_empty());
    }
}
