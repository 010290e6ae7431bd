//! The response-unwrapping rule shared by live graph execution and any
//! test-only direct-call entry point (spec §4.F), so observed outputs are
//! byte-identical between the two paths.

use rmcp::model::{CallToolResult, RawContent};
use serde_json::Value;

/// Unwraps a downstream tool's successful response per spec §4.F:
/// 1. `structuredContent`, if present and non-null, wins verbatim.
/// 2. Otherwise, the first content item: if it's text, attempt to
///    JSON-parse it and fall back to the raw string on failure.
/// 3. Otherwise, the first content element as-is.
/// 4. No content at all unwraps to `null`.
pub fn unwrap_response(result: &CallToolResult) -> Value {
    if let Some(structured) = &result.structured_content {
        if !structured.is_null() {
            return structured.clone();
        }
    }

    let Some(first) = result.content.first() else {
        return Value::Null;
    };

    if let RawContent::Text(text_content) = &first.raw {
        return serde_json::from_str(&text_content.text)
            .unwrap_or_else(|_| Value::String(text_content.text.clone()));
    }

    serde_json::to_value(first).unwrap_or(Value::Null)
}

/// Extracts a human-readable message from a response's first text
/// content item, for [`toolgraph_types::DownstreamToolError`]'s
/// `message` field. Empty string if there is no text content.
pub fn extract_message(result: &CallToolResult) -> String {
    result
        .content
        .iter()
        .find_map(|c| match &c.raw {
            RawContent::Text(t) => Some(t.text.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::model::{AnnotateAble, Content, RawTextContent};
    use serde_json::json;

    fn text_result(text: &str, structured: Option<Value>) -> CallToolResult {
        CallToolResult {
            content: vec![Content::new(RawContent::Text(RawTextContent { text: text.to_string(), meta: None }), None)],
            structured_content: structured,
            is_error: Some(false),
            meta: None,
        }
    }

    #[test]
    fn structured_content_wins_verbatim() {
        let result = text_result("ignored", Some(json!({"count": 3})));
        assert_eq!(unwrap_response(&result), json!({"count": 3}));
    }

    #[test]
    fn null_structured_content_falls_through_to_text() {
        let result = text_result("{\"count\": 3}", Some(Value::Null));
        assert_eq!(unwrap_response(&result), json!({"count": 3}));
    }

    #[test]
    fn valid_json_text_is_parsed() {
        let result = text_result("{\"ok\": true}", None);
        assert_eq!(unwrap_response(&result), json!({"ok": true}));
    }

    #[test]
    fn non_json_text_falls_back_to_raw_string() {
        let result = text_result("not json", None);
        assert_eq!(unwrap_response(&result), json!("not json"));
    }

    #[test]
    fn no_content_unwraps_to_null() {
        let result = CallToolResult {
            content: vec![],
            structured_content: None,
            is_error: Some(false),
            meta: None,
        };
        assert_eq!(unwrap_response(&result), Value::Null);
    }

    #[test]
    fn extract_message_reads_first_text_item() {
        let result = text_result("boom: disk full", None);
        assert_eq!(extract_message(&result), "boom: disk full");
    }
}
