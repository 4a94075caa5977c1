//! Robust recovery of structured payloads from free-form model text.
//!
//! Models frequently wrap their JSON in prose or markdown fencing despite
//! instructions. This parser tries a cascade of lenient strategies and never
//! fails: callers treat an empty result as "nothing extracted".

use serde_json::Value;

/// Extract a JSON array of records from a model response. Strategies, first
/// hit wins:
/// 1. the whole text as JSON (an object is wrapped in a one-element array)
/// 2. the interior of a fenced code block
/// 3. the substring from the first `[` to the last `]`
/// 4. the substring from the first `{` to the last `}`, wrapped
pub fn parse_json_array(response: &str) -> Vec<Value> {
    if let Some(values) = try_parse(response) {
        return values;
    }

    if let Some(inner) = fenced_block(response) {
        if let Some(values) = try_parse(inner) {
            return values;
        }
    }

    if let Some(slice) = delimited(response, '[', ']') {
        if let Ok(Value::Array(items)) = serde_json::from_str(slice) {
            return items;
        }
    }

    if let Some(slice) = delimited(response, '{', '}') {
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(slice) {
            return vec![value];
        }
    }

    Vec::new()
}

fn try_parse(text: &str) -> Option<Vec<Value>> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Array(items)) => Some(items),
        Ok(value @ Value::Object(_)) => Some(vec![value]),
        _ => None,
    }
}

/// The interior of the first triple-backtick fence, with an optional
/// language tag on the opening line.
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_fence = &text[open + 3..];
    // Skip the language tag line if present
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    let close = body.find("```")?;
    Some(body[..close].trim())
}

fn delimited(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pure_array() {
        let parsed = parse_json_array(r#"[{"name": "Acme"}, {"name": "John"}]"#);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0]["name"], "Acme");
    }

    #[test]
    fn test_single_object_wrapped() {
        let parsed = parse_json_array(r#"{"name": "Acme"}"#);
        assert_eq!(parsed, vec![json!({"name": "Acme"})]);
    }

    #[test]
    fn test_fenced_code_block_with_tag() {
        let response = "Here you go:\n```json\n[{\"name\":\"Acme\"}]\n```\nThanks!";
        let parsed = parse_json_array(response);
        assert_eq!(parsed, vec![json!({"name": "Acme"})]);
    }

    #[test]
    fn test_fenced_code_block_without_tag() {
        let response = "```\n[{\"name\":\"Acme\"}]\n```";
        let parsed = parse_json_array(response);
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn test_array_embedded_in_prose() {
        let response = "Sure! The entities are:\n[{\"name\": \"Acme\"}]\nLet me know if you need more.";
        let parsed = parse_json_array(response);
        assert_eq!(parsed, vec![json!({"name": "Acme"})]);
    }

    #[test]
    fn test_object_embedded_in_prose() {
        let response = "The result is {\"name\": \"Acme\"} as requested.";
        let parsed = parse_json_array(response);
        assert_eq!(parsed, vec![json!({"name": "Acme"})]);
    }

    #[test]
    fn test_no_json_returns_empty() {
        assert!(parse_json_array("no json here").is_empty());
        assert!(parse_json_array("").is_empty());
    }

    #[test]
    fn test_malformed_json_returns_empty() {
        assert!(parse_json_array("[{\"name\": unquoted}]").is_empty());
        assert!(parse_json_array("{broken").is_empty());
    }

    #[test]
    fn test_empty_array() {
        let parsed = parse_json_array("[]");
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_scalar_json_not_wrapped() {
        // A bare string or number is not a record payload
        assert!(parse_json_array("\"hello\"").is_empty());
        assert!(parse_json_array("42").is_empty());
    }
}
