//! JSON recovery for model output.
//!
//! Models often wrap JSON in prose or Markdown fences. Recovery runs
//! three stages in order: direct parse, fenced ```json block, first
//! balanced `{...}` / `[...]` region.

use serde_json::Value;

/// Attempts to extract a JSON value from raw model output.
pub fn extract_json(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    if let Some(fenced) = extract_fenced_block(trimmed)
        && let Ok(value) = serde_json::from_str::<Value>(&fenced)
    {
        return Some(value);
    }

    if let Some(region) = extract_balanced_region(trimmed)
        && let Ok(value) = serde_json::from_str::<Value>(&region)
    {
        return Some(value);
    }

    None
}

/// Content of the first ``` or ```json fence.
fn extract_fenced_block(text: &str) -> Option<String> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    // Skip an optional language tag up to the first newline.
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim().to_string())
}

/// The first balanced `{...}` or `[...]` region, tracking strings and
/// escapes so braces inside string literals do not confuse the scan.
fn extract_balanced_region(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let start = text.find(['{', '['])?;
    let open = bytes[start];
    let close = if open == b'{' { b'}' } else { b']' };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match byte {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            _ if in_string => {}
            b if b == open => depth += 1,
            b if b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..start + offset + 1].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_parse() {
        let value = extract_json(r#"{"regime": "bull"}"#).unwrap();
        assert_eq!(value["regime"], "bull");
    }

    #[test]
    fn test_fenced_block() {
        let raw = "Here is my analysis:\n```json\n{\"regime\": \"bear\", \"confidence\": 0.7}\n```\nDone.";
        let value = extract_json(raw).unwrap();
        assert_eq!(value["regime"], "bear");
    }

    #[test]
    fn test_fence_without_language_tag() {
        let raw = "```\n[{\"symbol\": \"BTC/USDT\"}]\n```";
        let value = extract_json(raw).unwrap();
        assert_eq!(value[0]["symbol"], "BTC/USDT");
    }

    #[test]
    fn test_balanced_region_in_prose() {
        let raw = "The answer is {\"a\": {\"b\": 1}} as requested.";
        let value = extract_json(raw).unwrap();
        assert_eq!(value["a"]["b"], 1);
    }

    #[test]
    fn test_balanced_array() {
        let raw = "Signals: [{\"symbol\": \"ETH/USDT\", \"signal_type\": \"hold\"}] end";
        let value = extract_json(raw).unwrap();
        assert!(value.is_array());
    }

    #[test]
    fn test_braces_inside_strings() {
        let raw = r#"prefix {"note": "a } inside", "x": 1} suffix"#;
        let value = extract_json(raw).unwrap();
        assert_eq!(value["x"], 1);
    }

    #[test]
    fn test_escaped_quote_inside_string() {
        let raw = r#"{"note": "he said \"hi\"", "x": 2}"#;
        let value = extract_json(raw).unwrap();
        assert_eq!(value["x"], 2);
    }

    #[test]
    fn test_garbage_returns_none() {
        assert!(extract_json("not json").is_none());
        assert!(extract_json("").is_none());
        assert!(extract_json("{unbalanced").is_none());
    }
}
