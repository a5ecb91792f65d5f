//! Extraction of JSON objects embedded in model output.

use serde_json::Value;

/// Find the first JSON object in `text`.
///
/// Tolerates ```` ```json ```` fences and prose around the object. The first
/// balanced `{...}` span that parses is returned.
///
/// ```
/// use conclave_domain::core::json::extract_json_object;
///
/// let v = extract_json_object("Sure!\n```json\n{\"action\": \"final\"}\n```").unwrap();
/// assert_eq!(v["action"], "final");
/// assert!(extract_json_object("no json here").is_none());
/// ```
pub fn extract_json_object(text: &str) -> Option<Value> {
    let unfenced = strip_fences(text);
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(unfenced.trim()) {
        return Some(value);
    }

    let bytes = unfenced.as_bytes();
    let mut search_from = 0;
    while let Some(offset) = unfenced[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = balanced_end(bytes, start)
            && let Ok(value @ Value::Object(_)) =
                serde_json::from_str::<Value>(&unfenced[start..=end])
        {
            return Some(value);
        }
        search_from = start + 1;
    }
    None
}

fn strip_fences(text: &str) -> &str {
    let Some(open) = text.find("```") else {
        return text;
    };
    let after = &text[open + 3..];
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    match body.find("```") {
        Some(close) => &body[..close],
        None => body,
    }
}

/// Index of the `}` closing the object opened at `start`, honoring strings.
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
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
    fn test_plain_object() {
        let v = extract_json_object(r#"{"a": 1}"#).unwrap();
        assert_eq!(v["a"], 1);
    }

    #[test]
    fn test_object_in_prose_with_braces_in_strings() {
        let text = r#"Here you go: {"q": "fn main() { }", "n": 2} and done."#;
        let v = extract_json_object(text).unwrap();
        assert_eq!(v["q"], "fn main() { }");
    }

    #[test]
    fn test_skips_unparseable_brace_span() {
        let text = r#"{not json} then {"ok": true}"#;
        let v = extract_json_object(text).unwrap();
        assert_eq!(v["ok"], true);
    }

    #[test]
    fn test_arrays_are_not_objects() {
        assert!(extract_json_object("[1, 2]").is_none());
    }
}
