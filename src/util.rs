/// Pull a JSON object out of free-form model output.
///
/// Tries a ```` ```json ```` fence, then any fence containing a brace, then
/// the first balanced `{...}` in the raw text.
pub fn extract_json(response: &str) -> Option<String> {
    if let Some(start) = response.find("```json") {
        let after_marker = &response[start + 7..];
        if let Some(end) = after_marker.find("```") {
            return Some(after_marker[..end].trim().to_string());
        }
    }

    if let Some(start) = response.find("```") {
        let after_marker = &response[start + 3..];
        if let Some(end) = after_marker.find("```")
            && let Some(json_start) = after_marker[..end].find('{')
        {
            return Some(after_marker[json_start..end].trim().to_string());
        }
    }

    extract_json_object(response)
}

/// First balanced `{...}` in `text`. Braces inside string literals are
/// skipped so a reason like `"use {braces}"` does not end the object early.
pub fn extract_json_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..start + i + 1].to_string());
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
    fn test_extract_json_from_json_fence() {
        let text = "Decision:\n```json\n{\"next\": \"generator\"}\n```\nthanks";
        assert_eq!(extract_json(text).unwrap(), "{\"next\": \"generator\"}");
    }

    #[test]
    fn test_extract_json_from_plain_fence() {
        let text = "```\n{\"next\": \"loop\"}\n```";
        assert_eq!(extract_json(text).unwrap(), "{\"next\": \"loop\"}");
    }

    #[test]
    fn test_extract_json_raw_object() {
        let text = "I think {\"next\": \"refiner\", \"reason\": \"vague\"} is right";
        assert_eq!(
            extract_json(text).unwrap(),
            "{\"next\": \"refiner\", \"reason\": \"vague\"}"
        );
    }

    #[test]
    fn test_extract_json_object_nested_and_braces_in_strings() {
        assert_eq!(
            extract_json_object("x {\"a\": {\"b\": 1}} y").unwrap(),
            "{\"a\": {\"b\": 1}}"
        );
        assert_eq!(
            extract_json_object(r#"{"reason": "uses } and \" quotes"}"#).unwrap(),
            r#"{"reason": "uses } and \" quotes"}"#
        );
    }

    #[test]
    fn test_extract_json_none() {
        assert!(extract_json("no json here").is_none());
        assert!(extract_json_object("{ unbalanced").is_none());
    }
}
