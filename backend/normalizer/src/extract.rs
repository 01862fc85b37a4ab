//! Locating a JSON object inside free-form model output.
//!
//! Models wrap their answer in prose, Markdown fences, or both. Candidates are
//! tried from most to least literal and the first JSON object wins, preferring
//! one that carries a detection field.

use serde_json::{Map, Value};

const DETECTION_KEYS: &[&str] = &["found", "confidence", "boxes", "bounding_boxes", "bboxes"];

/// Find the JSON object the agent meant to return, if any.
pub fn extract_object(text: &str) -> Option<Map<String, Value>> {
    let raw = text.trim();
    if raw.is_empty() {
        return None;
    }

    if let Some(object) = parse_object(raw) {
        return Some(object);
    }
    if let Some(object) = fenced_body(raw).and_then(parse_object) {
        return Some(object);
    }

    let mut fallback = None;
    for (start, _) in raw.match_indices('{') {
        let Some(end) = balanced_end(raw, start) else {
            continue;
        };
        let Some(object) = parse_object(&raw[start..=end]) else {
            continue;
        };
        if DETECTION_KEYS.iter().any(|key| object.contains_key(*key)) {
            return Some(object);
        }
        fallback.get_or_insert(object);
    }
    fallback
}

fn parse_object(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(candidate.trim()) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

/// Body of the first ```-fenced block, without its language tag.
fn fenced_body(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_fence = &text[open + 3..];
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let close = body.find("```")?;
    Some(&body[..close])
}

/// Index of the `}` closing the object that opens at `start`. Braces inside
/// string literals are ignored.
fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(start + offset);
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
    fn parses_bare_object() {
        let object = extract_object(r#"{"found": false, "confidence": 0.1}"#).unwrap();
        assert_eq!(object["found"], Value::Bool(false));
    }

    #[test]
    fn strips_code_fence_with_language_tag() {
        let text = "Here you go:\n```json\n{\"found\": true, \"confidence\": 0.9, \"boxes\": []}\n```\nDone.";
        let object = extract_object(text).unwrap();
        assert_eq!(object["confidence"], serde_json::json!(0.9));
    }

    #[test]
    fn finds_object_inside_prose() {
        let text = "I looked carefully. Result: {\"found\": true, \"confidence\": 0.7, \"boxes\": [{\"x\": 0.1, \"y\": 0.1, \"w\": 0.2, \"h\": 0.2}]} Hope that helps {sic}.";
        let object = extract_object(text).unwrap();
        assert_eq!(object["boxes"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn ignores_braces_inside_strings() {
        let text = r#"note {"found": true, "confidence": 0.5, "label": "a } brace", "boxes": []} end"#;
        let object = extract_object(text).unwrap();
        assert_eq!(object["label"], Value::String("a } brace".into()));
    }

    #[test]
    fn prefers_object_with_detection_fields() {
        let text = r#"{"meta": 1} and then {"found": false, "confidence": 0.2}"#;
        let object = extract_object(text).unwrap();
        assert!(object.contains_key("found"));
    }

    #[test]
    fn plain_text_yields_nothing() {
        assert!(extract_object("I could not see a stop sign in this picture.").is_none());
        assert!(extract_object("   ").is_none());
        assert!(extract_object("[1, 2, 3]").is_none());
        assert!(extract_object("{ unterminated").is_none());
    }
}
