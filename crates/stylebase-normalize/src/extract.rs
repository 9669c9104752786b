use serde_json::Value;

use crate::errors::NormalizeError;

/// Pulls a JSON object out of a possibly markdown-wrapped, prose-padded
/// or mildly broken model response. Strategies are attempted in order of
/// increasing aggressiveness; the first object that parses wins.
pub fn extract_json(raw: &str) -> Result<Value, NormalizeError> {
    let trimmed = raw.trim();

    // (a) strict parse when the text is already a bare object
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
            return Ok(value);
        }
    }

    // (b) strip markdown code fences and stray backticks
    let unfenced = strip_fences(trimmed);
    let unfenced_trimmed = unfenced.trim();
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(unfenced_trimmed) {
        return Ok(value);
    }

    // (c) widest braced substring, over the fence-stripped text so a
    // fenced object surrounded by prose still extracts
    if let Some(candidate) = braced_substring(unfenced_trimmed) {
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(candidate) {
            return Ok(value);
        }

        // (d) last resort: drop trailing commas and control characters
        let repaired = strip_control_chars(&remove_trailing_commas(candidate));
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(&repaired) {
            return Ok(value);
        }
    }

    Err(NormalizeError::unparsable(raw))
}

fn strip_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
        .replace('`', "")
}

fn braced_substring(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

/// Removes commas that directly precede a closing bracket, outside of
/// string literals.
fn remove_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let chars: Vec<char> = text.chars().collect();
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

fn strip_control_chars(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_bare_object() {
        let value = extract_json(r#"{"tags": ["a"]}"#).unwrap();
        assert_eq!(value, json!({"tags": ["a"]}));
    }

    #[test]
    fn strips_markdown_fences() {
        let raw = "```json\n{\"tags\": [\"a\"]}\n```";
        let value = extract_json(raw).unwrap();
        assert_eq!(value, json!({"tags": ["a"]}));
    }

    #[test]
    fn extracts_object_surrounded_by_prose() {
        let raw = "Sure! Here is the analysis you asked for:\n{\"tags\": [\"b\"]}\nHope that helps.";
        let value = extract_json(raw).unwrap();
        assert_eq!(value, json!({"tags": ["b"]}));
    }

    #[test]
    fn extracts_fenced_object_surrounded_by_prose() {
        let raw = "Here you go:\n```json\n{\"tags\": [\"c\"]}\n```\nLet me know!";
        let value = extract_json(raw).unwrap();
        assert_eq!(value, json!({"tags": ["c"]}));
    }

    #[test]
    fn repairs_trailing_commas() {
        let raw = r#"{"tags": ["a", "b",], "subjects": [],}"#;
        let value = extract_json(raw).unwrap();
        assert_eq!(value, json!({"tags": ["a", "b"], "subjects": []}));
    }

    #[test]
    fn repairs_control_characters() {
        let raw = "{\"tags\": [\"a\u{0007}b\"],}";
        let value = extract_json(raw).unwrap();
        assert_eq!(value, json!({"tags": ["ab"]}));
    }

    #[test]
    fn trailing_comma_inside_string_survives() {
        let raw = r#"{"prompts": {"story": "a, b,}", "mix": "",},}"#;
        let value = extract_json(raw).unwrap();
        assert_eq!(value["prompts"]["story"], "a, b,}");
    }

    #[test]
    fn garbage_is_an_error_not_a_panic() {
        for raw in [
            "",
            "no json here",
            "   \n\t  ",
            "}{",
            "```\nstill nothing\n```",
            "{not: valid! json}",
            "[1, 2, 3]",
        ] {
            let err = extract_json(raw).unwrap_err();
            assert_eq!(err.obj().code, "NORMALIZE.UNPARSABLE");
        }
    }
}
