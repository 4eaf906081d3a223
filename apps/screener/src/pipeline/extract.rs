//! JSON extraction from free-form LLM output.
//!
//! Generated text routinely wraps the JSON payload in prose, markdown fences,
//! or trailing commentary. Extraction first tries the greedy span from the
//! first `{` to the last `}` — the historical heuristic, kept for behavior
//! compatibility. That span is NOT valid JSON when the response contains
//! multiple independent objects, so a balanced-bracket scan over complete
//! candidate objects runs as the fallback. Each candidate gets a strict parse
//! and then one repaired parse before moving to the next.
//!
//! No error escapes this module: all parse failures collapse into
//! `ExtractionFailure` and the caller degrades to storing the raw text.

use serde_json::Value;
use tracing::debug;

/// Signal that no candidate substring parsed as JSON, even after repair.
/// Non-fatal: the stage stores the raw response text instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionFailure;

/// Extracts the first parseable JSON value embedded in `text`.
pub fn extract_json(text: &str) -> Result<Value, ExtractionFailure> {
    if let Some(span) = greedy_span(text) {
        if let Some(value) = parse_or_repair(span) {
            return Ok(value);
        }
    }

    for candidate in balanced_objects(text) {
        if let Some(value) = parse_or_repair(candidate) {
            return Ok(value);
        }
        debug!("candidate JSON block failed strict and repaired parse");
    }

    Err(ExtractionFailure)
}

/// The substring from the first `{` to the last `}`, if both exist in order.
fn greedy_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end >= start).then(|| &text[start..=end])
}

fn parse_or_repair(candidate: &str) -> Option<Value> {
    match serde_json::from_str(candidate) {
        Ok(value) => Some(value),
        Err(err) => {
            debug!(%err, "strict JSON parse failed, attempting repair");
            serde_json::from_str(&repair_json(candidate)).ok()
        }
    }
}

/// Complete top-level `{...}` blocks found by a string-aware depth scan.
fn balanced_objects(text: &str) -> Vec<&str> {
    let mut objects = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in text.as_bytes().iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' if depth > 0 => in_string = true,
            b'{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            b'}' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        objects.push(&text[start..=i]);
                    }
                }
            }
            _ => {}
        }
    }

    objects
}

/// Best-effort normalization of near-valid JSON. Applied only after strict
/// parsing fails; the result is re-parsed and may still be invalid.
///
/// 1. Drop trailing commas immediately before a closing `}` or `]`.
/// 2. Append closers for unmatched `{` and `[` by raw count (assumes
///    well-formed nesting order, not content).
/// 3. Truncate everything after the last `}`.
pub fn repair_json(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 4);

    let mut i = 0;
    while i < chars.len() {
        if chars[i] == ',' {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j < chars.len() && (chars[j] == '}' || chars[j] == ']') {
                i += 1;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }

    let open_braces = out.matches('{').count();
    let close_braces = out.matches('}').count();
    let open_brackets = out.matches('[').count();
    let close_brackets = out.matches(']').count();
    for _ in close_braces..open_braces {
        out.push('}');
    }
    for _ in close_brackets..open_brackets {
        out.push(']');
    }

    if let Some(last) = out.rfind('}') {
        out.truncate(last + 1);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_json_extracts_same_as_strict_parse() {
        let text = r#"{"score": 85, "skills": ["rust", "sql"]}"#;
        let extracted = extract_json(text).unwrap();
        let strict: Value = serde_json::from_str(text).unwrap();
        assert_eq!(extracted, strict);
    }

    #[test]
    fn test_json_surrounded_by_prose() {
        let text = "Here is the analysis you asked for:\n{\"score\": 72}\nLet me know if you need more.";
        assert_eq!(extract_json(text).unwrap(), json!({"score": 72}));
    }

    #[test]
    fn test_json_inside_markdown_fences() {
        let text = "```json\n{\"decision\": \"REVIEW\"}\n```";
        assert_eq!(extract_json(text).unwrap(), json!({"decision": "REVIEW"}));
    }

    #[test]
    fn test_repair_removes_all_trailing_commas() {
        let repaired = repair_json("{\"a\": [1, 2, ], \"b\": {\"c\": 3, }, }");
        let value: Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(value, json!({"a": [1, 2], "b": {"c": 3}}));
    }

    #[test]
    fn test_repair_appends_exactly_missing_closers() {
        let repaired = repair_json("{\"a\": {\"b\": 1");
        assert_eq!(repaired, "{\"a\": {\"b\": 1}}");
        let value: Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(value, json!({"a": {"b": 1}}));
    }

    #[test]
    fn test_repair_truncates_trailing_commentary() {
        let repaired = repair_json("{\"a\": 1} and that concludes the audit.");
        assert_eq!(repaired, "{\"a\": 1}");
    }

    #[test]
    fn test_extract_repairs_unclosed_outer_object() {
        // Greedy span ends at the inner `}`; repair appends the missing
        // outer closer.
        let text = "Result: {\"outer\": {\"score\": 60}";
        assert_eq!(
            extract_json(text).unwrap(),
            json!({"outer": {"score": 60}})
        );
    }

    #[test]
    fn test_multiple_objects_falls_back_to_first_balanced_block() {
        // The greedy span covers both objects and is unparseable; the
        // balanced scan isolates the first complete object.
        let text = "{\"first\": 1}\nsome commentary\n{\"second\": 2}";
        assert_eq!(extract_json(text).unwrap(), json!({"first": 1}));
    }

    #[test]
    fn test_balanced_scan_skips_malformed_first_block() {
        let text = "{\"broken\": } then {\"ok\": true}";
        assert_eq!(extract_json(text).unwrap(), json!({"ok": true}));
    }

    #[test]
    fn test_braces_inside_strings_do_not_split_blocks() {
        let text = "{\"note\": \"uses {braces} inside\", \"n\": 1}";
        assert_eq!(
            extract_json(text).unwrap(),
            json!({"note": "uses {braces} inside", "n": 1})
        );
    }

    #[test]
    fn test_no_json_at_all_is_extraction_failure() {
        assert_eq!(
            extract_json("I cannot produce a score for this resume."),
            Err(ExtractionFailure)
        );
    }

    #[test]
    fn test_unrepairable_json_is_extraction_failure() {
        assert_eq!(extract_json("{\"a\": }"), Err(ExtractionFailure));
    }
}
