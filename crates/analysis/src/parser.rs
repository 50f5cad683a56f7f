//! Step Parser
//!
//! Converts a raw, loosely-structured run log into an ordered sequence of
//! well-typed `Step` records. The schema is permissive: missing optional
//! fields never fail, anomalies become data-quality warnings, and only a
//! fundamentally unparseable payload is rejected with
//! `CoreError::MalformedLog`.

use std::collections::HashSet;

use agent_mri_core::{CoreError, CoreResult, Step, StepKind};
use serde_json::Value;
use tracing::{debug, warn};

/// Parse a raw run log into ordered steps plus data-quality warnings.
///
/// Accepted shapes: a JSON array of step objects, or a JSON object carrying a
/// `steps` array (the envelope the agent's log writer emits). Input order is
/// preserved exactly; the parser never sorts.
pub fn parse(raw: &Value) -> CoreResult<(Vec<Step>, Vec<String>)> {
    let records = step_records(raw)?;

    let mut steps = Vec::with_capacity(records.len());
    let mut warnings = Vec::new();

    for (position, record) in records.iter().enumerate() {
        let obj = record.as_object().ok_or_else(|| {
            CoreError::malformed_log(format!(
                "step record at position {} is not an object",
                position + 1
            ))
        })?;

        let kind = parse_kind(obj, position, &mut warnings)?;
        // 1-based position stands in for a missing or non-positive id
        let step_id = obj
            .get("step_id")
            .and_then(Value::as_u64)
            .filter(|id| *id > 0)
            .unwrap_or(position as u64 + 1);

        let mut step = Step::new(step_id, kind)
            .with_label(string_field(obj, "label"))
            .with_short(string_field(obj, "short"))
            .with_text(text_field(obj));

        // Pre-tagged logs keep their tags; the tagger merges rather than
        // overwrites.
        if let Some(tags) = obj.get("tags") {
            parse_input_tags(tags, step_id, &mut step, &mut warnings);
        }

        steps.push(step);
    }

    check_duplicate_ids(&steps, &mut warnings);
    check_final_answer(&steps, &mut warnings);

    for warning in &warnings {
        warn!(%warning, "run log data-quality issue");
    }
    debug!(steps = steps.len(), warnings = warnings.len(), "parsed run log");

    Ok((steps, warnings))
}

/// Locate the sequence of step records inside the raw payload.
fn step_records(raw: &Value) -> CoreResult<&Vec<Value>> {
    if let Some(records) = raw.as_array() {
        return Ok(records);
    }
    if let Some(records) = raw.get("steps").and_then(Value::as_array) {
        return Ok(records);
    }
    Err(CoreError::malformed_log(
        "expected a sequence of step records (array, or object with a 'steps' array)",
    ))
}

/// Extract the step kind, coercing unknown identifiers to `thought`.
///
/// A kind that is not a JSON string at all is fatal; everything else recovers.
fn parse_kind(
    obj: &serde_json::Map<String, Value>,
    position: usize,
    warnings: &mut Vec<String>,
) -> CoreResult<StepKind> {
    // The original log writer calls this field "type"
    let value = obj
        .get("kind")
        .or_else(|| obj.get("type"))
        .unwrap_or(&Value::Null);

    match value {
        Value::Null => Ok(StepKind::Thought),
        Value::String(s) => match StepKind::parse(s) {
            Some(kind) => Ok(kind),
            None => {
                warnings.push(format!(
                    "step at position {}: unrecognized kind '{}', treated as thought",
                    position + 1,
                    s
                ));
                Ok(StepKind::Thought)
            }
        },
        other => Err(CoreError::malformed_log(format!(
            "step at position {}: kind cannot be coerced to a string (got {})",
            position + 1,
            json_type_name(other)
        ))),
    }
}

/// Extract an optional string field, defaulting to empty.
fn string_field(obj: &serde_json::Map<String, Value>, key: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// The body text lives in `text`, or `content` in the original log schema.
fn text_field(obj: &serde_json::Map<String, Value>) -> String {
    let text = string_field(obj, "text");
    if text.is_empty() {
        string_field(obj, "content")
    } else {
        text
    }
}

/// Merge input-supplied tags into the step, warning on anything odd.
fn parse_input_tags(tags: &Value, step_id: u64, step: &mut Step, warnings: &mut Vec<String>) {
    let Some(entries) = tags.as_array() else {
        warnings.push(format!("step {step_id}: 'tags' is not an array, ignored"));
        return;
    };

    for entry in entries {
        match entry.as_str() {
            Some(tag) if !tag.is_empty() => {
                if crate::models::Severity::for_tag(tag) == crate::models::Severity::Low
                    && tag != crate::models::tags::APOLOGY
                {
                    warnings.push(format!(
                        "step {step_id}: unknown tag '{tag}' preserved with low severity"
                    ));
                }
                step.tags.insert(tag.to_string());
            }
            _ => warnings.push(format!("step {step_id}: non-string tag entry skipped")),
        }
    }
}

/// Duplicate ids are allowed in the model but flagged for observability.
fn check_duplicate_ids(steps: &[Step], warnings: &mut Vec<String>) {
    let mut seen = HashSet::new();
    for step in steps {
        if !seen.insert(step.step_id) {
            warnings.push(format!("duplicate step_id {} in run log", step.step_id));
        }
    }
}

/// Exactly one final answer is expected per run.
fn check_final_answer(steps: &[Step], warnings: &mut Vec<String>) {
    let count = steps
        .iter()
        .filter(|s| s.kind == StepKind::FinalAnswer)
        .count();
    match count {
        0 => warnings.push("run log has no final_answer step".to_string()),
        1 => {}
        n => warnings.push(format!("run log has {n} final_answer steps, expected 1")),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_array_of_steps() {
        let raw = json!([
            {"step_id": 1, "kind": "thought", "text": "let me look this up"},
            {"step_id": 2, "kind": "tool_call", "label": "web_search", "text": "query: x"},
            {"step_id": 3, "kind": "tool_result", "text": "found it"},
            {"step_id": 4, "kind": "final_answer", "text": "here you go"}
        ]);
        let (steps, warnings) = parse(&raw).unwrap();
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[1].kind, StepKind::ToolCall);
        assert_eq!(steps[1].label, "web_search");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_parse_steps_envelope() {
        let raw = json!({
            "run_id": "r-1",
            "steps": [
                {"type": "thought", "content": "thinking"},
                {"type": "final_answer", "content": "done"}
            ]
        });
        let (steps, warnings) = parse(&raw).unwrap();
        assert_eq!(steps.len(), 2);
        // ids synthesized from 1-based position
        assert_eq!(steps[0].step_id, 1);
        assert_eq!(steps[1].step_id, 2);
        // "content" maps onto the text field
        assert_eq!(steps[0].text, "thinking");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_parse_rejects_non_sequence() {
        let raw = json!("not a log at all");
        let err = parse(&raw).unwrap_err();
        assert!(err.is_malformed_log());
    }

    #[test]
    fn test_parse_rejects_non_object_record() {
        let raw = json!([{"kind": "thought"}, 42]);
        let err = parse(&raw).unwrap_err();
        assert!(err.is_malformed_log());
    }

    #[test]
    fn test_parse_rejects_non_string_kind() {
        let raw = json!([{"kind": {"nested": true}}]);
        let err = parse(&raw).unwrap_err();
        assert!(err.is_malformed_log());
    }

    #[test]
    fn test_unknown_kind_coerces_to_thought() {
        let raw = json!([
            {"kind": "observation", "text": "hm"},
            {"kind": "final_answer", "text": "done"}
        ]);
        let (steps, warnings) = parse(&raw).unwrap();
        assert_eq!(steps[0].kind, StepKind::Thought);
        assert!(warnings.iter().any(|w| w.contains("observation")));
    }

    #[test]
    fn test_missing_kind_defaults_to_thought() {
        let raw = json!([{"text": "no kind here"}, {"kind": "final_answer"}]);
        let (steps, warnings) = parse(&raw).unwrap();
        assert_eq!(steps[0].kind, StepKind::Thought);
        // a plain fallback, not a data-quality warning
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_duplicate_step_ids_warn() {
        let raw = json!([
            {"step_id": 7, "kind": "thought"},
            {"step_id": 7, "kind": "final_answer"}
        ]);
        let (steps, warnings) = parse(&raw).unwrap();
        assert_eq!(steps.len(), 2);
        assert!(warnings.iter().any(|w| w.contains("duplicate step_id 7")));
    }

    #[test]
    fn test_missing_final_answer_warns() {
        let raw = json!([{"kind": "thought", "text": "just thinking"}]);
        let (steps, warnings) = parse(&raw).unwrap();
        assert_eq!(steps.len(), 1);
        assert!(warnings.iter().any(|w| w.contains("no final_answer")));
    }

    #[test]
    fn test_multiple_final_answers_warn() {
        let raw = json!([
            {"kind": "final_answer", "text": "first attempt"},
            {"kind": "thought", "text": "wait, revising"},
            {"kind": "final_answer", "text": "second attempt"}
        ]);
        let (steps, warnings) = parse(&raw).unwrap();
        assert_eq!(steps.len(), 3);
        assert!(warnings
            .iter()
            .any(|w| w.contains("2 final_answer steps, expected 1")));
    }

    #[test]
    fn test_input_tags_preserved() {
        let raw = json!([
            {"kind": "final_answer", "tags": ["apology", "novel_tag", 3]}
        ]);
        let (steps, warnings) = parse(&raw).unwrap();
        assert!(steps[0].tags.contains("apology"));
        assert!(steps[0].tags.contains("novel_tag"));
        assert_eq!(steps[0].tags.len(), 2);
        assert!(warnings.iter().any(|w| w.contains("unknown tag 'novel_tag'")));
        assert!(warnings.iter().any(|w| w.contains("non-string tag")));
    }

    #[test]
    fn test_empty_fields_preserved_as_empty() {
        let raw = json!([{"kind": "final_answer"}]);
        let (steps, _) = parse(&raw).unwrap();
        assert_eq!(steps[0].label, "");
        assert_eq!(steps[0].short, "");
        assert_eq!(steps[0].text, "");
    }

    #[test]
    fn test_order_preserved() {
        let raw = json!([
            {"step_id": 3, "kind": "thought"},
            {"step_id": 1, "kind": "thought"},
            {"step_id": 2, "kind": "final_answer"}
        ]);
        let (steps, _) = parse(&raw).unwrap();
        let ids: Vec<u64> = steps.iter().map(|s| s.step_id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn test_empty_array_is_valid() {
        let raw = json!([]);
        let (steps, warnings) = parse(&raw).unwrap();
        assert!(steps.is_empty());
        assert!(warnings.iter().any(|w| w.contains("no final_answer")));
    }
}
