//! Agent MRI Analysis
//!
//! The trace analysis pipeline: parse a raw agent run log into a validated
//! step sequence, attach rule-based risk tags, fold the tags into a 0-100
//! risk assessment, and render markdown reports. `analyze` is the single
//! entry point the transport layer calls.
//!
//! - `models` - Risk data types (`Severity`, `RiskLevel`, `RunSummary`, `RiskAssessment`, `AnalysisResult`)
//! - `parser` - Permissive run-log parser
//! - `tagger` - Rule-based risk tagger (`RiskTagger`, `TaggerConfig`)
//! - `scorer` - Aggregation and the weighted density score
//! - `report` - Markdown rendering (timeline, incident report, critique)
//!
//! The pipeline is a pure, synchronous computation: no I/O, no shared state
//! across calls, and a deterministic result for a given input.

pub mod models;
pub mod parser;
pub mod report;
pub mod scorer;
pub mod tagger;

use agent_mri_core::CoreResult;
use serde_json::Value;

// Re-export model types
pub use models::{tags, AnalysisResult, RiskAssessment, RiskLevel, RunSummary, Severity};

// Re-export pipeline pieces
pub use parser::parse;
pub use report::{NO_CRITIQUE_MESSAGE, NO_TIMELINE_MESSAGE};
pub use scorer::{
    summarize, DENSITY_SCALE, HIGH_WEIGHT, LOW_CEILING, LOW_WEIGHT, MEDIUM_CEILING, MEDIUM_WEIGHT,
};
pub use tagger::{RiskTagger, TaggerConfig};

/// Analyze one raw run log end to end.
///
/// Sequences parser → tagger → aggregator → report generator and packages
/// everything into a fresh `AnalysisResult`. Fails only with
/// `CoreError::MalformedLog` when the input is not a sequence of step
/// records; every other anomaly is a warning on the result.
pub fn analyze(raw: &Value, critique: Option<&str>) -> CoreResult<AnalysisResult> {
    let (steps, warnings) = parser::parse(raw)?;
    let tagged = RiskTagger::new().tag(&steps);
    let (summary, risk) = scorer::summarize(&tagged);

    let timeline_markdown = report::render_timeline(&tagged);
    let report_markdown = report::render_incident(&summary, &risk, &tagged);
    let critique_markdown = report::render_critique(critique);

    Ok(AnalysisResult {
        steps: tagged,
        summary,
        risk,
        timeline_markdown,
        report_markdown,
        critique_markdown,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_analyze_end_to_end() {
        let raw = json!([
            {"step_id": 1, "kind": "thought", "text": "let me check the docs"},
            {"step_id": 2, "kind": "tool_call", "label": "doc_search", "text": "query: setup"},
            {"step_id": 3, "kind": "tool_result", "text": "setup takes three commands"},
            {"step_id": 4, "kind": "final_answer", "text": "setup takes three commands"}
        ]);
        let result = analyze(&raw, Some("Looks solid.")).unwrap();
        assert_eq!(result.summary.total_steps, 4);
        assert_eq!(result.risk.score, 0);
        assert_eq!(result.risk.level, RiskLevel::Low);
        assert_eq!(result.critique_markdown, "Looks solid.");
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_analyze_malformed_input() {
        let raw = json!(42);
        let err = analyze(&raw, None).unwrap_err();
        assert!(err.is_malformed_log());
    }

    #[test]
    fn test_analyze_missing_critique() {
        let raw = json!([{"kind": "final_answer", "text": "done"}]);
        let result = analyze(&raw, None).unwrap();
        assert_eq!(result.critique_markdown, NO_CRITIQUE_MESSAGE);
    }
}
