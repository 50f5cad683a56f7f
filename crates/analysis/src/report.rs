//! Report Generator
//!
//! Renders parsed steps, the aggregate summary, and an externally supplied
//! critique into three markdown documents: a step-by-step timeline, an
//! incident report, and a critique pass-through.
//!
//! Output sticks to a small markdown subset (`#`/`##` headings, lists,
//! `>` blockquotes, `**bold**`, `---` rules, `|` table rows) consumed by a
//! minimal downstream viewer, and contains nothing nondeterministic.

use agent_mri_core::Step;

use crate::models::{RiskAssessment, RunSummary, Severity};

/// Emitted instead of an empty timeline document
pub const NO_TIMELINE_MESSAGE: &str = "No timeline is available for this run.";
/// Emitted when no critique was supplied
pub const NO_CRITIQUE_MESSAGE: &str = "_No reviewer feedback is available for this run._";

const NO_SUMMARY_PLACEHOLDER: &str = "_No summary provided._";
const NO_DETAIL_PLACEHOLDER: &str = "_No detail recorded._";

/// Render the step-by-step timeline narrative.
pub fn render_timeline(steps: &[Step]) -> String {
    if steps.is_empty() {
        return NO_TIMELINE_MESSAGE.to_string();
    }

    let sections: Vec<String> = steps.iter().map(render_timeline_step).collect();
    sections.join("\n---\n\n")
}

/// One timeline section: heading, summary line, blockquoted body, tag bullet.
fn render_timeline_step(step: &Step) -> String {
    let mut lines = Vec::new();

    let mut heading = format!("## Step {} — {}", step.step_id, step.kind.display_name());
    if !step.label.is_empty() {
        heading.push_str(&format!(" ({})", step.label));
    }
    lines.push(heading);
    lines.push(String::new());

    let short = if step.short.is_empty() {
        NO_SUMMARY_PLACEHOLDER
    } else {
        step.short.as_str()
    };
    lines.push(format!("**What this step does:** {short}"));
    lines.push(String::new());

    if step.text.is_empty() {
        lines.push(format!("> {NO_DETAIL_PLACEHOLDER}"));
    } else {
        for line in step.text.lines() {
            if line.trim().is_empty() {
                // bare marker keeps the blockquote contiguous
                lines.push(">".to_string());
            } else {
                lines.push(format!("> {line}"));
            }
        }
    }

    if !step.tags.is_empty() {
        lines.push(String::new());
        let tag_list: Vec<&str> = step.tags.iter().map(String::as_str).collect();
        lines.push(format!("- **Tags:** {}", tag_list.join(", ")));
    }

    lines.push(String::new());
    lines.join("\n")
}

/// Render the incident report: summary table, diagnosis, root cause,
/// flagged steps, and recommendations.
pub fn render_incident(summary: &RunSummary, risk: &RiskAssessment, steps: &[Step]) -> String {
    let mut lines = Vec::new();

    lines.push("# Incident Report".to_string());
    lines.push(String::new());
    lines.push("| Metric | Value |".to_string());
    lines.push("| --- | --- |".to_string());
    lines.push(format!("| Total steps | {} |", summary.total_steps));
    lines.push(format!("| Flagged steps | {} |", summary.flagged_steps));
    lines.push(format!("| Risk score | {} / 100 |", risk.score));
    lines.push(format!("| Risk level | {} |", risk.level));
    lines.push(String::new());

    lines.push("## Diagnosis".to_string());
    lines.push(String::new());
    if summary.has_findings() {
        for (tag, count) in failure_types_by_frequency(summary) {
            lines.push(format!("- **{tag}**: {count} occurrence(s)"));
        }
    } else {
        lines.push("No failure signals were detected in this run.".to_string());
    }
    lines.push(String::new());

    lines.push("## Root Cause".to_string());
    lines.push(String::new());
    match failure_types_by_frequency(summary).first() {
        Some((dominant, _)) => lines.push(root_cause_narrative(dominant).to_string()),
        None => lines.push(
            "Every step completed without triggering a failure heuristic; no root cause to report."
                .to_string(),
        ),
    }
    lines.push(String::new());

    let flagged: Vec<&Step> = steps.iter().filter(|s| s.is_flagged()).collect();
    if !flagged.is_empty() {
        lines.push("## Flagged Steps".to_string());
        lines.push(String::new());
        for step in flagged {
            let tag_list: Vec<&str> = step.tags.iter().map(String::as_str).collect();
            lines.push(format!(
                "- **Step {}** ({}): {}",
                step.step_id,
                step.kind.display_name(),
                tag_list.join(", ")
            ));
        }
        lines.push(String::new());
    }

    lines.push("## Recommendations".to_string());
    lines.push(String::new());
    let high_tags: Vec<&String> = summary
        .by_failure_type
        .keys()
        .filter(|tag| Severity::for_tag(tag) == Severity::High)
        .collect();
    if high_tags.is_empty() {
        lines.push("- No high-severity failure modes to address.".to_string());
    } else {
        for (i, tag) in high_tags.iter().enumerate() {
            lines.push(format!("{}. {}", i + 1, recommendation_for(tag)));
        }
    }
    lines.push(String::new());

    lines.join("\n")
}

/// Pass the externally supplied critique through verbatim.
pub fn render_critique(critique: Option<&str>) -> String {
    match critique {
        Some(text) if !text.trim().is_empty() => text.to_string(),
        _ => NO_CRITIQUE_MESSAGE.to_string(),
    }
}

/// Failure types sorted most frequent first (count desc, name asc).
fn failure_types_by_frequency(summary: &RunSummary) -> Vec<(&str, usize)> {
    let mut entries: Vec<(&str, usize)> = summary
        .by_failure_type
        .iter()
        .map(|(tag, count)| (tag.as_str(), *count))
        .collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    entries
}

/// Fixed narrative template for the dominant failure type.
fn root_cause_narrative(tag: &str) -> &'static str {
    use crate::models::tags;
    match tag {
        tags::TOOL_ERROR => {
            "The run is dominated by failing tool invocations; later reasoning was built on outputs that were never actually produced."
        }
        tags::TOOL_MISUSE => {
            "The agent reached for tools unrelated to the task or invoked them without usable arguments, wasting steps and polluting its context."
        }
        tags::HALLUCINATION_RISK => {
            "The agent asserted specific facts without gathering tool evidence first, so its claims cannot be traced to any source in the run."
        }
        tags::OVERCONFIDENT_NO_CITATION => {
            "The final answer projects strong certainty that nothing in the run supports; no tool output or citation backs the language used."
        }
        tags::WEAK_GROUNDING => {
            "The final answer mixes grounded and ungrounded claims; only part of it traces back to tool output collected during the run."
        }
        tags::SPECULATIVE_METRICS => {
            "The run quotes quantitative figures that appear in no tool output, so the numbers are speculation rather than measurement."
        }
        tags::MEMORY_DRIFT => {
            "The agent's working memory lost or contradicted earlier context, and later steps drifted away from the original task."
        }
        tags::APOLOGY => {
            "The dominant signal is apologetic language, which usually means the agent noticed and acknowledged its own missteps."
        }
        _ => "The dominant failure signal was supplied by an upstream tagger and has no built-in narrative; review the flagged steps directly.",
    }
}

/// Fixed mitigation sentence per high-severity tag.
fn recommendation_for(tag: &str) -> &'static str {
    use crate::models::tags;
    match tag {
        tags::TOOL_ERROR => {
            "Add retry or fallback handling around tool invocations, and make tool failures explicit to the agent instead of letting it reason past them."
        }
        tags::TOOL_MISUSE => {
            "Restrict the tool registry to task-relevant tools and validate arguments before dispatching a call."
        }
        tags::HALLUCINATION_RISK => {
            "Require at least one tool-sourced evidence step before accepting specific factual claims into an answer."
        }
        tags::OVERCONFIDENT_NO_CITATION => {
            "Penalize certainty language in answers that cite no source; demand a citation or tool reference for every strong claim."
        }
        _ => "Review the flagged steps for this failure mode and tighten the relevant rule or prompt.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_mri_core::StepKind;
    use crate::models::tags;
    use crate::scorer::summarize;

    #[test]
    fn test_empty_timeline_message() {
        assert_eq!(render_timeline(&[]), NO_TIMELINE_MESSAGE);
    }

    #[test]
    fn test_timeline_one_heading_per_step() {
        let steps = vec![
            Step::new(1, StepKind::Thought).with_text("thinking"),
            Step::new(2, StepKind::ToolCall)
                .with_label("web_search")
                .with_text("query: x"),
            Step::new(3, StepKind::FinalAnswer).with_text("done"),
        ];
        let md = render_timeline(&steps);
        assert!(md.contains("## Step 1 — Thought"));
        assert!(md.contains("## Step 2 — Tool call (web_search)"));
        assert!(md.contains("## Step 3 — Final answer"));
        assert_eq!(md.matches("## Step").count(), 3);
        // horizontal rules between steps
        assert_eq!(md.matches("\n---\n").count(), 2);
    }

    #[test]
    fn test_timeline_blockquote_preserves_blank_lines() {
        let steps =
            vec![Step::new(1, StepKind::Thought).with_text("first paragraph\n\nsecond paragraph")];
        let md = render_timeline(&steps);
        assert!(md.contains("> first paragraph\n>\n> second paragraph"));
    }

    #[test]
    fn test_timeline_placeholders_for_empty_fields() {
        let steps = vec![Step::new(1, StepKind::Thought)];
        let md = render_timeline(&steps);
        assert!(md.contains(NO_SUMMARY_PLACEHOLDER));
        assert!(md.contains(NO_DETAIL_PLACEHOLDER));
    }

    #[test]
    fn test_timeline_tags_bullet() {
        let steps = vec![Step::new(1, StepKind::ToolResult)
            .with_text("Error: nope")
            .with_tag(tags::TOOL_ERROR)
            .with_tag(tags::APOLOGY)];
        let md = render_timeline(&steps);
        assert!(md.contains("- **Tags:** apology, tool_error"));
    }

    #[test]
    fn test_incident_diagnosis_most_frequent_first() {
        let steps = vec![
            Step::new(1, StepKind::Thought).with_tag(tags::APOLOGY),
            Step::new(2, StepKind::Thought).with_tag(tags::APOLOGY),
            Step::new(3, StepKind::ToolResult).with_tag(tags::TOOL_ERROR),
        ];
        let (summary, risk) = summarize(&steps);
        let md = render_incident(&summary, &risk, &steps);
        let apology_pos = md.find("- **apology**: 2").unwrap();
        let tool_error_pos = md.find("- **tool_error**: 1").unwrap();
        assert!(apology_pos < tool_error_pos);
    }

    #[test]
    fn test_incident_clean_run() {
        let steps = vec![Step::new(1, StepKind::FinalAnswer).with_text("all good")];
        let (summary, risk) = summarize(&steps);
        let md = render_incident(&summary, &risk, &steps);
        assert!(md.contains("No failure signals were detected"));
        assert!(md.contains("- No high-severity failure modes to address."));
        assert!(!md.contains("## Flagged Steps"));
    }

    #[test]
    fn test_incident_recommendations_per_high_tag() {
        let steps = vec![
            Step::new(1, StepKind::ToolResult).with_tag(tags::TOOL_ERROR),
            Step::new(2, StepKind::FinalAnswer)
                .with_tag(tags::OVERCONFIDENT_NO_CITATION)
                .with_tag(tags::WEAK_GROUNDING),
        ];
        let (summary, risk) = summarize(&steps);
        let md = render_incident(&summary, &risk, &steps);
        assert!(md.contains("1. "));
        assert!(md.contains("2. "));
        // weak_grounding is medium severity, gets no recommendation line
        assert!(!md.contains("3. "));
    }

    #[test]
    fn test_incident_summary_table() {
        let steps = vec![Step::new(1, StepKind::FinalAnswer).with_tag(tags::TOOL_ERROR)];
        let (summary, risk) = summarize(&steps);
        let md = render_incident(&summary, &risk, &steps);
        assert!(md.contains("| Total steps | 1 |"));
        assert!(md.contains("| Flagged steps | 1 |"));
        assert!(md.contains("| Risk level | High |"));
    }

    #[test]
    fn test_critique_pass_through_verbatim() {
        let critique = "## Manager Notes\n\nTighten up step 3.";
        assert_eq!(render_critique(Some(critique)), critique);
    }

    #[test]
    fn test_critique_absent_or_blank() {
        assert_eq!(render_critique(None), NO_CRITIQUE_MESSAGE);
        assert_eq!(render_critique(Some("   ")), NO_CRITIQUE_MESSAGE);
    }

    #[test]
    fn test_root_cause_known_and_unknown_tags() {
        assert!(root_cause_narrative(tags::TOOL_ERROR).contains("tool invocations"));
        assert!(root_cause_narrative("mystery_tag").contains("upstream tagger"));
    }
}
