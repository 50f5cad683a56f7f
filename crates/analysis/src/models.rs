//! Risk Analysis Models
//!
//! Data structures for the risk side of the pipeline: the tag registry with
//! its fixed severity mapping, the aggregate run summary, the 0-100 risk
//! assessment, and the root `AnalysisResult` handed back to callers.

use std::collections::BTreeMap;

use agent_mri_core::Step;
use serde::{Deserialize, Serialize};

/// Well-known risk tag identifiers.
///
/// Steps carry tags as plain strings so pre-tagged logs with identifiers we
/// have never seen still round-trip; these constants are the fixed registry
/// the tagger emits from.
pub mod tags {
    /// A tool invocation came back with a failure
    pub const TOOL_ERROR: &str = "tool_error";
    /// A tool was invoked off-domain or without usable arguments
    pub const TOOL_MISUSE: &str = "tool_misuse";
    /// A factual claim with no tool evidence behind it
    pub const HALLUCINATION_RISK: &str = "hallucination_risk";
    /// Confident language in the final answer with nothing to back it
    pub const OVERCONFIDENT_NO_CITATION: &str = "overconfident_no_citation";
    /// Final-answer claims that only partially trace to tool output
    pub const WEAK_GROUNDING: &str = "weak_grounding";
    /// A quantitative figure with no traceable tool source
    pub const SPECULATIVE_METRICS: &str = "speculative_metrics";
    /// Working memory dropped or contradicted earlier content
    pub const MEMORY_DRIFT: &str = "memory_drift";
    /// Apologetic language; informational, not a failure signal
    pub const APOLOGY: &str = "apology";
}

/// Severity class of a risk tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Strong failure signal
    High,
    /// Degraded-quality signal
    Medium,
    /// Informational signal
    Low,
}

impl Severity {
    /// Look up the severity a tag identifier is bound to.
    ///
    /// Unknown identifiers (e.g., preserved from a pre-tagged input log) map
    /// to `Low` so a forward-compatible registry never inflates the score.
    pub fn for_tag(tag: &str) -> Severity {
        match tag {
            tags::TOOL_ERROR
            | tags::TOOL_MISUSE
            | tags::HALLUCINATION_RISK
            | tags::OVERCONFIDENT_NO_CITATION => Severity::High,
            tags::WEAK_GROUNDING | tags::SPECULATIVE_METRICS | tags::MEMORY_DRIFT => {
                Severity::Medium
            }
            _ => Severity::Low,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::High => write!(f, "high"),
            Severity::Medium => write!(f, "medium"),
            Severity::Low => write!(f, "low"),
        }
    }
}

/// Discrete risk band derived from the 0-100 score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Score below 30
    Low,
    /// Score in [30, 70)
    Medium,
    /// Score 70 and above
    High,
}

impl RiskLevel {
    /// Get human-readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Aggregate statistics over one tagged run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Count of all steps in the run
    pub total_steps: usize,
    /// Count of steps carrying at least one tag
    pub flagged_steps: usize,
    /// Occurrence count per tag identifier, flattened across all steps.
    /// BTreeMap keeps rendering deterministic.
    pub by_failure_type: BTreeMap<String, usize>,
}

impl RunSummary {
    /// Whether any failure signal was observed
    pub fn has_findings(&self) -> bool {
        !self.by_failure_type.is_empty()
    }
}

/// Quantitative risk verdict for one run.
///
/// Always recomputed from the tagged step set; never mutated independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Weighted, density-normalized score in [0, 100]
    pub score: u8,
    /// Discrete band the score falls in
    pub level: RiskLevel,
}

/// Root aggregate produced by one `analyze` call.
///
/// Immutable once produced; the presentation layer indexes these fields by
/// name, so the shape is a stable contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Parsed steps in log order, with tags populated
    pub steps: Vec<Step>,
    /// Aggregate statistics
    pub summary: RunSummary,
    /// Quantitative risk verdict
    pub risk: RiskAssessment,
    /// Step-by-step timeline narrative
    pub timeline_markdown: String,
    /// Incident report (diagnosis, root cause, recommendations)
    pub report_markdown: String,
    /// Externally supplied critique, passed through verbatim
    pub critique_markdown: String,
    /// Data-quality warnings collected while parsing
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_for_known_tags() {
        assert_eq!(Severity::for_tag(tags::TOOL_ERROR), Severity::High);
        assert_eq!(Severity::for_tag(tags::TOOL_MISUSE), Severity::High);
        assert_eq!(Severity::for_tag(tags::HALLUCINATION_RISK), Severity::High);
        assert_eq!(
            Severity::for_tag(tags::OVERCONFIDENT_NO_CITATION),
            Severity::High
        );
        assert_eq!(Severity::for_tag(tags::WEAK_GROUNDING), Severity::Medium);
        assert_eq!(
            Severity::for_tag(tags::SPECULATIVE_METRICS),
            Severity::Medium
        );
        assert_eq!(Severity::for_tag(tags::MEMORY_DRIFT), Severity::Medium);
        assert_eq!(Severity::for_tag(tags::APOLOGY), Severity::Low);
    }

    #[test]
    fn test_severity_for_unknown_tag_defaults_low() {
        assert_eq!(Severity::for_tag("totally_new_failure_mode"), Severity::Low);
        assert_eq!(Severity::for_tag(""), Severity::Low);
    }

    #[test]
    fn test_risk_level_display() {
        assert_eq!(RiskLevel::Low.to_string(), "Low");
        assert_eq!(RiskLevel::Medium.to_string(), "Medium");
        assert_eq!(RiskLevel::High.to_string(), "High");
    }

    #[test]
    fn test_run_summary_has_findings() {
        let mut summary = RunSummary {
            total_steps: 3,
            flagged_steps: 0,
            by_failure_type: BTreeMap::new(),
        };
        assert!(!summary.has_findings());
        summary.by_failure_type.insert(tags::APOLOGY.to_string(), 1);
        assert!(summary.has_findings());
    }

    #[test]
    fn test_analysis_result_serialization_shape() {
        let result = AnalysisResult {
            steps: Vec::new(),
            summary: RunSummary {
                total_steps: 0,
                flagged_steps: 0,
                by_failure_type: BTreeMap::new(),
            },
            risk: RiskAssessment {
                score: 0,
                level: RiskLevel::Low,
            },
            timeline_markdown: String::new(),
            report_markdown: String::new(),
            critique_markdown: String::new(),
            warnings: Vec::new(),
        };
        let json = serde_json::to_value(&result).unwrap();
        // Field names are a stable contract with the renderer
        for field in [
            "steps",
            "summary",
            "risk",
            "timeline_markdown",
            "report_markdown",
            "critique_markdown",
            "warnings",
        ] {
            assert!(json.get(field).is_some(), "missing field {field}");
        }
    }
}
