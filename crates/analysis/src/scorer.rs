//! Risk Scorer
//!
//! Folds tagged steps into a `RunSummary` and a deterministic 0-100
//! `RiskAssessment`. The score weighs tag occurrences by severity and
//! normalizes by run length: per-step density of severe tags matters more
//! than absolute count, so a long, mostly-clean run is not penalized for
//! length alone.

use std::collections::BTreeMap;

use agent_mri_core::Step;

use crate::models::{RiskAssessment, RiskLevel, RunSummary, Severity};

/// Weight of one high-severity tag occurrence
pub const HIGH_WEIGHT: u32 = 15;
/// Weight of one medium-severity tag occurrence
pub const MEDIUM_WEIGHT: u32 = 7;
/// Weight of one low-severity tag occurrence
pub const LOW_WEIGHT: u32 = 2;

/// Multiplier applied to the per-step weighted density
pub const DENSITY_SCALE: f64 = 12.0;

/// Scores below this are `Low`
pub const LOW_CEILING: u8 = 30;
/// Scores below this (and at or above `LOW_CEILING`) are `Medium`
pub const MEDIUM_CEILING: u8 = 70;

/// Weight contributed by one occurrence of a tag of the given severity.
pub fn severity_weight(severity: Severity) -> u32 {
    match severity {
        Severity::High => HIGH_WEIGHT,
        Severity::Medium => MEDIUM_WEIGHT,
        Severity::Low => LOW_WEIGHT,
    }
}

/// Band a score into its discrete risk level.
pub fn level_for(score: u8) -> RiskLevel {
    if score < LOW_CEILING {
        RiskLevel::Low
    } else if score < MEDIUM_CEILING {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

/// Aggregate tagged steps into summary statistics and a risk assessment.
pub fn summarize(steps: &[Step]) -> (RunSummary, RiskAssessment) {
    let total_steps = steps.len();
    let flagged_steps = steps.iter().filter(|s| s.is_flagged()).count();

    let mut by_failure_type: BTreeMap<String, usize> = BTreeMap::new();
    for step in steps {
        for tag in &step.tags {
            *by_failure_type.entry(tag.clone()).or_insert(0) += 1;
        }
    }

    let score = compute_score(steps);
    let summary = RunSummary {
        total_steps,
        flagged_steps,
        by_failure_type,
    };
    let risk = RiskAssessment {
        score,
        level: level_for(score),
    };
    (summary, risk)
}

/// Weighted, density-normalized score clamped to [0, 100].
fn compute_score(steps: &[Step]) -> u8 {
    if steps.is_empty() {
        return 0;
    }
    let weighted_sum: u32 = steps
        .iter()
        .flat_map(|s| s.tags.iter())
        .map(|tag| severity_weight(Severity::for_tag(tag)))
        .sum();
    let density = weighted_sum as f64 / steps.len() as f64;
    (density * DENSITY_SCALE).clamp(0.0, 100.0).round() as u8
}
