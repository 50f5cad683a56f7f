//! Risk Tagger
//!
//! Rule-based classifier that inspects each parsed step (plus bounded
//! cross-step context) and attaches risk tags. Rules are independent
//! predicate functions registered in a fixed ordered list; a rule that
//! panics on unexpected input is isolated and contributes no tag for that
//! step rather than aborting the whole pass.
//!
//! The keyword lists driving the rules are heuristic and live in
//! `TaggerConfig` so they can be tuned without touching rule bodies.

use std::collections::BTreeSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::OnceLock;

use agent_mri_core::{Step, StepKind};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::tags;

/// Tunable keyword lists for the rule set.
///
/// Defaults are a minimum viable vocabulary; tightening or loosening them
/// changes scored outcomes materially, so they are data rather than code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaggerConfig {
    /// Substrings of tool output that indicate the tool failed
    pub failure_indicators: Vec<String>,
    /// Strong-certainty phrases in answers
    pub confidence_phrases: Vec<String>,
    /// Hedging phrases that signal speculation
    pub hedge_phrases: Vec<String>,
    /// Apologetic phrases
    pub apology_phrases: Vec<String>,
    /// Vocabulary that is off-domain for serious tasks unless the task
    /// itself mentions it
    pub off_domain_keywords: Vec<String>,
}

impl Default for TaggerConfig {
    fn default() -> Self {
        fn list(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }
        Self {
            failure_indicators: list(&[
                "error",
                "failed",
                "failure",
                "exception",
                "traceback",
                "timed out",
                "timeout",
                "permission denied",
                "not found",
            ]),
            confidence_phrases: list(&[
                "clearly",
                "definitely",
                "certainly",
                "it is certain",
                "without question",
                "without a doubt",
                "no doubt",
                "guaranteed",
                "undeniable",
                "we are certain",
                "this proves",
            ]),
            hedge_phrases: list(&[
                "i think",
                "i believe",
                "probably",
                "presumably",
                "it seems",
                "my guess",
            ]),
            apology_phrases: list(&["i'm sorry", "i am sorry", "my mistake", "i apologize", "sorry"]),
            off_domain_keywords: list(&[
                "casserole",
                "recipe",
                "smoothie",
                "blender",
                "spatula",
                "rom-com",
                "romantic comedies",
                "basil",
                "gardening",
                "hot sauce",
                "scoville",
                "ghost pepper",
                "water cooler",
                "hot dog",
                "fermentation",
            ]),
        }
    }
}

// ============================================================================
// Compiled patterns
// ============================================================================

/// Percentages and figures with a magnitude word ("42%", "3.5 million").
fn quant_figure_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b\d+(?:\.\d+)?\s*(?:%|percent|million|billion|thousand)")
            .expect("quant figure pattern is valid")
    })
}

/// Rough signals that text is citing a source.
fn citation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)according to|as reported by|source:|doi\.org|arxiv\.org|https?://|\[\d+\]|\(\d{4}\)",
        )
        .expect("citation pattern is valid")
    })
}

/// Multi-word capitalized sequences, a cheap stand-in for named entities.
fn named_entity_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)+\b").expect("named entity pattern is valid")
    })
}

// ============================================================================
// Rule context
// ============================================================================

/// Whole-run statistics computed once per tagging pass.
struct RunStats {
    tool_result_count: usize,
    /// Lowercased concatenation of every tool_result body, the evidence
    /// corpus claims are traced against
    tool_result_corpus: String,
}

impl RunStats {
    fn collect(steps: &[Step]) -> Self {
        let tool_results: Vec<&Step> = steps
            .iter()
            .filter(|s| s.kind == StepKind::ToolResult)
            .collect();
        let corpus = tool_results
            .iter()
            .map(|s| s.text.to_lowercase())
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            tool_result_count: tool_results.len(),
            tool_result_corpus: corpus,
        }
    }
}

/// Everything a rule may look at: the step under inspection, the full run for
/// bounded look-back, and precomputed run stats.
struct RuleContext<'a> {
    config: &'a TaggerConfig,
    steps: &'a [Step],
    stats: &'a RunStats,
    index: usize,
}

impl RuleContext<'_> {
    fn step(&self) -> &Step {
        &self.steps[self.index]
    }

    /// Steps strictly before the one under inspection
    fn earlier(&self) -> &[Step] {
        &self.steps[..self.index]
    }

    fn has_earlier(&self, kind: StepKind) -> bool {
        self.earlier().iter().any(|s| s.kind == kind)
    }

    fn last_memory_update_before(&self) -> Option<&Step> {
        self.earlier()
            .iter()
            .rev()
            .find(|s| s.kind == StepKind::MemoryUpdate)
    }

    /// The run's first step anchors the task domain
    fn first_step_text_lower(&self) -> String {
        self.steps
            .first()
            .map(|s| format!("{} {}", s.label, s.text).to_lowercase())
            .unwrap_or_default()
    }
}

// ============================================================================
// Rules
// ============================================================================

type RuleFn = fn(&RuleContext) -> Vec<&'static str>;

struct RiskRule {
    name: &'static str,
    apply: RuleFn,
}

fn default_rules() -> Vec<RiskRule> {
    vec![
        RiskRule {
            name: "tool_error",
            apply: rule_tool_error,
        },
        RiskRule {
            name: "tool_misuse",
            apply: rule_tool_misuse,
        },
        RiskRule {
            name: "hallucination_risk",
            apply: rule_hallucination_risk,
        },
        RiskRule {
            name: "overconfident_no_citation",
            apply: rule_overconfident_no_citation,
        },
        RiskRule {
            name: "weak_grounding",
            apply: rule_weak_grounding,
        },
        RiskRule {
            name: "speculative_metrics",
            apply: rule_speculative_metrics,
        },
        RiskRule {
            name: "memory_drift",
            apply: rule_memory_drift,
        },
        RiskRule {
            name: "apology",
            apply: rule_apology,
        },
    ]
}

/// A tool_result whose text indicates failure, following a tool_call.
fn rule_tool_error(ctx: &RuleContext) -> Vec<&'static str> {
    let step = ctx.step();
    if step.kind != StepKind::ToolResult {
        return Vec::new();
    }
    let text = step.text.to_lowercase();
    if contains_any(&text, &ctx.config.failure_indicators) && ctx.has_earlier(StepKind::ToolCall) {
        vec![tags::TOOL_ERROR]
    } else {
        Vec::new()
    }
}

/// A tool_call with no usable arguments, or whose label is off-domain for
/// the task the run's first step anchors.
fn rule_tool_misuse(ctx: &RuleContext) -> Vec<&'static str> {
    let step = ctx.step();
    if step.kind != StepKind::ToolCall {
        return Vec::new();
    }
    if step.text.trim().is_empty() {
        return vec![tags::TOOL_MISUSE];
    }
    let label = step.label.to_lowercase();
    if label.is_empty() {
        return Vec::new();
    }
    let anchor = ctx.first_step_text_lower();
    let off_domain = ctx
        .config
        .off_domain_keywords
        .iter()
        .any(|kw| label.contains(kw.as_str()) && !anchor.contains(kw.as_str()));
    if off_domain {
        vec![tags::TOOL_MISUSE]
    } else {
        Vec::new()
    }
}

/// A specific factual claim (figure, citation shape, named entity) with no
/// tool evidence earlier in the run.
fn rule_hallucination_risk(ctx: &RuleContext) -> Vec<&'static str> {
    let step = ctx.step();
    if !matches!(step.kind, StepKind::Thought | StepKind::FinalAnswer) {
        return Vec::new();
    }
    if has_specific_claim(&step.text) && !ctx.has_earlier(StepKind::ToolResult) {
        vec![tags::HALLUCINATION_RISK]
    } else {
        Vec::new()
    }
}

/// Strong certainty language in the final answer, with zero tool evidence in
/// the whole run and nothing citation-shaped.
fn rule_overconfident_no_citation(ctx: &RuleContext) -> Vec<&'static str> {
    let step = ctx.step();
    if step.kind != StepKind::FinalAnswer {
        return Vec::new();
    }
    let lower = step.text.to_lowercase();
    if contains_any(&lower, &ctx.config.confidence_phrases)
        && ctx.stats.tool_result_count == 0
        && !citation_pattern().is_match(&step.text)
    {
        vec![tags::OVERCONFIDENT_NO_CITATION]
    } else {
        Vec::new()
    }
}

/// A final answer whose claims only partially trace back to tool output, or
/// which hedges despite tool evidence being available.
fn rule_weak_grounding(ctx: &RuleContext) -> Vec<&'static str> {
    let step = ctx.step();
    if step.kind != StepKind::FinalAnswer || ctx.stats.tool_result_count == 0 {
        return Vec::new();
    }
    let lower = step.text.to_lowercase();
    if contains_any(&lower, &ctx.config.hedge_phrases) {
        return vec![tags::WEAK_GROUNDING];
    }
    let claims = claim_snippets(&step.text);
    if claims.is_empty() {
        return Vec::new();
    }
    let traced = claims
        .iter()
        .filter(|c| ctx.stats.tool_result_corpus.contains(c.as_str()))
        .count();
    if traced > 0 && traced < claims.len() {
        vec![tags::WEAK_GROUNDING]
    } else {
        Vec::new()
    }
}

/// Any non-tool_result step quoting a figure that appears in no tool output.
fn rule_speculative_metrics(ctx: &RuleContext) -> Vec<&'static str> {
    let step = ctx.step();
    if step.kind == StepKind::ToolResult {
        return Vec::new();
    }
    let untraced = quant_figure_pattern()
        .find_iter(&step.text)
        .map(|m| m.as_str().to_lowercase())
        .any(|figure| !ctx.stats.tool_result_corpus.contains(figure.as_str()));
    if untraced {
        vec![tags::SPECULATIVE_METRICS]
    } else {
        Vec::new()
    }
}

/// Memory updates that drop most of the previous memory vocabulary, or later
/// reasoning that abandons the remembered context for off-domain territory.
fn rule_memory_drift(ctx: &RuleContext) -> Vec<&'static str> {
    let step = ctx.step();
    match step.kind {
        StepKind::MemoryUpdate => {
            let Some(prev) = ctx.last_memory_update_before() else {
                return Vec::new();
            };
            let prev_tokens = significant_tokens(&prev.text);
            if prev_tokens.is_empty() {
                return Vec::new();
            }
            let cur_tokens = significant_tokens(&step.text);
            let kept = prev_tokens.intersection(&cur_tokens).count();
            // more than half of the remembered vocabulary vanished
            if kept * 2 < prev_tokens.len() {
                vec![tags::MEMORY_DRIFT]
            } else {
                Vec::new()
            }
        }
        StepKind::Thought | StepKind::FinalAnswer => {
            let Some(memory) = ctx.last_memory_update_before() else {
                return Vec::new();
            };
            let memory_tokens = significant_tokens(&memory.text);
            let cur_tokens = significant_tokens(&step.text);
            if memory_tokens.is_empty() || cur_tokens.is_empty() {
                return Vec::new();
            }
            let lower = step.text.to_lowercase();
            if memory_tokens.intersection(&cur_tokens).count() == 0
                && contains_any(&lower, &ctx.config.off_domain_keywords)
            {
                vec![tags::MEMORY_DRIFT]
            } else {
                Vec::new()
            }
        }
        _ => Vec::new(),
    }
}

/// Apologetic language anywhere; informational, kept for transparency.
fn rule_apology(ctx: &RuleContext) -> Vec<&'static str> {
    let lower = ctx.step().text.to_lowercase();
    if contains_any(&lower, &ctx.config.apology_phrases) {
        vec![tags::APOLOGY]
    } else {
        Vec::new()
    }
}

// ============================================================================
// Text helpers
// ============================================================================

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles.iter().any(|n| haystack.contains(n.as_str()))
}

/// Whether text asserts something specific enough to need evidence.
fn has_specific_claim(text: &str) -> bool {
    quant_figure_pattern().is_match(text)
        || citation_pattern().is_match(text)
        || named_entity_pattern().is_match(text)
}

/// Lowercased snippets of the specific claims in a text, for tracing against
/// the tool-result corpus.
fn claim_snippets(text: &str) -> Vec<String> {
    let mut snippets = BTreeSet::new();
    for m in quant_figure_pattern().find_iter(text) {
        snippets.insert(m.as_str().to_lowercase());
    }
    for m in named_entity_pattern().find_iter(text) {
        snippets.insert(m.as_str().to_lowercase());
    }
    snippets.into_iter().collect()
}

/// Lowercased alphabetic words of length >= 4, the vocabulary used by the
/// drift heuristics.
fn significant_tokens(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_ascii_alphabetic())
        .filter(|w| w.len() >= 4)
        .map(|w| w.to_lowercase())
        .collect()
}

// ============================================================================
// Tagger
// ============================================================================

/// Rule engine that attaches risk tags to parsed steps.
pub struct RiskTagger {
    config: TaggerConfig,
    rules: Vec<RiskRule>,
}

impl RiskTagger {
    /// Create a tagger with the default rule set and keyword lists.
    pub fn new() -> Self {
        Self::with_config(TaggerConfig::default())
    }

    /// Create a tagger with custom keyword lists.
    pub fn with_config(config: TaggerConfig) -> Self {
        Self {
            config,
            rules: default_rules(),
        }
    }

    /// Run every rule over every step and return a new tagged sequence.
    ///
    /// Input is never mutated. Computed tags merge into tags already present
    /// on a step (pre-tagged logs), and the tag set collapses duplicates. A
    /// panicking rule is logged and skipped for that step only.
    pub fn tag(&self, steps: &[Step]) -> Vec<Step> {
        let stats = RunStats::collect(steps);

        steps
            .iter()
            .enumerate()
            .map(|(index, step)| {
                let mut tagged = step.clone();
                for rule in &self.rules {
                    let ctx = RuleContext {
                        config: &self.config,
                        steps,
                        stats: &stats,
                        index,
                    };
                    match catch_unwind(AssertUnwindSafe(|| (rule.apply)(&ctx))) {
                        Ok(new_tags) => {
                            for tag in new_tags {
                                tagged.tags.insert(tag.to_string());
                            }
                        }
                        Err(_) => {
                            warn!(
                                rule = rule.name,
                                step_id = step.step_id,
                                "risk rule panicked; no tag contributed for this step"
                            );
                        }
                    }
                }
                tagged
            })
            .collect()
    }
}

impl Default for RiskTagger {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
