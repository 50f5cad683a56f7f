//! Run Step Model
//!
//! Data structures for one atomic event in an agent run: the step kind
//! taxonomy and the normalized `Step` record the analysis pipeline operates on.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Kind of atomic event within an agent run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Internal reasoning emitted by the agent
    Thought,
    /// The agent invoking a tool
    ToolCall,
    /// Output returned by a tool
    ToolResult,
    /// The agent writing to its working memory
    MemoryUpdate,
    /// The answer the agent hands back to the user
    FinalAnswer,
}

impl StepKind {
    /// Parse a kind from its wire identifier. Unknown identifiers return None;
    /// the parser coerces those to `Thought` with a data-quality warning.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "thought" => Some(StepKind::Thought),
            "tool_call" => Some(StepKind::ToolCall),
            "tool_result" => Some(StepKind::ToolResult),
            "memory_update" => Some(StepKind::MemoryUpdate),
            "final_answer" => Some(StepKind::FinalAnswer),
            _ => None,
        }
    }

    /// Get human-readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            StepKind::Thought => "Thought",
            StepKind::ToolCall => "Tool call",
            StepKind::ToolResult => "Tool result",
            StepKind::MemoryUpdate => "Memory update",
            StepKind::FinalAnswer => "Final answer",
        }
    }

    /// Wire identifier for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Thought => "thought",
            StepKind::ToolCall => "tool_call",
            StepKind::ToolResult => "tool_result",
            StepKind::MemoryUpdate => "memory_update",
            StepKind::FinalAnswer => "final_answer",
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One atomic event in an agent run.
///
/// `label`, `short`, and `text` use the empty string to encode "absent":
/// the parser preserves emptiness so downstream rules can distinguish a
/// missing field from one with content. Display placeholders are the report
/// generator's job, not the model's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Position of this step within the run (1-based, synthesized if absent)
    pub step_id: u64,
    /// Event kind
    pub kind: StepKind,
    /// Optional short caption (e.g., tool name)
    #[serde(default)]
    pub label: String,
    /// Optional one-line summary
    #[serde(default)]
    pub short: String,
    /// Optional full detail/body
    #[serde(default)]
    pub text: String,
    /// Risk tags attached to this step. Set semantics: unordered,
    /// duplicates collapsed, serialized in sorted order for determinism.
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl Step {
    /// Create a new step with empty display fields and no tags
    pub fn new(step_id: u64, kind: StepKind) -> Self {
        Self {
            step_id,
            kind,
            label: String::new(),
            short: String::new(),
            text: String::new(),
            tags: BTreeSet::new(),
        }
    }

    /// Set the label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the one-line summary
    pub fn with_short(mut self, short: impl Into<String>) -> Self {
        self.short = short.into();
        self
    }

    /// Set the full body text
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Attach a risk tag (no-op if already present)
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Whether at least one risk tag is attached
    pub fn is_flagged(&self) -> bool {
        !self.tags.is_empty()
    }
}
