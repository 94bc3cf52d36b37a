//! Handoff wire shape.
//!
//! The structured payload a worker embeds in its output on completion. Wire
//! field names are camelCase; unknown extra fields are accepted and ignored
//! for forward compatibility.

use serde::{Deserialize, Serialize};

use crate::item::ItemStatus;

/// Terminal outcome a worker reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HandoffOutcome {
    Completed,
    Blocked,
    NeedsReview,
    Failed,
}

impl HandoffOutcome {
    /// The work-item status this outcome maps to.
    pub fn item_status(&self) -> ItemStatus {
        match self {
            Self::Completed => ItemStatus::Done,
            Self::Blocked => ItemStatus::Blocked,
            Self::NeedsReview => ItemStatus::NeedsReview,
            Self::Failed => ItemStatus::Failed,
        }
    }
}

impl std::fmt::Display for HandoffOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Completed => "completed",
            Self::Blocked => "blocked",
            Self::NeedsReview => "needs-review",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// A decision with its rationale and the alternatives that lost.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub decision: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub alternatives: Vec<String>,
}

/// Context the worker leaves for whoever picks up dependent items.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextForNext {
    #[serde(default)]
    pub key_patterns: Vec<String>,
    #[serde(default)]
    pub integration_points: Vec<String>,
    #[serde(default)]
    pub test_coverage: Option<String>,
}

/// The structured completion record a worker returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffRecord {
    /// Work-item id this handoff is for.
    pub task_id: String,
    /// Agent identity that did the work.
    pub agent: String,
    /// Terminal outcome.
    pub status: HandoffOutcome,
    /// Human-readable summary.
    pub summary: String,
    /// Files modified during the work.
    #[serde(default)]
    pub files_touched: Vec<String>,
    /// Files created during the work.
    #[serde(default)]
    pub files_created: Vec<String>,
    /// Decisions made, with rationale.
    #[serde(default)]
    pub decisions: Vec<Decision>,
    /// Recommendations for follow-up work.
    #[serde(default)]
    pub recommendations: Vec<String>,
    /// Warnings for whoever touches this area next.
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Context handed to dependent items.
    #[serde(default)]
    pub context_for_next: Option<ContextForNext>,
}

impl HandoffRecord {
    /// Build a synthetic failed record for output that carried no parseable
    /// handoff. Keeps the loop alive and leaves an audit trail.
    pub fn synthetic_failure(task_id: &str, agent: &str, warning: &str) -> Self {
        Self {
            task_id: task_id.to_string(),
            agent: agent.to_string(),
            status: HandoffOutcome::Failed,
            summary: "Worker produced no usable handoff".to_string(),
            files_touched: Vec::new(),
            files_created: Vec::new(),
            decisions: Vec::new(),
            recommendations: Vec::new(),
            warnings: vec![warning.to_string()],
            context_for_next: None,
        }
    }
}
