//! Work items and their status state machine.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Maximum transitions kept in an item's history.
const MAX_TRANSITIONS: usize = 100;

/// Status of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Waiting for dependencies and dispatch.
    Pending,
    /// Currently dispatched to a worker.
    InProgress,
    /// Finished successfully.
    Done,
    /// Cannot proceed; waiting on something external.
    Blocked,
    /// Finished but requires reviewer sign-off before dependents run.
    NeedsReview,
    /// Last attempt failed; eligible for retry.
    Failed,
}

impl ItemStatus {
    /// Check if this state allows transitioning to another state.
    pub fn can_transition_to(&self, target: ItemStatus) -> bool {
        use ItemStatus::*;

        matches!(
            (self, target),
            // From Pending
            (Pending, InProgress) |
            // From InProgress
            (InProgress, Done) | (InProgress, Blocked) |
            (InProgress, NeedsReview) | (InProgress, Failed) |
            // Retry paths; Failed escalates to Blocked on retry exhaustion
            (Blocked, Pending) | (Failed, Pending) | (Failed, Blocked)
        )
    }

    /// Check if this state can never be dispatched again within a session.
    ///
    /// `Blocked` and `NeedsReview` halt their branch until an external
    /// signal arrives, so they count as terminal here even though retry
    /// transitions exist.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Done | Self::Blocked | Self::NeedsReview)
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Blocked => "blocked",
            Self::NeedsReview => "needs_review",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// A recorded status transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusTransition {
    /// Previous status.
    pub from: ItemStatus,
    /// New status.
    pub to: ItemStatus,
    /// When the transition occurred.
    pub timestamp: DateTime<Utc>,
    /// Reason for the transition.
    pub reason: Option<String>,
}

/// A unit of schedulable work.
///
/// Ids are stable strings; dot-hierarchical ids ("3.2") express
/// parent/subtask relationships. Status is mutated only through
/// [`WorkItem::transition_to`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    /// Stable identifier.
    pub id: String,
    /// Short title.
    pub title: String,
    /// Free-text description.
    pub description: String,
    /// Current status.
    #[serde(default = "default_status")]
    pub status: ItemStatus,
    /// Ids of items that must be `done` before this one runs.
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
    /// Preferred agent identity, if the author knows who should take it.
    #[serde(default)]
    pub agent: Option<String>,
    /// File paths this item is expected to touch.
    #[serde(default)]
    pub files: Vec<String>,
    /// Automatic retry attempts consumed so far.
    #[serde(default)]
    pub retry_count: u32,
    /// When the item was created.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Status transition history, capped.
    #[serde(default)]
    pub transitions: Vec<StatusTransition>,
}

fn default_status() -> ItemStatus {
    ItemStatus::Pending
}

impl WorkItem {
    /// Create a new pending item.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            status: ItemStatus::Pending,
            dependencies: BTreeSet::new(),
            agent: None,
            files: Vec::new(),
            retry_count: 0,
            created_at: Utc::now(),
            transitions: Vec::new(),
        }
    }

    /// Builder-style dependency declaration.
    pub fn with_deps<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Builder-style touched-file declaration.
    pub fn with_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files = files.into_iter().map(Into::into).collect();
        self
    }

    /// Builder-style agent hint.
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    /// Builder-style description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Transition to a new status, recording the change.
    pub fn transition_to(
        &mut self,
        target: ItemStatus,
        reason: Option<String>,
    ) -> Result<(), SessionError> {
        if !self.status.can_transition_to(target) {
            return Err(SessionError::InvalidTransition {
                item: self.id.clone(),
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }

        self.transitions.push(StatusTransition {
            from: self.status,
            to: target,
            timestamp: Utc::now(),
            reason,
        });
        if self.transitions.len() > MAX_TRANSITIONS {
            let excess = self.transitions.len() - MAX_TRANSITIONS;
            self.transitions.drain(..excess);
        }

        self.status = target;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions_valid() {
        assert!(ItemStatus::Pending.can_transition_to(ItemStatus::InProgress));
        assert!(ItemStatus::InProgress.can_transition_to(ItemStatus::Done));
        assert!(ItemStatus::InProgress.can_transition_to(ItemStatus::Blocked));
        assert!(ItemStatus::InProgress.can_transition_to(ItemStatus::NeedsReview));
        assert!(ItemStatus::InProgress.can_transition_to(ItemStatus::Failed));
        assert!(ItemStatus::Failed.can_transition_to(ItemStatus::Pending));
        assert!(ItemStatus::Blocked.can_transition_to(ItemStatus::Pending));
    }

    #[test]
    fn status_transitions_invalid() {
        assert!(!ItemStatus::Done.can_transition_to(ItemStatus::Pending));
        assert!(!ItemStatus::Done.can_transition_to(ItemStatus::InProgress));
        assert!(!ItemStatus::Pending.can_transition_to(ItemStatus::Done));
        assert!(!ItemStatus::NeedsReview.can_transition_to(ItemStatus::InProgress));
    }

    #[test]
    fn settled_states() {
        assert!(ItemStatus::Done.is_settled());
        assert!(ItemStatus::Blocked.is_settled());
        assert!(ItemStatus::NeedsReview.is_settled());
        assert!(!ItemStatus::Pending.is_settled());
        assert!(!ItemStatus::Failed.is_settled());
    }

    #[test]
    fn transition_records_history() {
        let mut item = WorkItem::new("1", "Test");
        item.transition_to(ItemStatus::InProgress, None).unwrap();
        item.transition_to(ItemStatus::Failed, Some("no handoff".into()))
            .unwrap();

        assert_eq!(item.status, ItemStatus::Failed);
        assert_eq!(item.transitions.len(), 2);
        assert_eq!(item.transitions[1].reason.as_deref(), Some("no handoff"));
    }

    #[test]
    fn invalid_transition_rejected() {
        let mut item = WorkItem::new("1", "Test");
        let err = item.transition_to(ItemStatus::Done, None).unwrap_err();
        assert!(matches!(err, SessionError::InvalidTransition { .. }));
        assert_eq!(item.status, ItemStatus::Pending);
    }

    #[test]
    fn transition_history_capped() {
        let mut item = WorkItem::new("1", "Cap test");
        for _ in 0..120 {
            item.transition_to(ItemStatus::InProgress, None).unwrap();
            item.transition_to(ItemStatus::Failed, None).unwrap();
            item.transition_to(ItemStatus::Pending, None).unwrap();
        }
        assert!(item.transitions.len() <= MAX_TRANSITIONS);
    }
}
