//! Knowledge entry model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of durable fact an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryType {
    /// A decision with rationale.
    Decision,
    /// A lesson learned during work.
    Learning,
    /// A reusable pattern.
    Pattern,
    /// A note about system architecture.
    ArchitectureNote,
    /// A blocking problem and its context.
    Blocker,
    /// A full worker handoff record.
    HandoffRecord,
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Decision => "decision",
            Self::Learning => "learning",
            Self::Pattern => "pattern",
            Self::ArchitectureNote => "architecture-note",
            Self::Blocker => "blocker",
            Self::HandoffRecord => "handoff-record",
        };
        write!(f, "{s}")
    }
}

/// Visibility boundary for an entry.
///
/// Scope is fixed at creation and never changes afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Visible only within the originating project context.
    Local,
    /// Visible to all work items across projects.
    Shared,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Shared => write!(f, "shared"),
        }
    }
}

/// A durable, typed fact.
///
/// Immutable once written; deletion is soft (relocation to a trash
/// partition), never an in-place mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    /// Opaque unique id.
    pub id: String,
    /// Short title.
    pub title: String,
    /// Content body.
    pub content: String,
    /// Entry kind.
    pub entry_type: EntryType,
    /// Visibility scope.
    pub scope: Scope,
    /// Ordered tags; see [`crate::store::tags`] for reserved prefixes.
    #[serde(default)]
    pub tags: Vec<String>,
    /// When the entry was created.
    pub created_at: DateTime<Utc>,
    /// Last update (soft metadata only; content never changes).
    pub updated_at: DateTime<Utc>,
    /// Related work-item ids.
    #[serde(default)]
    pub related_items: Vec<String>,
    /// Agent identity that produced the entry, if any.
    #[serde(default)]
    pub agent: Option<String>,
}

impl KnowledgeEntry {
    /// Create a new entry with a fresh id and current timestamps.
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        entry_type: EntryType,
        scope: Scope,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            content: content.into(),
            entry_type,
            scope,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
            related_items: Vec::new(),
            agent: None,
        }
    }

    /// Builder-style tags.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Builder-style agent attribution.
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    /// Builder-style work-item back-references.
    pub fn with_related<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.related_items = items.into_iter().map(Into::into).collect();
        self
    }

    /// Check if the entry carries a specific tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}
