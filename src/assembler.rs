//! Context assembly — token-budgeted knowledge retrieval for a dispatch.
//!
//! Pulls entries relevant to an agent and work item from both scopes,
//! ranks them, and accumulates them under a soft token budget into one
//! composed text block.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::error::StoreError;
use crate::store::{EntryType, KnowledgeEntry, KnowledgeStore, Scope, SearchFilters, tags};

/// Estimate the token cost of a piece of text.
///
/// A cheap character-count proxy (roughly four characters per token), not a
/// tokenizer. The budget this feeds is a soft target.
pub fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() / 4).max(1)
}

/// A composed, budgeted context bundle for one dispatch.
#[derive(Debug, Clone)]
pub struct ContextBundle {
    /// Work item the bundle was assembled for.
    pub item_id: String,
    /// Agent identity the bundle was assembled for.
    pub agent: String,
    /// Entries included, in rank order.
    pub entries: Vec<KnowledgeEntry>,
    /// Estimated token total of the included entries.
    pub estimated_tokens: usize,
    /// Entries that matched but did not fit the budget.
    pub dropped: usize,
}

impl ContextBundle {
    /// Whether anything matched at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the bundle into the composed text block handed to a worker.
    pub fn render(&self) -> String {
        if self.entries.is_empty() {
            return String::new();
        }

        let mut out = format!(
            "# Context for {} (agent: {})\n",
            self.item_id, self.agent
        );

        let (handoffs, knowledge): (Vec<_>, Vec<_>) = self
            .entries
            .iter()
            .partition(|e| e.entry_type == EntryType::HandoffRecord);

        if !knowledge.is_empty() {
            out.push_str("\n## Relevant knowledge\n");
            for entry in knowledge {
                out.push_str(&format!(
                    "\n### [{}] {}\n{}\n",
                    entry.entry_type, entry.title, entry.content
                ));
            }
        }

        if !handoffs.is_empty() {
            out.push_str("\n## Prior handoffs for this item\n");
            for entry in handoffs {
                out.push_str(&format!("\n{}\n", entry.content));
            }
        }

        out
    }
}

/// Assembles context bundles from the knowledge store.
pub struct ContextAssembler {
    store: Arc<dyn KnowledgeStore>,
}

impl ContextAssembler {
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self { store }
    }

    /// Assemble a bundle for `agent` working on `item_id`.
    ///
    /// Zero matches yields an empty-but-valid bundle. A single top-ranked
    /// entry larger than the whole budget is still included: complete
    /// context beats mechanical truncation.
    pub async fn assemble(
        &self,
        agent: &str,
        item_id: &str,
        token_budget: usize,
        include_global: bool,
    ) -> Result<ContextBundle, StoreError> {
        let task_tag = tags::construct(tags::TASK, item_id);
        let agent_tag = tags::construct(tags::AGENT, agent);

        let mut candidates = Vec::new();
        let mut scopes = vec![Scope::Local];
        if include_global {
            scopes.push(Scope::Shared);
        }
        for scope in scopes {
            for tag in [&task_tag, &agent_tag] {
                let filters = SearchFilters::scoped(scope).with_tags([tag.clone()]);
                candidates.extend(self.store.search("", &filters).await?);
            }
        }

        // Dedupe exact duplicates (same entry via both tag queries, or the
        // same content mirrored across scopes).
        let mut seen_ids = HashSet::new();
        let mut seen_content = HashSet::new();
        candidates.retain(|e| {
            seen_ids.insert(e.id.clone()) && seen_content.insert(e.content.clone())
        });

        // Exact work-item match first, then agent match, then recency.
        candidates.sort_by(|a, b| {
            let rank = |e: &KnowledgeEntry| {
                (!e.has_tag(&task_tag), !e.has_tag(&agent_tag))
            };
            rank(a)
                .cmp(&rank(b))
                .then_with(|| b.updated_at.cmp(&a.updated_at))
        });

        let mut entries = Vec::new();
        let mut total = 0usize;
        let mut dropped = 0usize;
        for entry in candidates {
            let cost = estimate_tokens(&entry.content) + estimate_tokens(&entry.title);
            if entries.is_empty() || total + cost <= token_budget {
                total += cost;
                entries.push(entry);
            } else {
                dropped += 1;
            }
        }

        debug!(
            item = item_id,
            agent = agent,
            included = entries.len(),
            dropped = dropped,
            tokens = total,
            "context bundle assembled"
        );

        Ok(ContextBundle {
            item_id: item_id.to_string(),
            agent: agent.to_string(),
            entries,
            estimated_tokens: total,
            dropped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JsonlStore;

    async fn store_with(
        entries: Vec<KnowledgeEntry>,
    ) -> (tempfile::TempDir, Arc<dyn KnowledgeStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::open(dir.path()).await.unwrap();
        for e in entries {
            store.create(e).await.unwrap();
        }
        (dir, Arc::new(store))
    }

    fn entry(title: &str, content: &str, scope: Scope, entry_tags: &[&str]) -> KnowledgeEntry {
        KnowledgeEntry::new(title, content, EntryType::Learning, scope)
            .with_tags(entry_tags.iter().copied())
    }

    #[tokio::test]
    async fn zero_matches_yields_empty_valid_bundle() {
        let (_dir, store) = store_with(vec![]).await;
        let assembler = ContextAssembler::new(store);

        let bundle = assembler.assemble("tester", "9.9", 1000, true).await.unwrap();
        assert!(bundle.is_empty());
        assert_eq!(bundle.estimated_tokens, 0);
        assert_eq!(bundle.render(), "");
    }

    #[tokio::test]
    async fn exact_task_match_ranks_before_agent_match() {
        let (_dir, store) = store_with(vec![
            entry("Agent lore", "general agent knowledge", Scope::Local, &["agent:tester"]),
            entry("Task fact", "specific to this item", Scope::Local, &["task:1.2"]),
        ])
        .await;
        let assembler = ContextAssembler::new(store);

        let bundle = assembler.assemble("tester", "1.2", 10_000, false).await.unwrap();
        assert_eq!(bundle.entries.len(), 2);
        assert_eq!(bundle.entries[0].title, "Task fact");
    }

    #[tokio::test]
    async fn budget_caps_accumulation() {
        // ~25 tokens each (100 chars of content), distinct so the
        // content dedupe leaves all three as candidates.
        let (_dir, store) = store_with(vec![
            entry("A", &"a".repeat(100), Scope::Local, &["task:1"]),
            entry("B", &"b".repeat(100), Scope::Local, &["task:1"]),
            entry("C", &"c".repeat(100), Scope::Local, &["task:1"]),
        ])
        .await;
        let assembler = ContextAssembler::new(store);

        let bundle = assembler.assemble("tester", "1", 60, false).await.unwrap();
        assert_eq!(bundle.entries.len(), 2);
        assert_eq!(bundle.dropped, 1);
        assert!(bundle.estimated_tokens <= 60);
    }

    #[tokio::test]
    async fn oversized_single_entry_still_included() {
        let huge = "y".repeat(4_000);
        let (_dir, store) = store_with(vec![entry("Huge", &huge, Scope::Local, &["task:1"])]).await;
        let assembler = ContextAssembler::new(store);

        let bundle = assembler.assemble("tester", "1", 100, false).await.unwrap();
        assert_eq!(bundle.entries.len(), 1);
        assert!(bundle.estimated_tokens > 100);
    }

    #[tokio::test]
    async fn include_global_pulls_shared_scope() {
        let (_dir, store) = store_with(vec![
            entry("Shared wisdom", "applies everywhere", Scope::Shared, &["agent:tester"]),
        ])
        .await;
        let assembler = ContextAssembler::new(Arc::clone(&store));

        let without = assembler.assemble("tester", "1", 1000, false).await.unwrap();
        assert!(without.is_empty());

        let with = assembler.assemble("tester", "1", 1000, true).await.unwrap();
        assert_eq!(with.entries.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_content_removed() {
        let (_dir, store) = store_with(vec![
            entry("Copy 1", "identical body", Scope::Local, &["task:1"]),
            entry("Copy 2", "identical body", Scope::Shared, &["task:1"]),
        ])
        .await;
        let assembler = ContextAssembler::new(store);

        let bundle = assembler.assemble("tester", "1", 1000, true).await.unwrap();
        assert_eq!(bundle.entries.len(), 1);
    }

    #[tokio::test]
    async fn render_separates_handoffs_from_knowledge() {
        let handoff = KnowledgeEntry::new(
            "Handoff for 1",
            "# Handoff: 1 (completed)\nDid things",
            EntryType::HandoffRecord,
            Scope::Local,
        )
        .with_tags(["task:1"]);
        let (_dir, store) = store_with(vec![
            entry("Fact", "a fact", Scope::Local, &["task:1"]),
            handoff,
        ])
        .await;
        let assembler = ContextAssembler::new(store);

        let bundle = assembler.assemble("tester", "1", 10_000, false).await.unwrap();
        let rendered = bundle.render();
        assert!(rendered.contains("## Relevant knowledge"));
        assert!(rendered.contains("## Prior handoffs for this item"));
    }
}
