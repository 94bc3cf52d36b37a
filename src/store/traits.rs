//! Backend-agnostic knowledge store trait.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::store::entry::{EntryType, KnowledgeEntry, Scope};

/// Filters applied to search and list operations.
///
/// Tag filters use AND-semantics: every requested tag must be present on a
/// candidate entry.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    /// Tags that must all be present.
    pub tags: Vec<String>,
    /// Restrict to one entry type.
    pub entry_type: Option<EntryType>,
    /// Restrict to one scope; `None` searches both.
    pub scope: Option<Scope>,
}

impl SearchFilters {
    /// Filter by a single scope.
    pub fn scoped(scope: Scope) -> Self {
        Self {
            scope: Some(scope),
            ..Default::default()
        }
    }

    /// Builder-style tag filter.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Builder-style entry-type filter.
    pub fn with_type(mut self, entry_type: EntryType) -> Self {
        self.entry_type = Some(entry_type);
        self
    }
}

/// Pagination window for `list`.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// How `import` treats a scope's existing content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Discard existing scope content and replace it wholesale.
    Replace,
    /// Append incoming entries whose ids are not already present;
    /// existing ids are never overwritten.
    Merge,
}

/// Async interface over a durable knowledge store.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Append a new entry. Returns the entry id.
    async fn create(&self, entry: KnowledgeEntry) -> Result<String, StoreError>;

    /// Fetch a live entry by id.
    async fn get(&self, id: &str) -> Result<Option<KnowledgeEntry>, StoreError>;

    /// Keyword search over title/content combined with tag filtering.
    ///
    /// Every whitespace-separated keyword must match title or content
    /// (case-insensitive). Results are recency-first on `updated_at`.
    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<KnowledgeEntry>, StoreError>;

    /// List entries matching the filters, paginated, recency-first.
    async fn list(
        &self,
        filters: &SearchFilters,
        page: Page,
    ) -> Result<Vec<KnowledgeEntry>, StoreError>;

    /// Count tags across live entries, optionally restricted to a prefix.
    /// Sorted by count descending, then tag name.
    async fn tags_summary(
        &self,
        prefix: Option<&str>,
    ) -> Result<Vec<(String, usize)>, StoreError>;

    /// Move an entry to the trash partition. Idempotent: deleting an
    /// already-deleted or unknown id is a no-op.
    async fn soft_delete(&self, id: &str) -> Result<(), StoreError>;

    /// Export one scope as a JSONL blob (one entry per line).
    async fn export(&self, scope: Scope) -> Result<String, StoreError>;

    /// Import a JSONL blob into one scope.
    async fn import(
        &self,
        scope: Scope,
        blob: &str,
        strategy: MergeStrategy,
    ) -> Result<usize, StoreError>;
}
