//! File-backed knowledge store: one append-only JSONL log per scope.
//!
//! Layout under the store root:
//! - `local.jsonl` — project-local entries, one complete record per line
//! - `shared.jsonl` — globally shared entries
//! - `trash/<id>.json` — soft-deleted entries, recoverable
//!
//! `create` only ever appends; prior records are never rewritten. A crash
//! mid-write can at worst lose the final unflushed record, never corrupt
//! history. `soft_delete` writes the trash copy first, then compacts the
//! primary log, so the record survives a crash between the two steps.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::store::entry::{KnowledgeEntry, Scope};
use crate::store::traits::{KnowledgeStore, MergeStrategy, Page, SearchFilters};

const LOCAL_LOG: &str = "local.jsonl";
const SHARED_LOG: &str = "shared.jsonl";
const TRASH_DIR: &str = "trash";

/// In-memory view of both scope logs.
#[derive(Default)]
struct Inner {
    local: Vec<KnowledgeEntry>,
    shared: Vec<KnowledgeEntry>,
}

impl Inner {
    fn scope_entries(&self, scope: Scope) -> &Vec<KnowledgeEntry> {
        match scope {
            Scope::Local => &self.local,
            Scope::Shared => &self.shared,
        }
    }

    fn scope_entries_mut(&mut self, scope: Scope) -> &mut Vec<KnowledgeEntry> {
        match scope {
            Scope::Local => &mut self.local,
            Scope::Shared => &mut self.shared,
        }
    }
}

/// JSONL-file knowledge store.
pub struct JsonlStore {
    root: PathBuf,
    inner: RwLock<Inner>,
}

impl JsonlStore {
    /// Open (or initialize) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(root.join(TRASH_DIR))
            .await
            .map_err(|e| io_err(&root, e))?;

        let inner = Inner {
            local: load_log(&root.join(LOCAL_LOG)).await?,
            shared: load_log(&root.join(SHARED_LOG)).await?,
        };
        debug!(
            local = inner.local.len(),
            shared = inner.shared.len(),
            root = %root.display(),
            "knowledge store opened"
        );

        Ok(Self {
            root,
            inner: RwLock::new(inner),
        })
    }

    fn log_path(&self, scope: Scope) -> PathBuf {
        match scope {
            Scope::Local => self.root.join(LOCAL_LOG),
            Scope::Shared => self.root.join(SHARED_LOG),
        }
    }

    fn trash_path(&self, id: &str) -> PathBuf {
        self.root.join(TRASH_DIR).join(format!("{id}.json"))
    }

    /// Append one record line and flush it.
    async fn append_line(&self, scope: Scope, entry: &KnowledgeEntry) -> Result<(), StoreError> {
        let path = self.log_path(scope);
        let line = serde_json::to_string(entry)?;

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| io_err(&path, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| io_err(&path, e))?;
        file.write_all(b"\n").await.map_err(|e| io_err(&path, e))?;
        file.flush().await.map_err(|e| io_err(&path, e))?;
        Ok(())
    }

    /// Rewrite a scope log wholesale (used by soft delete and replace-import).
    /// Writes to a temp file then renames, so the log is never half-written.
    async fn rewrite_log(
        &self,
        scope: Scope,
        entries: &[KnowledgeEntry],
    ) -> Result<(), StoreError> {
        let path = self.log_path(scope);
        let tmp = path.with_extension("jsonl.tmp");

        let mut body = String::new();
        for entry in entries {
            body.push_str(&serde_json::to_string(entry)?);
            body.push('\n');
        }

        fs::write(&tmp, body).await.map_err(|e| io_err(&tmp, e))?;
        fs::rename(&tmp, &path).await.map_err(|e| io_err(&path, e))?;
        Ok(())
    }
}

fn io_err(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Load one scope log, tolerating a torn final line (a crash mid-append
/// loses at most that record).
async fn load_log(path: &Path) -> Result<Vec<KnowledgeEntry>, StoreError> {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_err(path, e)),
    };

    let mut entries = Vec::new();
    let line_count = raw.lines().count();
    for (idx, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<KnowledgeEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) if idx + 1 == line_count => {
                warn!(
                    path = %path.display(),
                    line = idx + 1,
                    "dropping torn final record: {e}"
                );
            }
            Err(e) => {
                return Err(StoreError::CorruptRecord {
                    path: path.display().to_string(),
                    line: idx + 1,
                    message: e.to_string(),
                });
            }
        }
    }
    Ok(entries)
}

/// Check an entry against filters (tags are AND-semantics).
fn matches_filters(entry: &KnowledgeEntry, filters: &SearchFilters) -> bool {
    if let Some(t) = filters.entry_type
        && entry.entry_type != t
    {
        return false;
    }
    filters.tags.iter().all(|tag| entry.has_tag(tag))
}

/// Check an entry against a keyword query. Every whitespace-separated
/// keyword must appear in title or content, case-insensitive.
fn matches_query(entry: &KnowledgeEntry, query: &str) -> bool {
    let haystack = format!("{}\n{}", entry.title, entry.content).to_lowercase();
    query
        .split_whitespace()
        .all(|kw| haystack.contains(&kw.to_lowercase()))
}

fn collect_scoped<'a>(inner: &'a Inner, scope: Option<Scope>) -> Vec<&'a KnowledgeEntry> {
    match scope {
        Some(s) => inner.scope_entries(s).iter().collect(),
        None => inner.local.iter().chain(inner.shared.iter()).collect(),
    }
}

#[async_trait]
impl KnowledgeStore for JsonlStore {
    async fn create(&self, entry: KnowledgeEntry) -> Result<String, StoreError> {
        let mut inner = self.inner.write().await;
        let id = entry.id.clone();
        self.append_line(entry.scope, &entry).await?;
        inner.scope_entries_mut(entry.scope).push(entry);
        debug!(id = %id, "knowledge entry created");
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<KnowledgeEntry>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .local
            .iter()
            .chain(inner.shared.iter())
            .find(|e| e.id == id)
            .cloned())
    }

    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<KnowledgeEntry>, StoreError> {
        let inner = self.inner.read().await;
        let mut hits: Vec<KnowledgeEntry> = collect_scoped(&inner, filters.scope)
            .into_iter()
            .filter(|e| matches_filters(e, filters) && matches_query(e, query))
            .cloned()
            .collect();
        // Unscored ranking is recency-first.
        hits.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(hits)
    }

    async fn list(
        &self,
        filters: &SearchFilters,
        page: Page,
    ) -> Result<Vec<KnowledgeEntry>, StoreError> {
        let inner = self.inner.read().await;
        let mut hits: Vec<KnowledgeEntry> = collect_scoped(&inner, filters.scope)
            .into_iter()
            .filter(|e| matches_filters(e, filters))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(hits
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .collect())
    }

    async fn tags_summary(
        &self,
        prefix: Option<&str>,
    ) -> Result<Vec<(String, usize)>, StoreError> {
        let inner = self.inner.read().await;
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for entry in inner.local.iter().chain(inner.shared.iter()) {
            for tag in &entry.tags {
                if prefix.is_none_or(|p| tag.starts_with(p)) {
                    *counts.entry(tag.clone()).or_insert(0) += 1;
                }
            }
        }
        let mut summary: Vec<(String, usize)> = counts.into_iter().collect();
        summary.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(summary)
    }

    async fn soft_delete(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;

        let found = [Scope::Local, Scope::Shared].into_iter().find_map(|scope| {
            inner
                .scope_entries(scope)
                .iter()
                .position(|e| e.id == id)
                .map(|pos| (scope, pos))
        });

        let Some((scope, pos)) = found else {
            // Unknown or already deleted: a no-op, not an error.
            return Ok(());
        };

        let entry = inner.scope_entries(scope)[pos].clone();

        // Trash copy lands before the log is compacted; a crash between the
        // two steps duplicates the record instead of losing it.
        let trash = self.trash_path(id);
        let body = serde_json::to_string_pretty(&entry)?;
        fs::write(&trash, body).await.map_err(|e| io_err(&trash, e))?;

        inner.scope_entries_mut(scope).remove(pos);
        let remaining = inner.scope_entries(scope).clone();
        self.rewrite_log(scope, &remaining).await?;
        debug!(id = %id, scope = %scope, "knowledge entry soft-deleted");
        Ok(())
    }

    async fn export(&self, scope: Scope) -> Result<String, StoreError> {
        let inner = self.inner.read().await;
        let mut blob = String::new();
        for entry in inner.scope_entries(scope) {
            blob.push_str(&serde_json::to_string(entry)?);
            blob.push('\n');
        }
        Ok(blob)
    }

    async fn import(
        &self,
        scope: Scope,
        blob: &str,
        strategy: MergeStrategy,
    ) -> Result<usize, StoreError> {
        let mut incoming = Vec::new();
        for line in blob.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let mut entry: KnowledgeEntry = serde_json::from_str(line)?;
            // Imported entries belong to the target scope.
            entry.scope = scope;
            incoming.push(entry);
        }

        let mut inner = self.inner.write().await;
        match strategy {
            MergeStrategy::Replace => {
                let count = incoming.len();
                self.rewrite_log(scope, &incoming).await?;
                *inner.scope_entries_mut(scope) = incoming;
                Ok(count)
            }
            MergeStrategy::Merge => {
                let mut existing: HashSet<String> = inner
                    .scope_entries(scope)
                    .iter()
                    .map(|e| e.id.clone())
                    .collect();
                let mut imported = 0;
                for entry in incoming {
                    // `insert` also catches an id repeated within the blob.
                    if !existing.insert(entry.id.clone()) {
                        continue;
                    }
                    self.append_line(scope, &entry).await?;
                    inner.scope_entries_mut(scope).push(entry);
                    imported += 1;
                }
                Ok(imported)
            }
        }
    }
}
