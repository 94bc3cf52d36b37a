//! Durable knowledge store.
//!
//! Append-only JSONL logs partitioned by scope, with tag-based indexing,
//! soft delete into a recoverable trash partition, and export/import.

mod entry;
mod jsonl_backend;
pub mod tags;
mod traits;

pub use entry::{EntryType, KnowledgeEntry, Scope};
pub use jsonl_backend::JsonlStore;
pub use traits::{KnowledgeStore, MergeStrategy, Page, SearchFilters};
