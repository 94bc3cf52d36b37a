//! Work-item source boundary.
//!
//! Any data source that can yield work items and accept status-transition
//! notifications can drive a session; a thin adapter against an external
//! task tracker is the expected collaborator. The built-in implementation
//! reads a JSON file.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::error::SourceError;
use crate::item::{ItemStatus, WorkItem};

/// A source of work items.
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Load the full item list.
    async fn load(&self) -> Result<Vec<WorkItem>, SourceError>;

    /// Notification that an item changed status. Sources that mirror an
    /// external tracker push the update there; the default does nothing.
    async fn status_changed(&self, _item_id: &str, _status: ItemStatus) -> Result<(), SourceError> {
        Ok(())
    }
}

/// JSON-file-backed item source. The file holds a plain array of items.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ItemSource for JsonFileSource {
    async fn load(&self) -> Result<Vec<WorkItem>, SourceError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| SourceError::Io {
                path: self.path.display().to_string(),
                source: e,
            })?;
        let items: Vec<WorkItem> = serde_json::from_str(&raw)?;
        debug!(path = %self.path.display(), items = items.len(), "work items loaded");
        Ok(items)
    }

    async fn status_changed(&self, item_id: &str, status: ItemStatus) -> Result<(), SourceError> {
        debug!(item = item_id, status = %status, "status changed");
        Ok(())
    }
}

/// Helper for tests and demos: load items from a JSON string.
pub fn items_from_json(raw: &str) -> Result<Vec<WorkItem>, SourceError> {
    Ok(serde_json::from_str(raw)?)
}
