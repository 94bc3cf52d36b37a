//! Error types for Foreman.

/// Top-level error type for the orchestrator.
///
/// Handoff and dispatch failures never surface here: the session loop
/// converts both into synthetic `failed` outcomes so one confused worker
/// cannot abort the run. Their sub-errors stay public for callers using
/// the parser or dispatchers directly.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    #[error("Knowledge store error: {0}")]
    Store(#[from] StoreError),

    #[error("Work-item source error: {0}")]
    Source(#[from] SourceError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Planning errors. Cycles are fatal to planning — no partial plan is
/// ever returned.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("Dependency cycle involving items: {}", ids.join(", "))]
    Cycle { ids: Vec<String> },

    #[error("Item {item} depends on unknown item {dependency}")]
    UnknownDependency { item: String, dependency: String },

    #[error("Duplicate work-item id: {0}")]
    DuplicateId(String),
}

/// Knowledge store errors. Write failures must reach the caller — a
/// silently lost write violates the durability invariant.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt record at {path}:{line}: {message}")]
    CorruptRecord {
        path: String,
        line: usize,
        message: String,
    },

    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Handoff parse/validation errors. The orchestration loop recovers from
/// these by synthesizing a `failed` outcome; they never crash the loop.
#[derive(Debug, thiserror::Error)]
pub enum HandoffError {
    #[error("No handoff block found in worker output")]
    MissingBlock,

    #[error("Malformed handoff JSON: {0}")]
    Malformed(String),

    #[error("Missing required handoff field: {0}")]
    MissingField(&'static str),
}

/// Worker dispatch errors.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Worker process failed to start: {0}")]
    SpawnFailed(String),

    #[error("Worker {agent} exited with status {status}")]
    WorkerFailed { agent: String, status: String },

    #[error("Worker output was not valid UTF-8")]
    InvalidOutput,
}

/// Work-item source errors.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Failed to read item file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse item file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Session / work-item lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Unknown work item: {0}")]
    UnknownItem(String),

    #[error("Invalid status transition for {item}: {from} -> {to}")]
    InvalidTransition {
        item: String,
        from: String,
        to: String,
    },
}
