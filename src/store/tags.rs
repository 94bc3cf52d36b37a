//! Tag construction and normalization.
//!
//! Tags carry semantic prefixes so searches can combine them with
//! AND-semantics, e.g. `agent:backend-developer` + `type:decision`.

/// Reserved tag prefixes.
pub const AGENT: &str = "agent:";
pub const PROJECT: &str = "project:";
pub const TASK: &str = "task:";
pub const TYPE: &str = "type:";
pub const TECH: &str = "tech:";
pub const COMPONENT: &str = "component:";
pub const FEATURE: &str = "feature:";
pub const ERROR: &str = "error:";
pub const PATTERN: &str = "pattern:";
pub const DEPENDENCY: &str = "dep:";

/// Normalize a tag value: lowercase, spaces and underscores to dashes.
pub fn normalize(tag: &str) -> String {
    tag.trim()
        .to_lowercase()
        .replace([' ', '_'], "-")
}

/// Construct a prefixed tag from a raw value.
pub fn construct(prefix: &str, value: &str) -> String {
    format!("{prefix}{}", normalize(value))
}

/// Generate the standard tag set for a knowledge entry.
pub fn standard_tags(
    agent: Option<&str>,
    task_id: Option<&str>,
    entry_type: Option<&str>,
    project: Option<&str>,
    extra: &[String],
) -> Vec<String> {
    let mut tags = Vec::new();

    if let Some(agent) = agent {
        tags.push(construct(AGENT, agent));
    }
    if let Some(task_id) = task_id {
        tags.push(construct(TASK, task_id));
    }
    if let Some(entry_type) = entry_type {
        tags.push(construct(TYPE, entry_type));
    }
    if let Some(project) = project {
        tags.push(construct(PROJECT, project));
    }
    for tag in extra {
        let normalized = normalize(tag);
        if !normalized.is_empty() && !tags.contains(&normalized) {
            tags.push(normalized);
        }
    }

    tags
}

/// Keyword table for technology detection.
const TECH_PATTERNS: &[(&str, &[&str])] = &[
    ("rust", &["rust", ".rs", "cargo"]),
    ("typescript", &["typescript", ".ts", "tsc"]),
    ("javascript", &["javascript", ".js", "node"]),
    ("python", &["python", ".py", "pip"]),
    ("react", &["react", "jsx", "tsx", "usestate", "useeffect"]),
    ("docker", &["docker", "dockerfile", "container"]),
    ("postgres", &["postgres", "postgresql", "psql"]),
    ("sqlite", &["sqlite", "rusqlite", "libsql"]),
];

/// Detect `tech:` tags by keyword sniffing over content.
pub fn detect_tech(content: &str) -> Vec<String> {
    let lower = content.to_lowercase();
    TECH_PATTERNS
        .iter()
        .filter(|(_, patterns)| patterns.iter().any(|p| lower.contains(p)))
        .map(|(tech, _)| construct(TECH, tech))
        .collect()
}
