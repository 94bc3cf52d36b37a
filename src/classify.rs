//! Agent classification — picking a handler identity for a work item.
//!
//! The default strategy is keyword sniffing over the item's text and file
//! paths. It is deliberately behind a trait so a more principled classifier
//! can be swapped in without touching the scheduler or the store.

use crate::item::WorkItem;

/// Strategy for choosing an agent identity for an item.
pub trait Classifier: Send + Sync {
    /// Pick an agent for the item, or `None` if nothing matches.
    fn classify(&self, item: &WorkItem) -> Option<String>;
}

/// Keyword table: (agent, text keywords, file-path fragments).
const AGENT_HINTS: &[(&str, &[&str], &[&str])] = &[
    (
        "frontend-developer",
        &["frontend", "component", "react", "ui state"],
        &[".jsx", ".tsx", ".vue", ".svelte"],
    ),
    (
        "ui-developer",
        &["styling", "css", "layout", "design system"],
        &[".css", ".scss", ".sass", ".less"],
    ),
    (
        "backend-developer",
        &["api", "backend", "endpoint", "server", "database schema"],
        &[".rs", ".py", ".go", ".java"],
    ),
    (
        "tester",
        &["test", "coverage", "regression"],
        &["test", "spec", "__tests__"],
    ),
    (
        "devops-engineer",
        &["deploy", "pipeline", "infrastructure"],
        &["dockerfile", "docker-compose", ".yml", ".yaml"],
    ),
    (
        "data-engineer",
        &["migration", "etl", "warehouse"],
        &["migration", "schema", ".sql"],
    ),
    (
        "security-engineer",
        &["auth", "security", "permission", "vulnerability"],
        &["auth", "security", ".env"],
    ),
];

/// Default keyword-based classifier.
#[derive(Debug, Default)]
pub struct KeywordClassifier;

impl Classifier for KeywordClassifier {
    fn classify(&self, item: &WorkItem) -> Option<String> {
        let text = format!("{} {}", item.title, item.description).to_lowercase();
        let paths: Vec<String> = item.files.iter().map(|f| f.to_lowercase()).collect();

        // First agent whose hints match wins; the table is ordered from most
        // to least specific.
        for (agent, keywords, fragments) in AGENT_HINTS {
            let text_hit = keywords.iter().any(|kw| text.contains(kw));
            let path_hit = paths
                .iter()
                .any(|p| fragments.iter().any(|frag| p.contains(frag)));
            if text_hit || path_hit {
                return Some((*agent).to_string());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, desc: &str, files: &[&str]) -> WorkItem {
        WorkItem::new("1", title)
            .with_description(desc)
            .with_files(files.iter().copied())
    }

    #[test]
    fn classifies_by_text() {
        let c = KeywordClassifier;
        let agent = c.classify(&item("Add login API endpoint", "", &[])).unwrap();
        assert_eq!(agent, "backend-developer");
    }

    #[test]
    fn classifies_by_file_path() {
        let c = KeywordClassifier;
        let agent = c
            .classify(&item("Polish the button", "", &["src/Button.tsx"]))
            .unwrap();
        assert_eq!(agent, "frontend-developer");
    }

    #[test]
    fn test_keywords_route_to_tester() {
        let c = KeywordClassifier;
        let agent = c
            .classify(&item("Improve coverage for the queue", "", &[]))
            .unwrap();
        assert_eq!(agent, "tester");
    }

    #[test]
    fn no_match_yields_none() {
        let c = KeywordClassifier;
        assert!(c.classify(&item("Think about things", "", &[])).is_none());
    }
}
