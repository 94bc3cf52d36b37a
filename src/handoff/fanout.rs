//! Fan-out of an accepted handoff into durable knowledge entries.

use tracing::debug;

use crate::error::StoreError;
use crate::handoff::record::{HandoffOutcome, HandoffRecord};
use crate::store::{EntryType, KnowledgeEntry, KnowledgeStore, Scope, tags};

/// Write the knowledge entries an accepted handoff produces.
///
/// One `handoff-record` entry always lands; decisions, key patterns, and
/// blocking reasons land as their own typed entries. Returns the created
/// entry ids. This is the sole path by which a worker's outcome becomes
/// durable knowledge.
pub async fn record_handoff(
    store: &dyn KnowledgeStore,
    project: &str,
    record: &HandoffRecord,
) -> Result<Vec<String>, StoreError> {
    let mut ids = Vec::new();
    let agent = record.agent.as_str();
    let task = record.task_id.as_str();

    let mut body = format!(
        "# Handoff: {task} ({})\n\n## Summary\n{}\n",
        record.status, record.summary
    );
    if !record.files_touched.is_empty() {
        body.push_str("\n## Files touched\n");
        for f in &record.files_touched {
            body.push_str(&format!("- {f}\n"));
        }
    }
    if !record.files_created.is_empty() {
        body.push_str("\n## Files created\n");
        for f in &record.files_created {
            body.push_str(&format!("- {f}\n"));
        }
    }
    if !record.recommendations.is_empty() {
        body.push_str("\n## Recommendations\n");
        for r in &record.recommendations {
            body.push_str(&format!("- {r}\n"));
        }
    }
    if !record.warnings.is_empty() {
        body.push_str("\n## Warnings\n");
        for w in &record.warnings {
            body.push_str(&format!("- {w}\n"));
        }
    }

    let mut tech = tags::detect_tech(&body);
    tech.push("handoff".to_string());
    let entry = KnowledgeEntry::new(
        format!("Handoff for {task}"),
        body,
        EntryType::HandoffRecord,
        Scope::Local,
    )
    .with_tags(tags::standard_tags(
        Some(agent),
        Some(task),
        Some("handoff-record"),
        Some(project),
        &tech,
    ))
    .with_agent(agent)
    .with_related([task]);
    ids.push(store.create(entry).await?);

    for decision in &record.decisions {
        let mut content = decision.decision.clone();
        if !decision.rationale.is_empty() {
            content.push_str(&format!("\n\nRationale: {}", decision.rationale));
        }
        if !decision.alternatives.is_empty() {
            content.push_str(&format!(
                "\n\nAlternatives considered: {}",
                decision.alternatives.join("; ")
            ));
        }
        let entry = KnowledgeEntry::new(
            decision.decision.clone(),
            content,
            EntryType::Decision,
            Scope::Local,
        )
        .with_tags(tags::standard_tags(
            Some(agent),
            Some(task),
            Some("decision"),
            Some(project),
            &[],
        ))
        .with_agent(agent)
        .with_related([task]);
        ids.push(store.create(entry).await?);
    }

    if let Some(next) = &record.context_for_next
        && !next.key_patterns.is_empty()
    {
        let mut content = String::from("Key patterns:\n");
        for p in &next.key_patterns {
            content.push_str(&format!("- {p}\n"));
        }
        if !next.integration_points.is_empty() {
            content.push_str("\nIntegration points:\n");
            for p in &next.integration_points {
                content.push_str(&format!("- {p}\n"));
            }
        }
        if let Some(coverage) = &next.test_coverage {
            content.push_str(&format!("\nTest coverage: {coverage}\n"));
        }
        let entry = KnowledgeEntry::new(
            format!("Patterns from {task}"),
            content,
            EntryType::Pattern,
            Scope::Local,
        )
        .with_tags(tags::standard_tags(
            Some(agent),
            Some(task),
            Some("pattern"),
            Some(project),
            &[],
        ))
        .with_agent(agent)
        .with_related([task]);
        ids.push(store.create(entry).await?);
    }

    if record.status == HandoffOutcome::Blocked {
        let entry = KnowledgeEntry::new(
            format!("Blocker on {task}"),
            record.summary.clone(),
            EntryType::Blocker,
            Scope::Local,
        )
        .with_tags(tags::standard_tags(
            Some(agent),
            Some(task),
            Some("blocker"),
            Some(project),
            &[],
        ))
        .with_agent(agent)
        .with_related([task]);
        ids.push(store.create(entry).await?);
    }

    debug!(task = %task, entries = ids.len(), "handoff fanned out to knowledge store");
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handoff::record::Decision;
    use crate::store::{JsonlStore, Page, SearchFilters};

    fn record(status: HandoffOutcome) -> HandoffRecord {
        HandoffRecord {
            task_id: "1.1".into(),
            agent: "backend-developer".into(),
            status,
            summary: "Did the thing".into(),
            files_touched: vec!["src/lib.rs".into()],
            files_created: vec![],
            decisions: vec![Decision {
                decision: "Use JSONL".into(),
                rationale: "append-only".into(),
                alternatives: vec!["sqlite".into()],
            }],
            recommendations: vec![],
            warnings: vec![],
            context_for_next: None,
        }
    }

    #[tokio::test]
    async fn completed_handoff_writes_record_and_decisions() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::open(dir.path()).await.unwrap();

        let ids = record_handoff(&store, "demo", &record(HandoffOutcome::Completed))
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);

        let decisions = store
            .list(
                &SearchFilters::default().with_type(EntryType::Decision),
                Page::default(),
            )
            .await
            .unwrap();
        assert_eq!(decisions.len(), 1);
        assert!(decisions[0].has_tag("task:1.1"));
        assert!(decisions[0].has_tag("agent:backend-developer"));
        assert!(decisions[0].has_tag("project:demo"));
    }

    #[tokio::test]
    async fn blocked_handoff_writes_blocker_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::open(dir.path()).await.unwrap();

        record_handoff(&store, "demo", &record(HandoffOutcome::Blocked))
            .await
            .unwrap();

        let blockers = store
            .list(
                &SearchFilters::default().with_type(EntryType::Blocker),
                Page::default(),
            )
            .await
            .unwrap();
        assert_eq!(blockers.len(), 1);
        assert_eq!(blockers[0].title, "Blocker on 1.1");
    }
}
