//! End-to-end session test: scheduling, context assembly, dispatch,
//! handoff parsing, and knowledge persistence working together.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use foreman::classify::KeywordClassifier;
use foreman::config::OrchestratorConfig;
use foreman::dispatch::Dispatcher;
use foreman::error::DispatchError;
use foreman::item::{ItemStatus, WorkItem};
use foreman::session::{OrchestrationSession, SessionDeps};
use foreman::store::{EntryType, JsonlStore, KnowledgeStore, Page, SearchFilters};

/// Dispatcher that answers per item id and records every prompt it saw.
struct FakeWorkers {
    responses: HashMap<String, String>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl FakeWorkers {
    fn new(responses: HashMap<String, String>) -> Self {
        Self {
            responses,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// The prompt handed to a given item's worker.
    fn prompt_for(&self, item_id: &str) -> Option<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .find(|(id, _)| id == item_id)
            .map(|(_, p)| p.clone())
    }
}

#[async_trait]
impl Dispatcher for FakeWorkers {
    async fn dispatch(&self, _agent: &str, prompt: &str) -> Result<String, DispatchError> {
        // The prompt opens with "# Work item <id>: ...".
        let item_id = prompt
            .lines()
            .next()
            .and_then(|l| l.strip_prefix("# Work item "))
            .and_then(|l| l.split(':').next())
            .unwrap_or("")
            .to_string();
        self.prompts
            .lock()
            .unwrap()
            .push((item_id.clone(), prompt.to_string()));
        Ok(self
            .responses
            .get(&item_id)
            .cloned()
            .unwrap_or_else(|| "no handoff".to_string()))
    }
}

fn completed_with_decision(task: &str, agent: &str, decision: &str) -> String {
    format!(
        "Work log...\n```handoff\n{{\n  \"taskId\": \"{task}\",\n  \"agent\": \"{agent}\",\n  \
         \"status\": \"completed\",\n  \"summary\": \"finished {task}\",\n  \
         \"decisions\": [{{\"decision\": \"{decision}\", \"rationale\": \"it works\"}}]\n}}\n```\n"
    )
}

#[tokio::test]
async fn full_session_persists_knowledge_and_feeds_it_forward() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<JsonlStore> = Arc::new(JsonlStore::open(dir.path()).await.unwrap());

    // A is the foundation; B and C depend on it and share a file, so they
    // must be serialized into separate waves.
    let items = vec![
        WorkItem::new("A", "Scaffold the service")
            .with_agent("backend-developer")
            .with_files(["src/service.rs"]),
        WorkItem::new("B", "Add the read path")
            .with_agent("backend-developer")
            .with_deps(["A"])
            .with_files(["src/api.rs"]),
        WorkItem::new("C", "Add the write path")
            .with_agent("backend-developer")
            .with_deps(["A"])
            .with_files(["src/api.rs"]),
    ];

    let mut responses = HashMap::new();
    responses.insert(
        "A".to_string(),
        completed_with_decision("A", "backend-developer", "Service uses JSONL storage"),
    );
    responses.insert(
        "B".to_string(),
        completed_with_decision("B", "backend-developer", "Read path is paginated"),
    );
    responses.insert(
        "C".to_string(),
        completed_with_decision("C", "backend-developer", "Writes are append-only"),
    );
    let workers = Arc::new(FakeWorkers::new(responses));

    let deps = SessionDeps {
        store: Arc::clone(&store) as Arc<dyn KnowledgeStore>,
        dispatcher: Arc::clone(&workers) as Arc<dyn Dispatcher>,
        classifier: Arc::new(KeywordClassifier),
        source: None,
    };
    let mut session =
        OrchestrationSession::new(OrchestratorConfig::default(), items, deps);

    let summary = session.run().await.unwrap();

    // Everything finished, one dispatch per item.
    assert_eq!(summary.done, 3);
    assert_eq!(summary.dispatches, 3);
    for item in session.items() {
        assert_eq!(item.status, ItemStatus::Done);
    }

    // A's handoff knowledge reached B's worker: the agent-tagged decision
    // entry from A lands in B's assembled context.
    let b_prompt = workers.prompt_for("B").expect("B was dispatched");
    assert!(
        b_prompt.contains("Service uses JSONL storage"),
        "B's context should carry A's decision"
    );

    // The store holds one handoff record and one decision per item.
    let handoffs = store
        .list(
            &SearchFilters::default().with_type(EntryType::HandoffRecord),
            Page::default(),
        )
        .await
        .unwrap();
    assert_eq!(handoffs.len(), 3);
    let decisions = store
        .list(
            &SearchFilters::default().with_type(EntryType::Decision),
            Page::default(),
        )
        .await
        .unwrap();
    assert_eq!(decisions.len(), 3);

    // Knowledge survives a store reopen (the durable log, not memory).
    drop(store);
    let reopened = JsonlStore::open(dir.path()).await.unwrap();
    let again = reopened
        .list(
            &SearchFilters::default().with_type(EntryType::Decision),
            Page::default(),
        )
        .await
        .unwrap();
    assert_eq!(again.len(), 3);
}

#[tokio::test]
async fn failing_branch_is_isolated_and_escalated() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonlStore::open(dir.path()).await.unwrap());

    let items = vec![
        WorkItem::new("good", "Solid work").with_agent("tester"),
        WorkItem::new("bad", "Worker never reports back").with_agent("tester"),
    ];

    let mut responses = HashMap::new();
    responses.insert(
        "good".to_string(),
        completed_with_decision("good", "tester", "kept it simple"),
    );
    // "bad" gets the default no-handoff response every attempt.
    let workers = Arc::new(FakeWorkers::new(responses));

    let deps = SessionDeps {
        store: Arc::clone(&store) as Arc<dyn KnowledgeStore>,
        dispatcher: Arc::clone(&workers) as Arc<dyn Dispatcher>,
        classifier: Arc::new(KeywordClassifier),
        source: None,
    };
    let mut session =
        OrchestrationSession::new(OrchestratorConfig::default(), items, deps);

    let summary = session.run().await.unwrap();

    assert_eq!(summary.done, 1);
    assert_eq!(summary.blocked, 1);
    // 1 for "good" + 3 bounded attempts for "bad".
    assert_eq!(summary.dispatches, 4);

    let bad = session
        .items()
        .iter()
        .find(|i| i.id == "bad")
        .unwrap();
    assert_eq!(bad.status, ItemStatus::Blocked);
    assert_eq!(bad.retry_count, 3);

    // Each failed attempt left a synthetic handoff record for the audit
    // trail, searchable by task tag.
    let trail = store
        .search("", &SearchFilters::default().with_tags(["task:bad"]))
        .await
        .unwrap();
    assert!(!trail.is_empty());
}
