//! Orchestration session — the loop that drives scheduling, context
//! assembly, dispatch, and handoff processing.
//!
//! The loop is logically single-threaded and cooperative: it issues one
//! wave's worth of dispatches, awaits all of them, applies the outcomes,
//! and repeats. Session state lives in the `OrchestrationSession` value, not
//! in process-wide singletons, so a session can be inspected, persisted, or
//! restarted cleanly.

use std::sync::Arc;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::assembler::ContextAssembler;
use crate::classify::Classifier;
use crate::config::OrchestratorConfig;
use crate::dispatch::Dispatcher;
use crate::error::{Error, SessionError};
use crate::handoff::{HandoffOutcome, HandoffRecord, parse_handoff, record_handoff};
use crate::item::{ItemStatus, WorkItem};
use crate::scheduler::build_plan;
use crate::source::ItemSource;
use crate::store::KnowledgeStore;

/// Shared collaborators for a session.
///
/// Bundles the boundary objects to reduce argument count.
pub struct SessionDeps {
    pub store: Arc<dyn KnowledgeStore>,
    pub dispatcher: Arc<dyn Dispatcher>,
    pub classifier: Arc<dyn Classifier>,
    /// Optional upstream tracker to mirror status changes into.
    pub source: Option<Arc<dyn ItemSource>>,
}

/// End-of-session accounting.
#[derive(Debug, Clone, Default)]
pub struct SessionSummary {
    pub done: usize,
    pub blocked: usize,
    pub needs_review: usize,
    pub pending: usize,
    pub failed: usize,
    pub dispatches: usize,
    /// Per-item notes: escalations, store write failures, mismatches.
    pub notes: Vec<String>,
}

/// A single orchestration session over a set of work items.
pub struct OrchestrationSession {
    config: OrchestratorConfig,
    items: Vec<WorkItem>,
    deps: SessionDeps,
    assembler: ContextAssembler,
    cancel: CancellationToken,
    dispatches: usize,
    notes: Vec<String>,
}

impl OrchestrationSession {
    pub fn new(config: OrchestratorConfig, items: Vec<WorkItem>, deps: SessionDeps) -> Self {
        let assembler = ContextAssembler::new(Arc::clone(&deps.store));
        Self {
            config,
            items,
            deps,
            assembler,
            cancel: CancellationToken::new(),
            dispatches: 0,
            notes: Vec::new(),
        }
    }

    /// Token for session-level cancellation. Observed between waves only;
    /// in-flight dispatches are allowed to finish.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Read access to the current item states.
    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    fn item(&self, id: &str) -> Result<&WorkItem, SessionError> {
        self.items
            .iter()
            .find(|i| i.id == id)
            .ok_or_else(|| SessionError::UnknownItem(id.to_string()))
    }

    fn item_mut(&mut self, id: &str) -> Result<&mut WorkItem, SessionError> {
        self.items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| SessionError::UnknownItem(id.to_string()))
    }

    /// An item is runnable when it is pending and all dependencies are done.
    fn is_runnable(&self, id: &str) -> bool {
        let Ok(item) = self.item(id) else {
            return false;
        };
        item.status == ItemStatus::Pending
            && item.dependencies.iter().all(|dep| {
                self.item(dep)
                    .map(|d| d.status == ItemStatus::Done)
                    .unwrap_or(false)
            })
    }

    fn agent_for(&self, item: &WorkItem) -> String {
        item.agent
            .clone()
            .or_else(|| self.deps.classifier.classify(item))
            .unwrap_or_else(|| self.config.default_agent.clone())
    }

    /// Run the session until exhaustion, cancellation, or the dispatch cap.
    ///
    /// Planning failures (cycles) abort the whole session. Per-item failures
    /// are isolated: they are retried, then escalated to `blocked`, and
    /// unrelated branches keep advancing.
    pub async fn run(&mut self) -> Result<SessionSummary, Error> {
        self.config.validate().map_err(Error::Config)?;
        info!(items = self.items.len(), "session starting");

        loop {
            if self.cancel.is_cancelled() {
                info!("session cancelled; stopping between waves");
                break;
            }
            if self.config.max_dispatches > 0 && self.dispatches >= self.config.max_dispatches {
                warn!(cap = self.config.max_dispatches, "session dispatch cap reached");
                self.notes.push("session dispatch cap reached".to_string());
                break;
            }

            let plan = build_plan(&self.items).map_err(Error::Plan)?;
            let wave = plan.waves.iter().find_map(|w| {
                let runnable: Vec<String> = w
                    .items
                    .iter()
                    .filter(|id| self.is_runnable(id))
                    .cloned()
                    .collect();
                (!runnable.is_empty()).then_some(runnable)
            });

            let Some(wave) = wave else {
                debug!("no runnable items remain");
                break;
            };

            self.run_wave(&wave).await?;
        }

        let summary = self.summary();
        info!(
            done = summary.done,
            blocked = summary.blocked,
            needs_review = summary.needs_review,
            dispatches = summary.dispatches,
            "session finished"
        );
        Ok(summary)
    }

    /// Dispatch one wave, chunked by `max_parallel_agents` and drained
    /// sequentially when the wave is larger than the bound.
    async fn run_wave(&mut self, wave: &[String]) -> Result<(), Error> {
        let chunk_size = self.config.max_parallel_agents;

        for chunk in wave.chunks(chunk_size) {
            let mut in_flight = Vec::new();

            for id in chunk {
                if self.config.max_dispatches > 0
                    && self.dispatches >= self.config.max_dispatches
                {
                    break;
                }

                let agent = {
                    let item = self.item(id).map_err(Error::Session)?;
                    self.agent_for(item)
                };
                let bundle = self
                    .assembler
                    .assemble(
                        &agent,
                        id,
                        self.config.context_token_budget,
                        self.config.include_global_context,
                    )
                    .await
                    .map_err(Error::Store)?;

                let prompt = {
                    let item = self.item(id).map_err(Error::Session)?;
                    compose_prompt(item, &bundle.render())
                };

                self.item_mut(id)
                    .map_err(Error::Session)?
                    .transition_to(ItemStatus::InProgress, None)
                    .map_err(Error::Session)?;
                self.notify_source(id, ItemStatus::InProgress).await;
                self.dispatches += 1;

                let dispatcher = Arc::clone(&self.deps.dispatcher);
                let id = id.clone();
                in_flight.push(async move {
                    let result = dispatcher.dispatch(&agent, &prompt).await;
                    (id, agent, result)
                });
            }

            for (id, agent, result) in join_all(in_flight).await {
                match result {
                    Ok(raw) => self.handle_worker_output(&id, &agent, &raw).await?,
                    Err(e) => {
                        warn!(item = %id, agent = %agent, "dispatch failed: {e}");
                        let record = HandoffRecord::synthetic_failure(
                            &id,
                            &agent,
                            &format!("dispatch failed: {e}"),
                        );
                        self.apply_record(&id, &record).await?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Parse a worker's raw output and apply the resulting handoff.
    ///
    /// Missing or malformed handoffs become a synthetic `failed` outcome
    /// with a warning; this path never crashes the loop.
    pub async fn handle_worker_output(
        &mut self,
        item_id: &str,
        agent: &str,
        raw_output: &str,
    ) -> Result<(), Error> {
        let record = match parse_handoff(raw_output) {
            Ok(mut record) => {
                if record.task_id != item_id {
                    warn!(
                        item = item_id,
                        claimed = %record.task_id,
                        "handoff names a different item; applying to the dispatched one"
                    );
                    self.notes.push(format!(
                        "{item_id}: handoff claimed task {}",
                        record.task_id
                    ));
                    // Reattribute before fan-out so the knowledge lands
                    // under the dispatched item's tags, not a stranger's.
                    record.task_id = item_id.to_string();
                }
                record
            }
            Err(e) => {
                warn!(item = item_id, "no usable handoff: {e}");
                HandoffRecord::synthetic_failure(item_id, agent, "no handoff produced")
            }
        };
        self.apply_record(item_id, &record).await
    }

    /// Fan a handoff out to the knowledge store and apply exactly one
    /// status transition.
    async fn apply_record(&mut self, item_id: &str, record: &HandoffRecord) -> Result<(), Error> {
        if let Err(e) = record_handoff(self.deps.store.as_ref(), &self.config.project, record).await
        {
            // Surfaced, not swallowed: the summary carries the failure.
            error!(item = item_id, "knowledge store write failed: {e}");
            self.notes
                .push(format!("{item_id}: knowledge store write failed: {e}"));
        }

        let final_status = match record.status {
            HandoffOutcome::Completed => {
                self.transition(item_id, ItemStatus::Done, None)?;
                ItemStatus::Done
            }
            HandoffOutcome::Blocked => {
                self.transition(item_id, ItemStatus::Blocked, Some(record.summary.clone()))?;
                ItemStatus::Blocked
            }
            HandoffOutcome::NeedsReview => {
                self.transition(
                    item_id,
                    ItemStatus::NeedsReview,
                    Some(record.summary.clone()),
                )?;
                ItemStatus::NeedsReview
            }
            HandoffOutcome::Failed => self.apply_retry_policy(item_id, &record.summary)?,
        };
        self.notify_source(item_id, final_status).await;
        Ok(())
    }

    /// Mirror a status change into the upstream source, if one is attached.
    async fn notify_source(&self, item_id: &str, status: ItemStatus) {
        if let Some(source) = &self.deps.source
            && let Err(e) = source.status_changed(item_id, status).await
        {
            warn!(item = item_id, "status notification failed: {e}");
        }
    }

    /// Bounded automatic retry: a failed item returns to `pending` until the
    /// retry budget is exhausted, then escalates to `blocked`. Returns the
    /// status the item landed on.
    fn apply_retry_policy(&mut self, item_id: &str, reason: &str) -> Result<ItemStatus, Error> {
        let max_retries = self.config.max_retries;
        let item = self.item_mut(item_id).map_err(Error::Session)?;

        item.transition_to(ItemStatus::Failed, Some(reason.to_string()))
            .map_err(Error::Session)?;
        item.retry_count += 1;

        if item.retry_count < max_retries {
            let attempt = item.retry_count;
            item.transition_to(
                ItemStatus::Pending,
                Some(format!("automatic retry {attempt}/{max_retries}")),
            )
            .map_err(Error::Session)?;
            debug!(item = item_id, attempt, "item queued for retry");
            Ok(ItemStatus::Pending)
        } else {
            let note = format!("retries exhausted after {} attempts", item.retry_count);
            item.transition_to(ItemStatus::Blocked, Some(note.clone()))
                .map_err(Error::Session)?;
            warn!(item = item_id, "{note}");
            self.notes.push(format!("{item_id}: {note}"));
            Ok(ItemStatus::Blocked)
        }
    }

    fn transition(
        &mut self,
        item_id: &str,
        status: ItemStatus,
        reason: Option<String>,
    ) -> Result<(), Error> {
        self.item_mut(item_id)
            .map_err(Error::Session)?
            .transition_to(status, reason)
            .map_err(Error::Session)?;
        Ok(())
    }

    /// Current session accounting.
    pub fn summary(&self) -> SessionSummary {
        let mut summary = SessionSummary {
            dispatches: self.dispatches,
            notes: self.notes.clone(),
            ..Default::default()
        };
        for item in &self.items {
            match item.status {
                ItemStatus::Done => summary.done += 1,
                ItemStatus::Blocked => summary.blocked += 1,
                ItemStatus::NeedsReview => summary.needs_review += 1,
                ItemStatus::Failed => summary.failed += 1,
                ItemStatus::Pending | ItemStatus::InProgress => summary.pending += 1,
            }
        }
        summary
    }
}

/// Compose the text block handed to a worker: the item itself plus the
/// assembled context, plus the handoff instructions the parser expects.
fn compose_prompt(item: &WorkItem, rendered_context: &str) -> String {
    let mut prompt = format!("# Work item {}: {}\n\n{}\n", item.id, item.title, item.description);
    if !rendered_context.is_empty() {
        prompt.push_str("\n---\n\n");
        prompt.push_str(rendered_context);
    }
    prompt.push_str(
        "\n---\n\nWhen finished, emit a fenced ```handoff block containing a JSON \
         object with taskId, agent, status, and summary.\n",
    );
    prompt
}
