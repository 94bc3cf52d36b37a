//! Execution plan computation — topological waves plus file-conflict splitting.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::error::PlanError;
use crate::item::WorkItem;
use crate::scheduler::graph::DependencyGraph;

/// A set of item ids that may run concurrently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wave {
    /// Item ids in stable (declaration) order.
    pub items: Vec<String>,
}

/// An ordered sequence of waves.
///
/// Derived, never persisted: the plan is a pure function of the current item
/// list and can be recomputed at any time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub waves: Vec<Wave>,
}

impl ExecutionPlan {
    /// Total number of items across all waves.
    pub fn item_count(&self) -> usize {
        self.waves.iter().map(|w| w.items.len()).sum()
    }

    /// Iterate all item ids in wave order.
    pub fn iter_items(&self) -> impl Iterator<Item = &str> {
        self.waves.iter().flat_map(|w| w.items.iter().map(String::as_str))
    }
}

/// Build an execution plan from a list of work items.
///
/// Fails with [`PlanError::Cycle`] if the dependency graph contains a cycle;
/// cycles abort planning entirely. On success every input item appears in
/// exactly one wave, no item before its dependencies, and no two items in
/// the same wave share a touched file path.
pub fn build_plan(items: &[WorkItem]) -> Result<ExecutionPlan, PlanError> {
    let graph = DependencyGraph::build(items)?;

    if let Some(ids) = graph.find_cycle() {
        return Err(PlanError::Cycle { ids });
    }

    let levels = assign_levels(&graph);
    let files: HashMap<&str, &[String]> = items
        .iter()
        .map(|i| (i.id.as_str(), i.files.as_slice()))
        .collect();

    let mut waves = Vec::new();
    for level in levels {
        waves.extend(split_conflicts(&level, &files));
    }

    debug!(
        items = items.len(),
        waves = waves.len(),
        "execution plan computed"
    );
    Ok(ExecutionPlan { waves })
}

/// Kahn-style layering: level 0 = items with no dependencies, level n =
/// items whose dependencies all sit at levels < n. Items within a level
/// keep declaration order.
fn assign_levels(graph: &DependencyGraph) -> Vec<Vec<String>> {
    let mut level_of: HashMap<String, usize> = HashMap::new();
    let mut levels: Vec<Vec<String>> = Vec::new();

    // The graph is acyclic here, so each pass assigns at least one item.
    while level_of.len() < graph.ids().len() {
        let mut assigned_this_pass = Vec::new();
        for id in graph.ids() {
            if level_of.contains_key(id) {
                continue;
            }
            let deps = graph.deps_of(id);
            if deps.iter().all(|d| level_of.contains_key(d)) {
                let level = deps.iter().map(|d| level_of[d] + 1).max().unwrap_or(0);
                assigned_this_pass.push((id.clone(), level));
            }
        }
        for (id, level) in assigned_this_pass {
            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(id.clone());
            level_of.insert(id, level);
        }
    }

    levels
}

/// Split one candidate wave so no sub-wave contains two items with
/// overlapping touched-file sets.
///
/// First-fit greedy in stable order: each item lands in the earliest
/// sub-wave it does not conflict with. Never fails; worst case the level is
/// fully serialized.
fn split_conflicts(level: &[String], files: &HashMap<&str, &[String]>) -> Vec<Wave> {
    let mut sub_waves: Vec<(Vec<String>, HashSet<&str>)> = Vec::new();

    for id in level {
        let touched: HashSet<&str> = files
            .get(id.as_str())
            .map(|f| f.iter().map(String::as_str).collect())
            .unwrap_or_default();

        let slot = sub_waves
            .iter_mut()
            .find(|(_, claimed)| claimed.is_disjoint(&touched));

        match slot {
            Some((ids, claimed)) => {
                ids.push(id.clone());
                claimed.extend(touched);
            }
            None => {
                sub_waves.push((vec![id.clone()], touched));
            }
        }
    }

    sub_waves
        .into_iter()
        .map(|(items, _)| Wave { items })
        .collect()
}
