//! Work-item dependency graph.

use std::collections::{HashMap, HashSet};

use crate::error::PlanError;
use crate::item::WorkItem;

/// Directed dependency graph over work items.
///
/// An edge A→B means B depends on A (A must finish first). Node order
/// follows the declaration order of the input list so every traversal is
/// deterministic for a fixed input.
#[derive(Debug)]
pub struct DependencyGraph {
    /// Item ids in declaration order.
    order: Vec<String>,
    /// Item id -> ids it depends on.
    dependencies: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Build a graph from a list of items.
    ///
    /// Fails on duplicate ids, on dependencies naming unknown items, and on
    /// items depending on themselves. Cycles are detected separately by
    /// [`DependencyGraph::find_cycle`] so provisional graphs can still be
    /// constructed and inspected.
    pub fn build(items: &[WorkItem]) -> Result<Self, PlanError> {
        let mut order = Vec::with_capacity(items.len());
        let mut dependencies: HashMap<String, Vec<String>> = HashMap::new();

        for item in items {
            if dependencies.contains_key(&item.id) {
                return Err(PlanError::DuplicateId(item.id.clone()));
            }
            order.push(item.id.clone());
            // BTreeSet iteration keeps dependency order stable too.
            dependencies.insert(item.id.clone(), item.dependencies.iter().cloned().collect());
        }

        for item in items {
            for dep in &item.dependencies {
                if dep == &item.id {
                    return Err(PlanError::Cycle {
                        ids: vec![item.id.clone()],
                    });
                }
                if !dependencies.contains_key(dep) {
                    return Err(PlanError::UnknownDependency {
                        item: item.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        Ok(Self {
            order,
            dependencies,
        })
    }

    /// Item ids in declaration order.
    pub fn ids(&self) -> &[String] {
        &self.order
    }

    /// Dependencies of one item. Empty for unknown ids.
    pub fn deps_of(&self, id: &str) -> &[String] {
        self.dependencies.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Depth-first search for a dependency cycle.
    ///
    /// Returns the ids participating in the first cycle found (in cycle
    /// order), or `None` if the graph is acyclic.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut on_path: Vec<&str> = Vec::new();
        let mut on_path_set: HashSet<&str> = HashSet::new();

        for start in &self.order {
            if visited.contains(start.as_str()) {
                continue;
            }
            if let Some(cycle) =
                self.dfs(start, &mut visited, &mut on_path, &mut on_path_set)
            {
                return Some(cycle);
            }
        }
        None
    }

    fn dfs<'a>(
        &'a self,
        node: &'a str,
        visited: &mut HashSet<&'a str>,
        on_path: &mut Vec<&'a str>,
        on_path_set: &mut HashSet<&'a str>,
    ) -> Option<Vec<String>> {
        visited.insert(node);
        on_path.push(node);
        on_path_set.insert(node);

        for dep in self.deps_of(node) {
            if on_path_set.contains(dep.as_str()) {
                // Back edge: the cycle is the path segment from `dep` onward.
                let pos = on_path.iter().position(|n| *n == dep).unwrap_or(0);
                return Some(on_path[pos..].iter().map(|s| s.to_string()).collect());
            }
            if !visited.contains(dep.as_str())
                && let Some(cycle) = self.dfs(dep, visited, on_path, on_path_set)
            {
                return Some(cycle);
            }
        }

        on_path.pop();
        on_path_set.remove(node);
        None
    }
}
