//! Dependency-aware scheduling.
//!
//! Turns a flat list of work items with declared dependencies and touched-file
//! sets into an ordered sequence of waves that can each run concurrently.

mod graph;
mod plan;

pub use graph::DependencyGraph;
pub use plan::{ExecutionPlan, Wave, build_plan};
