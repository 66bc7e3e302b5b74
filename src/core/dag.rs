//! Task graph for dependency ordering.
//!
//! TaskDAG represents a workflow's tasks and ordering edges as a directed
//! acyclic graph. An edge `a -> b` means `a` must complete successfully
//! before `b` may start.

use crate::core::task::{Task, TaskId};
use crate::error::{Error, Result};
use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

/// The task dependency graph.
///
/// Nodes are tasks; edges are ordering constraints. Cycles are rejected at
/// insertion time, so topological ordering always succeeds on a graph built
/// through this API.
#[derive(Clone)]
pub struct TaskDAG {
    /// The underlying directed graph.
    graph: DiGraph<Task, ()>,
    /// Index mapping from TaskId to NodeIndex for fast lookups.
    index: HashMap<TaskId, NodeIndex>,
}

impl TaskDAG {
    /// Create a new empty TaskDAG.
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
        }
    }

    /// Add a task to the DAG.
    ///
    /// # Errors
    /// Returns a validation error if a task with the same id is already
    /// registered; ids are unique within a workflow.
    pub fn add_task(&mut self, task: Task) -> Result<()> {
        if self.index.contains_key(&task.id) {
            return Err(Error::Validation(format!(
                "duplicate task id: {}",
                task.id
            )));
        }
        let id = task.id.clone();
        let node = self.graph.add_node(task);
        self.index.insert(id, node);
        Ok(())
    }

    /// Add an ordering edge: `from` must succeed before `to` starts.
    ///
    /// # Errors
    /// Returns an error if either task is not registered or if the edge
    /// would create a cycle.
    pub fn add_dependency(&mut self, from: &TaskId, to: &TaskId) -> Result<()> {
        let from_idx = *self
            .index
            .get(from)
            .ok_or_else(|| Error::Validation(format!("unknown task in dependency: {}", from)))?;
        let to_idx = *self
            .index
            .get(to)
            .ok_or_else(|| Error::Validation(format!("unknown task in dependency: {}", to)))?;

        // Add the edge, then reject it if it closed a cycle.
        let edge = self.graph.add_edge(from_idx, to_idx, ());
        if is_cyclic_directed(&self.graph) {
            self.graph.remove_edge(edge);
            return Err(Error::Validation(format!(
                "dependency from {} to {} would create a cycle",
                from, to
            )));
        }

        Ok(())
    }

    /// Get a reference to a task by its id.
    pub fn get_task(&self, id: &TaskId) -> Option<&Task> {
        self.index
            .get(id)
            .and_then(|&node| self.graph.node_weight(node))
    }

    /// Get a mutable reference to a task by its id.
    pub fn get_task_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        if let Some(&node) = self.index.get(id) {
            self.graph.node_weight_mut(node)
        } else {
            None
        }
    }

    /// Number of tasks in the DAG.
    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of ordering edges in the DAG.
    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Check if an ordering edge exists between two tasks.
    pub fn has_dependency(&self, from: &TaskId, to: &TaskId) -> bool {
        if let (Some(&from_idx), Some(&to_idx)) = (self.index.get(from), self.index.get(to)) {
            self.graph.find_edge(from_idx, to_idx).is_some()
        } else {
            false
        }
    }

    /// All tasks the given task depends on (direct predecessors).
    pub fn upstream_of(&self, id: &TaskId) -> Vec<&Task> {
        if let Some(&node) = self.index.get(id) {
            self.graph
                .neighbors_directed(node, petgraph::Direction::Incoming)
                .filter_map(|n| self.graph.node_weight(n))
                .collect()
        } else {
            Vec::new()
        }
    }

    /// All tasks that depend on the given task (direct successors).
    pub fn downstream_of(&self, id: &TaskId) -> Vec<&Task> {
        if let Some(&node) = self.index.get(id) {
            self.graph
                .neighbors_directed(node, petgraph::Direction::Outgoing)
                .filter_map(|n| self.graph.node_weight(n))
                .collect()
        } else {
            Vec::new()
        }
    }

    /// All tasks in the DAG.
    pub fn all_tasks(&self) -> Vec<&Task> {
        self.graph.node_weights().collect()
    }

    /// All ordering edges as (from, to) id pairs.
    pub fn edges(&self) -> Vec<(TaskId, TaskId)> {
        self.graph
            .edge_references()
            .filter_map(|e| {
                let from = self.graph.node_weight(e.source())?;
                let to = self.graph.node_weight(e.target())?;
                Some((from.id.clone(), to.id.clone()))
            })
            .collect()
    }

    /// Check if the DAG contains a task.
    pub fn contains_task(&self, id: &TaskId) -> bool {
        self.index.contains_key(id)
    }

    /// Check if the DAG is empty.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Task ids in topological order (every task after its dependencies).
    ///
    /// # Errors
    /// Returns an error if the graph contains a cycle; cannot happen for a
    /// graph built through `add_dependency`.
    pub fn topological_order(&self) -> Result<Vec<TaskId>> {
        let sorted = toposort(&self.graph, None).map_err(|cycle| {
            let name = self
                .graph
                .node_weight(cycle.node_id())
                .map(|t| t.id.as_str())
                .unwrap_or("unknown");
            Error::Validation(format!("cycle detected at task: {}", name))
        })?;

        Ok(sorted
            .into_iter()
            .filter_map(|node| self.graph.node_weight(node))
            .map(|t| t.id.clone())
            .collect())
    }
}

impl Default for TaskDAG {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskDAG {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskDAG")
            .field("tasks", &self.task_count())
            .field("dependencies", &self.dependency_count())
            .finish()
    }
}
