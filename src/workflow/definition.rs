//! Workflow definition: tasks, ordering edges, schedule, and metadata.
//!
//! A `Workflow` is built once at startup and handed to the runner; it has
//! no runtime state of its own. Construction validates task ids, handler
//! wiring, dependency endpoints, and acyclicity. A definition that fails
//! validation registers nothing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::dag::TaskDAG;
use crate::core::task::{Task, TaskId};
use crate::error::{Error, Result};
use crate::workflow::schedule::Schedule;

/// The action a task performs when the runner reaches it.
///
/// Handlers are injected at workflow construction time; the runner only
/// sees this seam, never the concrete training or sync machinery.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn execute(&self) -> Result<()>;
}

/// An acyclic set of tasks with a schedule and shared defaults.
pub struct Workflow {
    name: String,
    description: String,
    tags: Vec<String>,
    schedule: Schedule,
    default_retries: u32,
    dag: TaskDAG,
    handlers: HashMap<TaskId, Arc<dyn TaskHandler>>,
}

impl Workflow {
    /// Start building a workflow with the given name.
    pub fn builder(name: &str) -> WorkflowBuilder {
        WorkflowBuilder {
            name: name.to_string(),
            description: String::new(),
            tags: Vec::new(),
            schedule: None,
            default_retries: 0,
            tasks: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn default_retries(&self) -> u32 {
        self.default_retries
    }

    /// The task graph definition.
    pub fn dag(&self) -> &TaskDAG {
        &self.dag
    }

    /// The handler wired to a task.
    pub fn handler(&self, id: &TaskId) -> Option<&Arc<dyn TaskHandler>> {
        self.handlers.get(id)
    }

    /// Ids of all registered tasks, in dependency order.
    pub fn task_ids(&self) -> Result<Vec<TaskId>> {
        self.dag.topological_order()
    }

    pub fn task_count(&self) -> usize {
        self.dag.task_count()
    }
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("name", &self.name)
            .field("tasks", &self.dag.task_count())
            .field("dependencies", &self.dag.dependency_count())
            .field("schedule", &self.schedule)
            .finish()
    }
}

struct TaskSpec {
    id: String,
    description: String,
    retries: Option<u32>,
    handler: Arc<dyn TaskHandler>,
}

/// Builder for `Workflow`; all validation happens in `build`.
pub struct WorkflowBuilder {
    name: String,
    description: String,
    tags: Vec<String>,
    schedule: Option<Schedule>,
    default_retries: u32,
    tasks: Vec<TaskSpec>,
    edges: Vec<(String, String)>,
}

impl WorkflowBuilder {
    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    pub fn schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = Some(schedule);
        self
    }

    /// Retry budget applied to tasks without a per-task override.
    pub fn default_retries(mut self, retries: u32) -> Self {
        self.default_retries = retries;
        self
    }

    /// Register a task with its handler.
    pub fn task(mut self, id: &str, description: &str, handler: Arc<dyn TaskHandler>) -> Self {
        self.tasks.push(TaskSpec {
            id: id.to_string(),
            description: description.to_string(),
            retries: None,
            handler,
        });
        self
    }

    /// Register a task with a per-task retry override.
    pub fn task_with_retries(
        mut self,
        id: &str,
        description: &str,
        retries: u32,
        handler: Arc<dyn TaskHandler>,
    ) -> Self {
        self.tasks.push(TaskSpec {
            id: id.to_string(),
            description: description.to_string(),
            retries: Some(retries),
            handler,
        });
        self
    }

    /// Declare that `from` must succeed before `to` starts.
    pub fn dependency(mut self, from: &str, to: &str) -> Self {
        self.edges.push((from.to_string(), to.to_string()));
        self
    }

    /// Validate and build the workflow.
    ///
    /// # Errors
    /// Returns a validation error on an invalid or duplicate task id, a
    /// dependency naming an unregistered task, a cycle, a missing
    /// schedule, or an empty task set.
    pub fn build(self) -> Result<Workflow> {
        let schedule = self.schedule.ok_or_else(|| {
            Error::Validation(format!("workflow {} has no schedule", self.name))
        })?;
        if self.tasks.is_empty() {
            return Err(Error::Validation(format!(
                "workflow {} has no tasks",
                self.name
            )));
        }

        let mut dag = TaskDAG::new();
        let mut handlers: HashMap<TaskId, Arc<dyn TaskHandler>> = HashMap::new();

        for spec in self.tasks {
            let id = TaskId::new(&spec.id)?;
            let mut task = Task::new(id.clone(), &spec.description);
            if let Some(retries) = spec.retries {
                task = task.with_retries(retries);
            }
            dag.add_task(task)?;
            handlers.insert(id, spec.handler);
        }

        for (from, to) in self.edges {
            dag.add_dependency(&TaskId::new(&from)?, &TaskId::new(&to)?)?;
        }

        Ok(Workflow {
            name: self.name,
            description: self.description,
            tags: self.tags,
            schedule,
            default_retries: self.default_retries,
            dag,
            handlers,
        })
    }
}
