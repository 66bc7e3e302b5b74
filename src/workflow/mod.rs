//! Workflow definitions: tasks, ordering edges, and schedules.

pub mod definition;
pub mod schedule;

pub use definition::{TaskHandler, Workflow, WorkflowBuilder};
pub use schedule::{Interval, Schedule};
