//! Ports for task definition access.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{TaskDefinition, TaskEntry, TaskStatus};

/// Read-only view of task definitions used by the scheduling core.
#[async_trait]
pub trait TaskLookup: Send + Sync {
    /// All tasks with status `active`.
    ///
    /// A row that cannot be decoded is returned as `Err(UnreadableTask)`
    /// rather than failing the whole listing.
    async fn active_tasks(&self) -> DomainResult<Vec<TaskEntry>>;

    /// Get a task by ID.
    async fn by_id(&self, id: Uuid) -> DomainResult<Option<TaskDefinition>>;
}

/// Writable task persistence, owned by the task-management side.
#[async_trait]
pub trait TaskRepository: TaskLookup {
    /// Insert a new task definition.
    async fn create_task(&self, task: &TaskDefinition) -> DomainResult<()>;

    /// List tasks, optionally filtered by status.
    async fn list_tasks(&self, status: Option<TaskStatus>) -> DomainResult<Vec<TaskDefinition>>;

    /// Change the lifecycle status of a task.
    async fn set_status(&self, id: Uuid, status: TaskStatus) -> DomainResult<()>;
}
