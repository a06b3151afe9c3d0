//! Task definition domain model.
//!
//! A task definition is the chore template a household schedules. It is
//! owned by the task-management side of the system; the scheduling core
//! only ever reads it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::schedule::ScheduleConfig;

/// Lifecycle status of a task definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    /// Task generates occurrences.
    Active,
    /// Task is on hold; future occurrences have been removed.
    Paused,
    /// Task was deleted by a user but kept for the audit trail.
    SoftDeleted,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::SoftDeleted => "soft-deleted",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            "soft-deleted" | "soft_deleted" | "deleted" => Some(Self::SoftDeleted),
            _ => None,
        }
    }
}

/// A chore definition with its recurrence rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Recurrence rule; treated as an immutable snapshot for each generation run.
    pub schedule: ScheduleConfig,
    /// Users new occurrences are assigned to.
    pub default_assignee_ids: Vec<Uuid>,
    pub status: TaskStatus,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskDefinition {
    /// Create a new active task definition.
    pub fn new(name: impl Into<String>, schedule: ScheduleConfig, created_by: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            schedule,
            default_assignee_ids: Vec::new(),
            status: TaskStatus::Active,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_assignees(mut self, assignees: Vec<Uuid>) -> Self {
        self.default_assignee_ids = assignees;
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == TaskStatus::Active
    }
}

/// A stored task whose definition could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnreadableTask {
    pub id: Uuid,
    pub name: String,
    pub error: String,
}

/// One row of a task listing: a usable definition or the reason it is not.
pub type TaskEntry = Result<TaskDefinition, UnreadableTask>;
