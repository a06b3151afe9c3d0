//! Task occurrence domain model.
//!
//! An occurrence is one dated instance of a task that somebody has to act
//! on. Occurrences move through a small state machine:
//!
//! ```text
//! created ──► assigned ──► completed | skipped | deleted
//!    │           ▲  │
//!    │           └──┘ (reassignment)
//!    └──────────────────► completed | skipped | deleted
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of an occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccurrenceStatus {
    /// Generated with nobody assigned.
    Created,
    /// Generated or updated with at least one assignee.
    Assigned,
    /// Done.
    Completed,
    /// Deliberately not done, with a reason.
    Skipped,
    /// Removed because its task was paused or deleted.
    Deleted,
}

impl OccurrenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Assigned => "assigned",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
            Self::Deleted => "deleted",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "created" => Some(Self::Created),
            "assigned" => Some(Self::Assigned),
            "completed" | "complete" | "done" => Some(Self::Completed),
            "skipped" => Some(Self::Skipped),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped | Self::Deleted)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> Vec<OccurrenceStatus> {
        match self {
            Self::Created => vec![Self::Assigned, Self::Completed, Self::Skipped, Self::Deleted],
            Self::Assigned => vec![Self::Assigned, Self::Completed, Self::Skipped, Self::Deleted],
            Self::Completed | Self::Skipped | Self::Deleted => vec![],
        }
    }

    /// Check if transition to the given status is valid.
    pub fn can_transition_to(&self, new_status: OccurrenceStatus) -> bool {
        self.valid_transitions().contains(&new_status)
    }

    /// Initial status for a freshly generated occurrence.
    pub fn initial_for(assignees: &[Uuid]) -> Self {
        if assignees.is_empty() {
            Self::Created
        } else {
            Self::Assigned
        }
    }
}

/// A concrete, dated instance of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOccurrence {
    pub id: Uuid,
    pub task_id: Uuid,
    pub due_date: NaiveDate,
    pub status: OccurrenceStatus,
    pub assignee_ids: Vec<Uuid>,
    /// Set only when the occurrence is completed.
    pub completed_at: Option<DateTime<Utc>>,
    /// Set only when the occurrence is skipped.
    pub skipped_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskOccurrence {
    /// Create a new occurrence; status follows the assignee list.
    pub fn new(task_id: Uuid, due_date: NaiveDate, assignee_ids: Vec<Uuid>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            due_date,
            status: OccurrenceStatus::initial_for(&assignee_ids),
            assignee_ids,
            completed_at: None,
            skipped_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// When the occurrence reached completed/skipped, if it did.
    pub fn terminal_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at.or(self.skipped_at)
    }
}

/// Filter for listing occurrences.
#[derive(Debug, Clone, Default)]
pub struct OccurrenceFilter {
    pub task_id: Option<Uuid>,
    pub status: Option<OccurrenceStatus>,
    pub assignee_id: Option<Uuid>,
    pub due_from: Option<NaiveDate>,
    pub due_to: Option<NaiveDate>,
}

impl OccurrenceFilter {
    pub fn for_task(task_id: Uuid) -> Self {
        Self {
            task_id: Some(task_id),
            ..Default::default()
        }
    }

    /// Whether an occurrence passes every set criterion.
    pub fn matches(&self, occurrence: &TaskOccurrence) -> bool {
        self.task_id.is_none_or(|id| occurrence.task_id == id)
            && self.status.is_none_or(|s| occurrence.status == s)
            && self
                .assignee_id
                .is_none_or(|id| occurrence.assignee_ids.contains(&id))
            && self.due_from.is_none_or(|d| occurrence.due_date >= d)
            && self.due_to.is_none_or(|d| occurrence.due_date <= d)
    }
}

/// Result of asking the store to create an occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// Row inserted together with its history entries.
    Created(TaskOccurrence),
    /// A live occurrence already exists for the same task and date.
    Duplicate,
}

impl CreateOutcome {
    pub fn into_created(self) -> Option<TaskOccurrence> {
        match self {
            Self::Created(occurrence) => Some(occurrence),
            Self::Duplicate => None,
        }
    }
}
