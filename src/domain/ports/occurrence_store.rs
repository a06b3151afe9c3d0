//! Repository port for occurrence persistence.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    CreateOutcome, HistoryEntry, OccurrenceFilter, OccurrenceStatus, TaskOccurrence,
};

/// Occurrence persistence.
///
/// Occurrences with status `deleted` are invisible to de-duplication,
/// counting, and anchor lookups: a live occurrence is unique per
/// task + due date, enforced by the store itself.
#[async_trait]
pub trait OccurrenceStore: Send + Sync {
    /// Get an occurrence by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<TaskOccurrence>>;

    /// The live occurrence of a task on a date, if any.
    async fn find_by_task_and_date(
        &self,
        task_id: Uuid,
        due_date: NaiveDate,
    ) -> DomainResult<Option<TaskOccurrence>>;

    /// Number of live occurrences ever generated for a task.
    async fn count(&self, task_id: Uuid) -> DomainResult<u64>;

    /// Whether the task has any occurrence at all, deleted ones included.
    async fn has_any(&self, task_id: Uuid) -> DomainResult<bool>;

    /// Date of the most recent completion or skip.
    async fn most_recent_terminal(&self, task_id: Uuid) -> DomainResult<Option<NaiveDate>>;

    /// Latest due date among live occurrences.
    async fn latest_due_date(&self, task_id: Uuid) -> DomainResult<Option<NaiveDate>>;

    /// Occurrences matching a filter, ordered by due date.
    async fn list(&self, filter: OccurrenceFilter) -> DomainResult<Vec<TaskOccurrence>>;

    /// Insert an occurrence and its history entries atomically.
    ///
    /// Returns `CreateOutcome::Duplicate` (and writes nothing) when a live
    /// occurrence for the same task and date already exists, including one
    /// inserted concurrently after the caller's own check.
    async fn create(
        &self,
        occurrence: &TaskOccurrence,
        history: &[HistoryEntry],
    ) -> DomainResult<CreateOutcome>;

    /// Persist a modified occurrence and its history entries atomically,
    /// provided its stored status is still `expected_status`.
    ///
    /// Fails with `ConcurrencyConflict` if the status changed underneath.
    async fn update(
        &self,
        occurrence: &TaskOccurrence,
        expected_status: OccurrenceStatus,
        history: &[HistoryEntry],
    ) -> DomainResult<()>;

    /// Mark every non-terminal occurrence of a task due after `after` as
    /// deleted, appending a status-change entry for each. Returns the IDs.
    async fn bulk_delete_future(
        &self,
        task_id: Uuid,
        after: NaiveDate,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<Uuid>>;
}

/// List all occurrences of one task.
pub async fn list_for_task<S: OccurrenceStore + ?Sized>(
    store: &S,
    task_id: Uuid,
) -> DomainResult<Vec<TaskOccurrence>> {
    store.list(OccurrenceFilter::for_task(task_id)).await
}

/// Treats `OccurrenceStatus::Deleted` as removed for de-duplication purposes.
pub fn is_live(status: OccurrenceStatus) -> bool {
    status != OccurrenceStatus::Deleted
}
