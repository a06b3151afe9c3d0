//! Occurrence lifecycle management.
//!
//! Every user-facing transition (complete, skip, update, comment) and the
//! task-level pause/delete/resume operations live here. Each state change
//! is persisted together with its history entries in one store call.
//! Generating the next occurrence after a completion or skip is a
//! best-effort side effect: its failures are logged, never returned.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    HistoryEntry, OccurrenceStatus, TaskDefinition, TaskOccurrence, TaskStatus,
};
use crate::domain::ports::{HistoryLog, OccurrenceStore, TaskRepository};
use crate::services::occurrence_generator::{GenerationReport, NextAnchor, OccurrenceGenerator};

/// Fields a user may change on an open occurrence.
#[derive(Debug, Clone, Default)]
pub struct OccurrenceUpdate {
    pub due_date: Option<NaiveDate>,
    pub assignee_ids: Option<Vec<Uuid>>,
}

/// Result of completing or skipping an occurrence.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub occurrence: TaskOccurrence,
    /// The follow-up occurrence, when one was generated.
    pub next: Option<TaskOccurrence>,
}

/// Result of pausing or deleting a task.
#[derive(Debug, Clone)]
pub struct TaskStatusChange {
    pub task: TaskDefinition,
    /// Occurrences moved to `deleted`.
    pub deleted: Vec<Uuid>,
}

/// Applies occurrence and task lifecycle transitions.
pub struct OccurrenceLifecycle<S, T>
where
    S: OccurrenceStore + HistoryLog,
    T: TaskRepository,
{
    store: Arc<S>,
    tasks: Arc<T>,
    generator: Arc<OccurrenceGenerator<S>>,
}

impl<S, T> OccurrenceLifecycle<S, T>
where
    S: OccurrenceStore + HistoryLog,
    T: TaskRepository,
{
    pub fn new(store: Arc<S>, tasks: Arc<T>, generator: Arc<OccurrenceGenerator<S>>) -> Self {
        Self {
            store,
            tasks,
            generator,
        }
    }

    /// Get an occurrence or fail with `OccurrenceNotFound`.
    pub async fn get(&self, occurrence_id: Uuid) -> DomainResult<TaskOccurrence> {
        self.store
            .get(occurrence_id)
            .await?
            .ok_or(DomainError::OccurrenceNotFound(occurrence_id))
    }

    /// History of an occurrence, oldest first.
    pub async fn history(&self, occurrence_id: Uuid) -> DomainResult<Vec<HistoryEntry>> {
        self.get(occurrence_id).await?;
        self.store.for_occurrence(occurrence_id).await
    }

    /// Mark an occurrence completed, then try to generate the next one.
    #[instrument(skip_all, fields(%occurrence_id))]
    pub async fn complete(&self, occurrence_id: Uuid, user_id: Uuid) -> DomainResult<TransitionOutcome> {
        let current = self.get(occurrence_id).await?;
        ensure_transition(&current, OccurrenceStatus::Completed)?;

        let now = self.generator.clock().now();
        let mut occurrence = current.clone();
        occurrence.status = OccurrenceStatus::Completed;
        occurrence.completed_at = Some(now);
        occurrence.updated_at = now;

        let entry = HistoryEntry::status_change(
            occurrence.id,
            user_id,
            Some(current.status),
            OccurrenceStatus::Completed,
            now,
        );
        self.store.update(&occurrence, current.status, &[entry]).await?;
        info!(task_id = %occurrence.task_id, "Occurrence completed");

        let next = self.advance(&occurrence, user_id).await;
        Ok(TransitionOutcome { occurrence, next })
    }

    /// Mark an occurrence skipped with a reason, then try to generate the
    /// next one.
    #[instrument(skip_all, fields(%occurrence_id))]
    pub async fn skip(
        &self,
        occurrence_id: Uuid,
        user_id: Uuid,
        reason: &str,
    ) -> DomainResult<TransitionOutcome> {
        let reason = reason.trim();
        let current = self.get(occurrence_id).await?;
        ensure_transition(&current, OccurrenceStatus::Skipped)?;
        if reason.is_empty() {
            return Err(DomainError::InvalidStateTransition {
                from: current.status.as_str().to_string(),
                to: OccurrenceStatus::Skipped.as_str().to_string(),
                reason: "a reason is required to skip an occurrence".to_string(),
            });
        }

        let now = self.generator.clock().now();
        let mut occurrence = current.clone();
        occurrence.status = OccurrenceStatus::Skipped;
        occurrence.skipped_at = Some(now);
        occurrence.updated_at = now;

        let entries = [
            HistoryEntry::status_change(
                occurrence.id,
                user_id,
                Some(current.status),
                OccurrenceStatus::Skipped,
                now,
            ),
            HistoryEntry::comment(occurrence.id, user_id, format!("Skipped: {reason}"), now),
        ];
        self.store.update(&occurrence, current.status, &entries).await?;
        info!(task_id = %occurrence.task_id, "Occurrence skipped");

        let next = self.advance(&occurrence, user_id).await;
        Ok(TransitionOutcome { occurrence, next })
    }

    /// Change the due date and/or assignees of an open occurrence.
    ///
    /// History entries are written only for values that actually change;
    /// an update that changes nothing writes nothing.
    #[instrument(skip_all, fields(%occurrence_id))]
    pub async fn update(
        &self,
        occurrence_id: Uuid,
        user_id: Uuid,
        update: OccurrenceUpdate,
    ) -> DomainResult<TaskOccurrence> {
        let current = self.get(occurrence_id).await?;
        if current.is_terminal() {
            return Err(DomainError::InvalidStateTransition {
                from: current.status.as_str().to_string(),
                to: current.status.as_str().to_string(),
                reason: "terminal occurrences cannot be modified".to_string(),
            });
        }

        let now = self.generator.clock().now();
        let mut occurrence = current.clone();
        let mut entries = Vec::new();

        if let Some(due_date) = update.due_date.filter(|d| *d != current.due_date) {
            if let Some(existing) = self.store.find_by_task_and_date(current.task_id, due_date).await? {
                return Err(DomainError::ValidationFailed(format!(
                    "occurrence {} is already due on {due_date}",
                    existing.id
                )));
            }
            entries.push(HistoryEntry::date_change(occurrence.id, user_id, current.due_date, due_date, now));
            occurrence.due_date = due_date;
        }

        if let Some(assignees) = update.assignee_ids.filter(|a| *a != current.assignee_ids) {
            entries.push(HistoryEntry::assignment_change(
                occurrence.id,
                user_id,
                &current.assignee_ids,
                &assignees,
                now,
            ));
            // Assigning a created occurrence moves it to assigned. An
            // assigned occurrence stays assigned, even when cleared.
            if current.status == OccurrenceStatus::Created && !assignees.is_empty() {
                entries.push(HistoryEntry::status_change(
                    occurrence.id,
                    user_id,
                    Some(OccurrenceStatus::Created),
                    OccurrenceStatus::Assigned,
                    now,
                ));
                occurrence.status = OccurrenceStatus::Assigned;
            }
            occurrence.assignee_ids = assignees;
        }

        if entries.is_empty() {
            return Ok(current);
        }

        occurrence.updated_at = now;
        self.store.update(&occurrence, current.status, &entries).await?;
        Ok(occurrence)
    }

    /// Attach a comment to an occurrence in any status.
    pub async fn add_comment(
        &self,
        occurrence_id: Uuid,
        user_id: Uuid,
        text: &str,
    ) -> DomainResult<HistoryEntry> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DomainError::ValidationFailed("comment must not be empty".to_string()));
        }
        self.get(occurrence_id).await?;

        let entry = HistoryEntry::comment(occurrence_id, user_id, text, self.generator.clock().now());
        self.store.append(&entry).await?;
        Ok(entry)
    }

    /// Pause a task and delete its future open occurrences.
    pub async fn pause_task(&self, task_id: Uuid, user_id: Uuid) -> DomainResult<TaskStatusChange> {
        self.retire_task(task_id, user_id, TaskStatus::Paused).await
    }

    /// Soft-delete a task and delete its future open occurrences.
    pub async fn delete_task(&self, task_id: Uuid, user_id: Uuid) -> DomainResult<TaskStatusChange> {
        self.retire_task(task_id, user_id, TaskStatus::SoftDeleted).await
    }

    /// Reactivate a paused task and fill its schedule up to `horizon`.
    ///
    /// A task left with no live occurrence gets a fresh initial one first.
    #[instrument(skip_all, fields(%task_id))]
    pub async fn resume_task(
        &self,
        task_id: Uuid,
        user_id: Uuid,
        horizon: NaiveDate,
    ) -> DomainResult<GenerationReport> {
        let mut task = self.task(task_id).await?;
        if task.status == TaskStatus::SoftDeleted {
            return Err(DomainError::ValidationFailed(format!(
                "task {task_id} is deleted and cannot be resumed"
            )));
        }
        if task.status != TaskStatus::Active {
            self.tasks.set_status(task_id, TaskStatus::Active).await?;
            task.status = TaskStatus::Active;
        }

        let mut initial = None;
        if self.store.count(task_id).await? == 0 {
            initial = self.generator.create_initial(&task, user_id).await?;
        }
        let mut report = self.generator.generate_for_task(&task, horizon, user_id).await?;
        if let Some(occurrence) = initial {
            report.created.insert(0, occurrence);
        }
        info!(created = report.created.len(), "Task resumed");
        Ok(report)
    }

    async fn retire_task(
        &self,
        task_id: Uuid,
        user_id: Uuid,
        status: TaskStatus,
    ) -> DomainResult<TaskStatusChange> {
        let mut task = self.task(task_id).await?;
        self.tasks.set_status(task_id, status).await?;
        task.status = status;

        let clock = self.generator.clock();
        let deleted = self
            .store
            .bulk_delete_future(task_id, clock.today(), user_id, clock.now())
            .await?;
        info!(%task_id, status = status.as_str(), deleted = deleted.len(), "Task retired");
        Ok(TaskStatusChange { task, deleted })
    }

    async fn task(&self, task_id: Uuid) -> DomainResult<TaskDefinition> {
        self.tasks
            .by_id(task_id)
            .await?
            .ok_or(DomainError::TaskNotFound(task_id))
    }

    /// Best-effort follow-up generation. Never fails the caller.
    async fn advance(&self, occurrence: &TaskOccurrence, user_id: Uuid) -> Option<TaskOccurrence> {
        let task = match self.tasks.by_id(occurrence.task_id).await {
            Ok(Some(task)) => task,
            Ok(None) => {
                warn!(task_id = %occurrence.task_id, "Task missing; next occurrence not generated");
                return None;
            }
            Err(e) => {
                warn!(task_id = %occurrence.task_id, error = %e, "Task lookup failed; next occurrence not generated");
                return None;
            }
        };

        match self
            .generator
            .generate_next(&task, NextAnchor::after(occurrence), user_id)
            .await
        {
            Ok(next) => next,
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "Next occurrence generation failed; a later run will retry");
                None
            }
        }
    }
}

fn ensure_transition(current: &TaskOccurrence, to: OccurrenceStatus) -> DomainResult<()> {
    if current.status.can_transition_to(to) {
        return Ok(());
    }
    Err(DomainError::InvalidStateTransition {
        from: current.status.as_str().to_string(),
        to: to.as_str().to_string(),
        reason: format!("occurrence is already {}", current.status.as_str()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;
    use crate::domain::models::{EndCondition, HistoryLogType, IntervalUnit, ScheduleConfig};
    use crate::domain::ports::FixedClock;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct Harness {
        store: Arc<InMemoryStore>,
        clock: Arc<FixedClock>,
        generator: Arc<OccurrenceGenerator<InMemoryStore>>,
        lifecycle: OccurrenceLifecycle<InMemoryStore, InMemoryStore>,
    }

    fn harness(today: NaiveDate) -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(FixedClock::on(today));
        let generator = Arc::new(OccurrenceGenerator::new(store.clone(), clock.clone()));
        let lifecycle = OccurrenceLifecycle::new(store.clone(), store.clone(), generator.clone());
        Harness {
            store,
            clock,
            generator,
            lifecycle,
        }
    }

    async fn weekly_task(h: &Harness) -> (TaskDefinition, TaskOccurrence) {
        let task = TaskDefinition::new(
            "Vacuum",
            ScheduleConfig::FixedInterval {
                interval: 1,
                unit: IntervalUnit::Week,
                end_condition: EndCondition::Never,
            },
            Uuid::new_v4(),
        );
        h.store.create_task(&task).await.unwrap();
        let first = h.generator.create_initial(&task, task.created_by).await.unwrap().unwrap();
        (task, first)
    }

    #[tokio::test]
    async fn test_complete_generates_next_from_due_date() {
        let h = harness(date(2024, 1, 1));
        let (task, first) = weekly_task(&h).await;

        h.clock.set_date(date(2024, 1, 3));
        let outcome = h.lifecycle.complete(first.id, task.created_by).await.unwrap();

        assert_eq!(outcome.occurrence.status, OccurrenceStatus::Completed);
        assert!(outcome.occurrence.completed_at.is_some());
        assert_eq!(outcome.next.unwrap().due_date, date(2024, 1, 8));

        let history = h.lifecycle.history(first.id).await.unwrap();
        let last = history.last().unwrap();
        assert_eq!(last.log_type, HistoryLogType::StatusChange);
        assert_eq!(last.old_value.as_deref(), Some("created"));
        assert_eq!(last.new_value.as_deref(), Some("completed"));
    }

    #[tokio::test]
    async fn test_complete_twice_is_rejected() {
        let h = harness(date(2024, 1, 1));
        let (task, first) = weekly_task(&h).await;

        h.lifecycle.complete(first.id, task.created_by).await.unwrap();
        let err = h.lifecycle.complete(first.id, task.created_by).await.unwrap_err();
        assert!(err.is_invalid_transition());
    }

    #[tokio::test]
    async fn test_skip_requires_reason_and_logs_comment() {
        let h = harness(date(2024, 1, 1));
        let (task, first) = weekly_task(&h).await;

        let err = h.lifecycle.skip(first.id, task.created_by, "   ").await.unwrap_err();
        assert!(err.is_invalid_transition());
        assert_eq!(h.lifecycle.get(first.id).await.unwrap().status, OccurrenceStatus::Created);

        let outcome = h.lifecycle.skip(first.id, task.created_by, "on holiday").await.unwrap();
        assert_eq!(outcome.occurrence.status, OccurrenceStatus::Skipped);
        assert!(outcome.occurrence.skipped_at.is_some());

        let history = h.lifecycle.history(first.id).await.unwrap();
        let comments: Vec<_> = history
            .iter()
            .filter(|e| e.log_type == HistoryLogType::Comment)
            .filter_map(|e| e.comment.clone())
            .collect();
        assert_eq!(comments, vec!["Skipped: on holiday".to_string()]);
    }

    #[tokio::test]
    async fn test_update_terminal_is_rejected() {
        let h = harness(date(2024, 1, 1));
        let (task, first) = weekly_task(&h).await;
        h.lifecycle.complete(first.id, task.created_by).await.unwrap();

        let update = OccurrenceUpdate {
            due_date: Some(date(2024, 1, 5)),
            assignee_ids: None,
        };
        let err = h.lifecycle.update(first.id, task.created_by, update).await.unwrap_err();
        assert!(err.is_invalid_transition());
    }

    #[tokio::test]
    async fn test_update_writes_history_only_for_changes() {
        let h = harness(date(2024, 1, 1));
        let (task, first) = weekly_task(&h).await;
        let before = h.lifecycle.history(first.id).await.unwrap().len();

        let noop = OccurrenceUpdate {
            due_date: Some(first.due_date),
            assignee_ids: Some(Vec::new()),
        };
        h.lifecycle.update(first.id, task.created_by, noop).await.unwrap();
        assert_eq!(h.lifecycle.history(first.id).await.unwrap().len(), before);

        let assignee = Uuid::new_v4();
        let change = OccurrenceUpdate {
            due_date: Some(date(2024, 1, 2)),
            assignee_ids: Some(vec![assignee]),
        };
        let updated = h.lifecycle.update(first.id, task.created_by, change).await.unwrap();
        assert_eq!(updated.status, OccurrenceStatus::Assigned);
        assert_eq!(updated.due_date, date(2024, 1, 2));

        let history = h.lifecycle.history(first.id).await.unwrap();
        let kinds: Vec<_> = history[before..].iter().map(|e| e.log_type).collect();
        assert_eq!(
            kinds,
            vec![
                HistoryLogType::DateChange,
                HistoryLogType::AssignmentChange,
                HistoryLogType::StatusChange,
            ]
        );
        assert_eq!(history[before].old_value.as_deref(), Some("2024-01-01"));
        assert_eq!(history[before].new_value.as_deref(), Some("2024-01-02"));
        assert_eq!(history[before + 2].old_value.as_deref(), Some("created"));
        assert_eq!(history[before + 2].new_value.as_deref(), Some("assigned"));
    }

    #[tokio::test]
    async fn test_clearing_assignees_keeps_assigned_status() {
        let h = harness(date(2024, 1, 1));
        let (task, first) = weekly_task(&h).await;
        let alice = Uuid::new_v4();
        let assign = OccurrenceUpdate {
            due_date: None,
            assignee_ids: Some(vec![alice]),
        };
        h.lifecycle.update(first.id, task.created_by, assign).await.unwrap();
        let before = h.lifecycle.history(first.id).await.unwrap().len();

        let clear = OccurrenceUpdate {
            due_date: None,
            assignee_ids: Some(Vec::new()),
        };
        let updated = h.lifecycle.update(first.id, task.created_by, clear).await.unwrap();
        assert_eq!(updated.status, OccurrenceStatus::Assigned);
        assert!(updated.assignee_ids.is_empty());

        let history = h.lifecycle.history(first.id).await.unwrap();
        let kinds: Vec<_> = history[before..].iter().map(|e| e.log_type).collect();
        assert_eq!(kinds, vec![HistoryLogType::AssignmentChange]);

        let outcome = h.lifecycle.complete(first.id, alice).await.unwrap();
        assert_eq!(outcome.occurrence.status, OccurrenceStatus::Completed);
        let last = h.lifecycle.history(first.id).await.unwrap().pop().unwrap();
        assert_eq!(last.old_value.as_deref(), Some("assigned"));
    }

    #[tokio::test]
    async fn test_complete_succeeds_when_generation_fails() {
        struct FailingTasks;

        #[async_trait::async_trait]
        impl crate::domain::ports::TaskLookup for FailingTasks {
            async fn active_tasks(&self) -> DomainResult<Vec<crate::domain::models::TaskEntry>> {
                Err(DomainError::DatabaseError("down".to_string()))
            }
            async fn by_id(&self, _id: Uuid) -> DomainResult<Option<TaskDefinition>> {
                Err(DomainError::DatabaseError("down".to_string()))
            }
        }

        #[async_trait::async_trait]
        impl TaskRepository for FailingTasks {
            async fn create_task(&self, _task: &TaskDefinition) -> DomainResult<()> {
                Ok(())
            }
            async fn list_tasks(&self, _status: Option<TaskStatus>) -> DomainResult<Vec<TaskDefinition>> {
                Ok(Vec::new())
            }
            async fn set_status(&self, _id: Uuid, _status: TaskStatus) -> DomainResult<()> {
                Ok(())
            }
        }

        let h = harness(date(2024, 1, 1));
        let (task, first) = weekly_task(&h).await;
        let lifecycle = OccurrenceLifecycle::new(h.store.clone(), Arc::new(FailingTasks), h.generator.clone());

        let outcome = lifecycle.complete(first.id, task.created_by).await.unwrap();
        assert_eq!(outcome.occurrence.status, OccurrenceStatus::Completed);
        assert!(outcome.next.is_none());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_occurrence_untouched() {
        let h = harness(date(2024, 1, 1));
        let (task, first) = weekly_task(&h).await;
        let before = h.store.all_history().await.len();

        h.store.set_fail_writes(true);
        assert!(h.lifecycle.complete(first.id, task.created_by).await.is_err());
        h.store.set_fail_writes(false);

        assert_eq!(h.lifecycle.get(first.id).await.unwrap().status, OccurrenceStatus::Created);
        assert_eq!(h.store.all_history().await.len(), before);
    }

    #[tokio::test]
    async fn test_pause_deletes_only_future_open_occurrences() {
        let h = harness(date(2024, 1, 1));
        let (task, first) = weekly_task(&h).await;
        h.generator
            .generate_for_task(&task, date(2024, 1, 31), task.created_by)
            .await
            .unwrap();

        h.clock.set_date(date(2024, 1, 10));
        let change = h.lifecycle.pause_task(task.id, task.created_by).await.unwrap();
        assert_eq!(change.task.status, TaskStatus::Paused);
        assert_eq!(change.deleted.len(), 3);
        assert_eq!(h.lifecycle.get(first.id).await.unwrap().status, OccurrenceStatus::Created);

        let report = h.lifecycle.resume_task(task.id, task.created_by, date(2024, 1, 31)).await.unwrap();
        let dates: Vec<_> = report.created.iter().map(|o| o.due_date).collect();
        assert_eq!(dates, vec![date(2024, 1, 15), date(2024, 1, 22), date(2024, 1, 29)]);
    }

    #[tokio::test]
    async fn test_add_comment() {
        let h = harness(date(2024, 1, 1));
        let (task, first) = weekly_task(&h).await;

        assert!(h.lifecycle.add_comment(first.id, task.created_by, "").await.is_err());
        let entry = h.lifecycle.add_comment(first.id, task.created_by, "Used the new bags").await.unwrap();
        assert_eq!(entry.log_type, HistoryLogType::Comment);

        let missing = h.lifecycle.add_comment(Uuid::new_v4(), task.created_by, "hi").await.unwrap_err();
        assert!(missing.is_not_found());
    }
}
