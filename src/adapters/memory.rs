//! In-memory adapters for testing.
//!
//! `InMemoryStore` implements every persistence port behind one lock, so
//! each write is trivially atomic. Writes can be made to fail on demand to
//! exercise error paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    CreateOutcome, HistoryEntry, OccurrenceFilter, OccurrenceStatus, TaskDefinition, TaskEntry, TaskOccurrence,
    TaskStatus,
};
use crate::domain::ports::occurrence_store::is_live;
use crate::domain::ports::{HistoryLog, OccurrenceStore, TaskLookup, TaskRepository};

#[derive(Default)]
struct State {
    tasks: HashMap<Uuid, TaskDefinition>,
    occurrences: HashMap<Uuid, TaskOccurrence>,
    history: Vec<HistoryEntry>,
}

/// In-memory task, occurrence, and history storage.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent occurrence write fail with a database error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> DomainResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DomainError::DatabaseError("simulated write failure".to_string()));
        }
        Ok(())
    }

    /// Every history entry across all occurrences, in append order.
    pub async fn all_history(&self) -> Vec<HistoryEntry> {
        self.state.read().await.history.clone()
    }
}

#[async_trait]
impl TaskLookup for InMemoryStore {
    async fn active_tasks(&self) -> DomainResult<Vec<TaskEntry>> {
        let tasks = self.list_tasks(Some(TaskStatus::Active)).await?;
        Ok(tasks.into_iter().map(Ok).collect())
    }

    async fn by_id(&self, id: Uuid) -> DomainResult<Option<TaskDefinition>> {
        Ok(self.state.read().await.tasks.get(&id).cloned())
    }
}

#[async_trait]
impl TaskRepository for InMemoryStore {
    async fn create_task(&self, task: &TaskDefinition) -> DomainResult<()> {
        self.state.write().await.tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn list_tasks(&self, status: Option<TaskStatus>) -> DomainResult<Vec<TaskDefinition>> {
        let state = self.state.read().await;
        let mut tasks: Vec<TaskDefinition> = state
            .tasks
            .values()
            .filter(|t| status.is_none_or(|s| t.status == s))
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.created_at);
        Ok(tasks)
    }

    async fn set_status(&self, id: Uuid, status: TaskStatus) -> DomainResult<()> {
        let mut state = self.state.write().await;
        let task = state.tasks.get_mut(&id).ok_or(DomainError::TaskNotFound(id))?;
        task.status = status;
        task.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl OccurrenceStore for InMemoryStore {
    async fn get(&self, id: Uuid) -> DomainResult<Option<TaskOccurrence>> {
        Ok(self.state.read().await.occurrences.get(&id).cloned())
    }

    async fn find_by_task_and_date(
        &self,
        task_id: Uuid,
        due_date: NaiveDate,
    ) -> DomainResult<Option<TaskOccurrence>> {
        let state = self.state.read().await;
        Ok(state
            .occurrences
            .values()
            .find(|o| o.task_id == task_id && o.due_date == due_date && is_live(o.status))
            .cloned())
    }

    async fn count(&self, task_id: Uuid) -> DomainResult<u64> {
        let state = self.state.read().await;
        Ok(state
            .occurrences
            .values()
            .filter(|o| o.task_id == task_id && is_live(o.status))
            .count() as u64)
    }

    async fn has_any(&self, task_id: Uuid) -> DomainResult<bool> {
        let state = self.state.read().await;
        Ok(state.occurrences.values().any(|o| o.task_id == task_id))
    }

    async fn most_recent_terminal(&self, task_id: Uuid) -> DomainResult<Option<NaiveDate>> {
        let state = self.state.read().await;
        Ok(state
            .occurrences
            .values()
            .filter(|o| o.task_id == task_id)
            .filter_map(TaskOccurrence::terminal_at)
            .max()
            .map(|at| at.date_naive()))
    }

    async fn latest_due_date(&self, task_id: Uuid) -> DomainResult<Option<NaiveDate>> {
        let state = self.state.read().await;
        Ok(state
            .occurrences
            .values()
            .filter(|o| o.task_id == task_id && is_live(o.status))
            .map(|o| o.due_date)
            .max())
    }

    async fn list(&self, filter: OccurrenceFilter) -> DomainResult<Vec<TaskOccurrence>> {
        let state = self.state.read().await;
        let mut occurrences: Vec<TaskOccurrence> = state
            .occurrences
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();
        occurrences.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.created_at.cmp(&b.created_at)));
        Ok(occurrences)
    }

    async fn create(
        &self,
        occurrence: &TaskOccurrence,
        history: &[HistoryEntry],
    ) -> DomainResult<CreateOutcome> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        let duplicate = state.occurrences.values().any(|o| {
            o.task_id == occurrence.task_id && o.due_date == occurrence.due_date && is_live(o.status)
        });
        if duplicate {
            return Ok(CreateOutcome::Duplicate);
        }
        state.occurrences.insert(occurrence.id, occurrence.clone());
        state.history.extend(history.iter().cloned());
        Ok(CreateOutcome::Created(occurrence.clone()))
    }

    async fn update(
        &self,
        occurrence: &TaskOccurrence,
        expected_status: OccurrenceStatus,
        history: &[HistoryEntry],
    ) -> DomainResult<()> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        let current = state
            .occurrences
            .get(&occurrence.id)
            .ok_or(DomainError::OccurrenceNotFound(occurrence.id))?;
        if current.status != expected_status {
            return Err(DomainError::ConcurrencyConflict {
                entity: "occurrence".to_string(),
                id: occurrence.id.to_string(),
            });
        }
        state.occurrences.insert(occurrence.id, occurrence.clone());
        state.history.extend(history.iter().cloned());
        Ok(())
    }

    async fn bulk_delete_future(
        &self,
        task_id: Uuid,
        after: NaiveDate,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<Uuid>> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        let mut deleted = Vec::new();
        let mut entries = Vec::new();
        for occurrence in state.occurrences.values_mut() {
            if occurrence.task_id == task_id && occurrence.due_date > after && !occurrence.is_terminal() {
                entries.push(HistoryEntry::status_change(
                    occurrence.id,
                    user_id,
                    Some(occurrence.status),
                    OccurrenceStatus::Deleted,
                    now,
                ));
                occurrence.status = OccurrenceStatus::Deleted;
                occurrence.updated_at = now;
                deleted.push(occurrence.id);
            }
        }
        state.history.extend(entries);
        Ok(deleted)
    }
}

#[async_trait]
impl HistoryLog for InMemoryStore {
    async fn append(&self, entry: &HistoryEntry) -> DomainResult<()> {
        self.check_writable()?;
        self.state.write().await.history.push(entry.clone());
        Ok(())
    }

    async fn for_occurrence(&self, occurrence_id: Uuid) -> DomainResult<Vec<HistoryEntry>> {
        let state = self.state.read().await;
        let mut entries: Vec<HistoryEntry> = state
            .history
            .iter()
            .filter(|e| e.occurrence_id == occurrence_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }
}
