//! SQLite implementation of `OccurrenceStore` and `HistoryLog`.
//!
//! Every write runs in one transaction together with its history rows.
//! Creates rely on the partial unique index over live
//! `(task_id, due_date)` pairs: `INSERT OR IGNORE` affecting no rows means
//! a concurrent or earlier generation already produced that occurrence.
//! Updates are compare-and-swap on the prior status.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::adapters::sqlite::{
    format_date, format_timestamp, parse_date, parse_datetime, parse_optional_datetime, parse_uuid,
    parse_uuid_list,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    CreateOutcome, HistoryEntry, HistoryLogType, OccurrenceFilter, OccurrenceStatus, TaskOccurrence,
};
use crate::domain::ports::{HistoryLog, OccurrenceStore};

#[derive(Clone)]
pub struct SqliteOccurrenceRepository {
    pool: SqlitePool,
}

impl SqliteOccurrenceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn insert_history(tx: &mut Transaction<'_, Sqlite>, entries: &[HistoryEntry]) -> DomainResult<()> {
        for entry in entries {
            sqlx::query(
                r#"INSERT INTO occurrence_history
                   (id, occurrence_id, user_id, log_type, old_value, new_value, comment, created_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(entry.id.to_string())
            .bind(entry.occurrence_id.to_string())
            .bind(entry.user_id.to_string())
            .bind(entry.log_type.as_str())
            .bind(&entry.old_value)
            .bind(&entry.new_value)
            .bind(&entry.comment)
            .bind(format_timestamp(entry.created_at))
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct OccurrenceRow {
    id: String,
    task_id: String,
    due_date: String,
    status: String,
    assignee_ids: String,
    completed_at: Option<String>,
    skipped_at: Option<String>,
    created_at: String,
    updated_at: String,
}

fn row_to_occurrence(row: OccurrenceRow) -> DomainResult<TaskOccurrence> {
    let status = OccurrenceStatus::from_str(&row.status)
        .ok_or_else(|| DomainError::SerializationError(format!("Invalid occurrence status: {}", row.status)))?;

    Ok(TaskOccurrence {
        id: parse_uuid(&row.id)?,
        task_id: parse_uuid(&row.task_id)?,
        due_date: parse_date(&row.due_date)?,
        status,
        assignee_ids: parse_uuid_list(&row.assignee_ids)?,
        completed_at: parse_optional_datetime(row.completed_at)?,
        skipped_at: parse_optional_datetime(row.skipped_at)?,
        created_at: parse_datetime(&row.created_at)?,
        updated_at: parse_datetime(&row.updated_at)?,
    })
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    id: String,
    occurrence_id: String,
    user_id: String,
    log_type: String,
    old_value: Option<String>,
    new_value: Option<String>,
    comment: Option<String>,
    created_at: String,
}

fn row_to_history(row: HistoryRow) -> DomainResult<HistoryEntry> {
    let log_type = HistoryLogType::from_str(&row.log_type)
        .ok_or_else(|| DomainError::SerializationError(format!("Invalid history log type: {}", row.log_type)))?;

    Ok(HistoryEntry {
        id: parse_uuid(&row.id)?,
        occurrence_id: parse_uuid(&row.occurrence_id)?,
        user_id: parse_uuid(&row.user_id)?,
        log_type,
        old_value: row.old_value,
        new_value: row.new_value,
        comment: row.comment,
        created_at: parse_datetime(&row.created_at)?,
    })
}

#[async_trait]
impl OccurrenceStore for SqliteOccurrenceRepository {
    async fn get(&self, id: Uuid) -> DomainResult<Option<TaskOccurrence>> {
        let row: Option<OccurrenceRow> = sqlx::query_as("SELECT * FROM task_occurrences WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_occurrence).transpose()
    }

    async fn find_by_task_and_date(
        &self,
        task_id: Uuid,
        due_date: NaiveDate,
    ) -> DomainResult<Option<TaskOccurrence>> {
        let row: Option<OccurrenceRow> = sqlx::query_as(
            "SELECT * FROM task_occurrences WHERE task_id = ? AND due_date = ? AND status != 'deleted'",
        )
        .bind(task_id.to_string())
        .bind(format_date(due_date))
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_occurrence).transpose()
    }

    async fn count(&self, task_id: Uuid) -> DomainResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM task_occurrences WHERE task_id = ? AND status != 'deleted'",
        )
        .bind(task_id.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(count.max(0) as u64)
    }

    async fn has_any(&self, task_id: Uuid) -> DomainResult<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM task_occurrences WHERE task_id = ? LIMIT 1")
            .bind(task_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    async fn most_recent_terminal(&self, task_id: Uuid) -> DomainResult<Option<NaiveDate>> {
        let latest: Option<String> = sqlx::query_scalar(
            "SELECT MAX(COALESCE(completed_at, skipped_at)) FROM task_occurrences WHERE task_id = ?",
        )
        .bind(task_id.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(parse_optional_datetime(latest)?.map(|at| at.date_naive()))
    }

    async fn latest_due_date(&self, task_id: Uuid) -> DomainResult<Option<NaiveDate>> {
        let latest: Option<String> = sqlx::query_scalar(
            "SELECT MAX(due_date) FROM task_occurrences WHERE task_id = ? AND status != 'deleted'",
        )
        .bind(task_id.to_string())
        .fetch_one(&self.pool)
        .await?;
        latest.as_deref().map(parse_date).transpose()
    }

    async fn list(&self, filter: OccurrenceFilter) -> DomainResult<Vec<TaskOccurrence>> {
        let mut query = String::from("SELECT * FROM task_occurrences WHERE 1=1");
        let mut bindings: Vec<String> = Vec::new();

        if let Some(task_id) = filter.task_id {
            query.push_str(" AND task_id = ?");
            bindings.push(task_id.to_string());
        }
        if let Some(status) = filter.status {
            query.push_str(" AND status = ?");
            bindings.push(status.as_str().to_string());
        }
        if let Some(assignee_id) = filter.assignee_id {
            query.push_str(" AND EXISTS (SELECT 1 FROM json_each(assignee_ids) WHERE json_each.value = ?)");
            bindings.push(assignee_id.to_string());
        }
        if let Some(from) = filter.due_from {
            query.push_str(" AND due_date >= ?");
            bindings.push(format_date(from));
        }
        if let Some(to) = filter.due_to {
            query.push_str(" AND due_date <= ?");
            bindings.push(format_date(to));
        }

        query.push_str(" ORDER BY due_date ASC, created_at ASC");

        let mut q = sqlx::query_as::<_, OccurrenceRow>(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(row_to_occurrence).collect()
    }

    async fn create(
        &self,
        occurrence: &TaskOccurrence,
        history: &[HistoryEntry],
    ) -> DomainResult<CreateOutcome> {
        let assignees_json = serde_json::to_string(&occurrence.assignee_ids)?;
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"INSERT OR IGNORE INTO task_occurrences
               (id, task_id, due_date, status, assignee_ids, completed_at, skipped_at, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(occurrence.id.to_string())
        .bind(occurrence.task_id.to_string())
        .bind(format_date(occurrence.due_date))
        .bind(occurrence.status.as_str())
        .bind(&assignees_json)
        .bind(occurrence.completed_at.map(format_timestamp))
        .bind(occurrence.skipped_at.map(format_timestamp))
        .bind(format_timestamp(occurrence.created_at))
        .bind(format_timestamp(occurrence.updated_at))
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(CreateOutcome::Duplicate);
        }

        Self::insert_history(&mut tx, history).await?;
        tx.commit().await?;
        Ok(CreateOutcome::Created(occurrence.clone()))
    }

    async fn update(
        &self,
        occurrence: &TaskOccurrence,
        expected_status: OccurrenceStatus,
        history: &[HistoryEntry],
    ) -> DomainResult<()> {
        let assignees_json = serde_json::to_string(&occurrence.assignee_ids)?;
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"UPDATE task_occurrences
               SET due_date = ?, status = ?, assignee_ids = ?, completed_at = ?, skipped_at = ?, updated_at = ?
               WHERE id = ? AND status = ?"#,
        )
        .bind(format_date(occurrence.due_date))
        .bind(occurrence.status.as_str())
        .bind(&assignees_json)
        .bind(occurrence.completed_at.map(format_timestamp))
        .bind(occurrence.skipped_at.map(format_timestamp))
        .bind(format_timestamp(occurrence.updated_at))
        .bind(occurrence.id.to_string())
        .bind(expected_status.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let exists: Option<String> = sqlx::query_scalar("SELECT id FROM task_occurrences WHERE id = ?")
                .bind(occurrence.id.to_string())
                .fetch_optional(&mut *tx)
                .await?;
            tx.rollback().await?;
            return Err(match exists {
                Some(_) => DomainError::ConcurrencyConflict {
                    entity: "occurrence".to_string(),
                    id: occurrence.id.to_string(),
                },
                None => DomainError::OccurrenceNotFound(occurrence.id),
            });
        }

        Self::insert_history(&mut tx, history).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn bulk_delete_future(
        &self,
        task_id: Uuid,
        after: NaiveDate,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<Uuid>> {
        let mut tx = self.pool.begin().await?;

        // One write per prior status so the transaction takes the write
        // lock on its first statement and still knows where each row came from.
        let mut deleted = Vec::new();
        let mut entries = Vec::new();
        for from in [OccurrenceStatus::Created, OccurrenceStatus::Assigned] {
            let ids: Vec<String> = sqlx::query_scalar(
                r#"UPDATE task_occurrences SET status = 'deleted', updated_at = ?
                   WHERE task_id = ? AND due_date > ? AND status = ?
                   RETURNING id"#,
            )
            .bind(format_timestamp(now))
            .bind(task_id.to_string())
            .bind(format_date(after))
            .bind(from.as_str())
            .fetch_all(&mut *tx)
            .await?;

            for id in ids {
                let id = parse_uuid(&id)?;
                entries.push(HistoryEntry::status_change(id, user_id, Some(from), OccurrenceStatus::Deleted, now));
                deleted.push(id);
            }
        }

        Self::insert_history(&mut tx, &entries).await?;
        tx.commit().await?;
        Ok(deleted)
    }
}

#[async_trait]
impl HistoryLog for SqliteOccurrenceRepository {
    async fn append(&self, entry: &HistoryEntry) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::insert_history(&mut tx, std::slice::from_ref(entry)).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn for_occurrence(&self, occurrence_id: Uuid) -> DomainResult<Vec<HistoryEntry>> {
        let rows: Vec<HistoryRow> = sqlx::query_as(
            "SELECT * FROM occurrence_history WHERE occurrence_id = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(occurrence_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_history).collect()
    }
}
