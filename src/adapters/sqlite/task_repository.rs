//! SQLite implementation of the task ports.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

use crate::adapters::sqlite::{format_timestamp, parse_datetime, parse_uuid, parse_uuid_list};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ScheduleConfig, TaskDefinition, TaskEntry, TaskStatus, UnreadableTask};
use crate::domain::ports::{TaskLookup, TaskRepository};

#[derive(Clone)]
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    name: String,
    description: Option<String>,
    schedule: String,
    default_assignee_ids: String,
    status: String,
    created_by: String,
    created_at: String,
    updated_at: String,
}

fn row_to_task(row: TaskRow) -> DomainResult<TaskDefinition> {
    let schedule: ScheduleConfig = serde_json::from_str(&row.schedule)
        .map_err(|e| DomainError::SerializationError(format!("schedule: {}", e)))?;
    let status = TaskStatus::from_str(&row.status)
        .ok_or_else(|| DomainError::SerializationError(format!("Invalid task status: {}", row.status)))?;

    Ok(TaskDefinition {
        id: parse_uuid(&row.id)?,
        name: row.name,
        description: row.description,
        schedule,
        default_assignee_ids: parse_uuid_list(&row.default_assignee_ids)?,
        status,
        created_by: parse_uuid(&row.created_by)?,
        created_at: parse_datetime(&row.created_at)?,
        updated_at: parse_datetime(&row.updated_at)?,
    })
}

#[async_trait]
impl TaskLookup for SqliteTaskRepository {
    async fn active_tasks(&self) -> DomainResult<Vec<TaskEntry>> {
        let rows: Vec<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE status = ? ORDER BY created_at, id")
            .bind(TaskStatus::Active.as_str())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let id = Uuid::parse_str(&row.id).unwrap_or_default();
                let name = row.name.clone();
                row_to_task(row).map_err(|e| {
                    warn!(task_id = %id, error = %e, "Task definition is unreadable");
                    UnreadableTask {
                        id,
                        name,
                        error: e.to_string(),
                    }
                })
            })
            .collect())
    }

    async fn by_id(&self, id: Uuid) -> DomainResult<Option<TaskDefinition>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_task).transpose()
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn create_task(&self, task: &TaskDefinition) -> DomainResult<()> {
        let schedule_json = serde_json::to_string(&task.schedule)?;
        let assignees_json = serde_json::to_string(&task.default_assignee_ids)?;

        sqlx::query(
            r#"INSERT INTO tasks (id, name, description, schedule, default_assignee_ids,
               status, created_by, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(task.id.to_string())
        .bind(&task.name)
        .bind(&task.description)
        .bind(&schedule_json)
        .bind(&assignees_json)
        .bind(task.status.as_str())
        .bind(task.created_by.to_string())
        .bind(format_timestamp(task.created_at))
        .bind(format_timestamp(task.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_tasks(&self, status: Option<TaskStatus>) -> DomainResult<Vec<TaskDefinition>> {
        let rows: Vec<TaskRow> = match status {
            Some(status) => {
                sqlx::query_as("SELECT * FROM tasks WHERE status = ? ORDER BY created_at, id")
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM tasks ORDER BY created_at, id")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.into_iter().map(row_to_task).collect()
    }

    async fn set_status(&self, id: Uuid, status: TaskStatus) -> DomainResult<()> {
        let result = sqlx::query("UPDATE tasks SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(format_timestamp(Utc::now()))
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::TaskNotFound(id));
        }
        Ok(())
    }
}
