//! Short ID prefix resolution for CLI commands.
//!
//! Allows users to specify any unique prefix of a UUID instead of the full ID,
//! similar to git short hashes.

use anyhow::{bail, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

const TASK_QUERY: &str = "SELECT id FROM tasks WHERE id LIKE ? LIMIT 11";
const OCCURRENCE_QUERY: &str = "SELECT id FROM task_occurrences WHERE id LIKE ? LIMIT 11";

/// Resolve a task ID prefix to a full UUID.
pub async fn resolve_task_id(pool: &SqlitePool, prefix: &str) -> Result<Uuid> {
    resolve_prefix(pool, prefix, "task", TASK_QUERY).await
}

/// Resolve an occurrence ID prefix to a full UUID.
pub async fn resolve_occurrence_id(pool: &SqlitePool, prefix: &str) -> Result<Uuid> {
    resolve_prefix(pool, prefix, "occurrence", OCCURRENCE_QUERY).await
}

fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() {
        bail!("ID prefix must not be empty");
    }
    if !prefix.chars().all(|c| c.is_ascii_hexdigit() || c == '-') {
        bail!(
            "Invalid ID prefix '{}': must contain only hex characters and dashes",
            prefix
        );
    }
    Ok(())
}

async fn resolve_prefix(pool: &SqlitePool, prefix: &str, entity: &str, query: &str) -> Result<Uuid> {
    if let Ok(uuid) = Uuid::parse_str(prefix) {
        return Ok(uuid);
    }

    validate_prefix(prefix)?;

    let pattern = format!("{}%", prefix.to_lowercase());
    let rows: Vec<(String,)> = sqlx::query_as(query).bind(&pattern).fetch_all(pool).await?;

    match rows.len() {
        0 => bail!("No {} found matching prefix '{}'", entity, prefix),
        1 => Ok(Uuid::parse_str(&rows[0].0)?),
        n => {
            let candidates: Vec<&str> = rows.iter().take(10).map(|(id,)| id.as_str()).collect();
            let more = if n > 10 { "\n  ..." } else { "" };
            bail!(
                "Ambiguous {} prefix '{}' matches multiple IDs:\n  {}{}",
                entity,
                prefix,
                candidates.join("\n  "),
                more
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;

    async fn insert_task(pool: &SqlitePool, id: &str) {
        sqlx::query(
            "INSERT INTO tasks (id, name, schedule, default_assignee_ids, status, created_by, created_at, updated_at)
             VALUES (?, 'Chore', '{\"type\":\"fixed_interval\",\"interval\":1,\"unit\":\"day\"}', '[]', 'active', ?, '2024-01-01T00:00:00.000000Z', '2024-01-01T00:00:00.000000Z')",
        )
        .bind(id)
        .bind(Uuid::nil().to_string())
        .execute(pool)
        .await
        .unwrap();
    }

    #[test]
    fn test_validate_prefix() {
        assert!(validate_prefix("abc-12").is_ok());
        assert!(validate_prefix("").is_err());
        assert!(validate_prefix("xyz").is_err());
    }

    #[tokio::test]
    async fn test_resolves_unique_prefix() {
        let pool = create_migrated_test_pool().await.unwrap();
        insert_task(&pool, "aaaa1111-0000-0000-0000-000000000000").await;
        insert_task(&pool, "bbbb2222-0000-0000-0000-000000000000").await;

        let id = resolve_task_id(&pool, "aaaa").await.unwrap();
        assert_eq!(id.to_string(), "aaaa1111-0000-0000-0000-000000000000");
        assert!(resolve_task_id(&pool, "cccc").await.is_err());
    }

    #[tokio::test]
    async fn test_ambiguous_prefix() {
        let pool = create_migrated_test_pool().await.unwrap();
        insert_task(&pool, "abab1111-0000-0000-0000-000000000000").await;
        insert_task(&pool, "abab2222-0000-0000-0000-000000000000").await;

        let err = resolve_task_id(&pool, "abab").await.unwrap_err();
        assert!(err.to_string().contains("Ambiguous"));
    }
}
