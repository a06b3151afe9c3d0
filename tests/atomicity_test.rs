//! A failed history write must roll back the state change it accompanies.

mod helpers;

use chorecast::domain::models::{HistoryLogType, OccurrenceStatus};
use chorecast::domain::ports::{HistoryLog, OccurrenceStore};
use chorecast::services::OccurrenceUpdate;

use helpers::fixtures::{date, weekly, Harness};

async fn break_history_writes(h: &Harness) {
    sqlx::query(
        "CREATE TRIGGER fail_history BEFORE INSERT ON occurrence_history
         BEGIN SELECT RAISE(ABORT, 'history write failed'); END",
    )
    .execute(&h.pool)
    .await
    .unwrap();
}

#[tokio::test]
async fn test_failed_history_write_rolls_back_completion() {
    let h = Harness::new(date(2024, 1, 1)).await;
    let (task, first) = h.add_task("Dust shelves", weekly()).await;
    let first = first.unwrap();
    let history_before = h.store.for_occurrence(first.id).await.unwrap();

    break_history_writes(&h).await;
    let err = h.lifecycle.complete(first.id, h.user).await.unwrap_err();
    assert!(matches!(err, chorecast::DomainError::DatabaseError(_)));

    let stored = h.store.get(first.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OccurrenceStatus::Created);
    assert!(stored.completed_at.is_none());
    assert_eq!(h.store.for_occurrence(first.id).await.unwrap(), history_before);
    assert_eq!(h.store.count(task.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_failed_history_write_rolls_back_creation() {
    let h = Harness::new(date(2024, 1, 1)).await;
    let (task, _) = h.add_task("Sweep porch", weekly()).await;

    break_history_writes(&h).await;
    let report = h.runner.run_all().await.unwrap();
    assert_eq!(report.tasks_failed, 1);
    assert_eq!(report.failures[0].task_id, task.id);

    assert_eq!(h.store.count(task.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_failed_history_write_rolls_back_update_and_pause() {
    let h = Harness::new(date(2024, 1, 1)).await;
    let (task, first) = h.add_task("Iron shirts", weekly()).await;
    let first = first.unwrap();
    h.runner.run_all().await.unwrap();
    let live_before = h.store.count(task.id).await.unwrap();

    break_history_writes(&h).await;

    let update = OccurrenceUpdate {
        due_date: Some(date(2024, 1, 3)),
        assignee_ids: Some(vec![h.user]),
    };
    assert!(h.lifecycle.update(first.id, h.user, update).await.is_err());
    let stored = h.store.get(first.id).await.unwrap().unwrap();
    assert_eq!(stored.due_date, date(2024, 1, 1));
    assert!(stored.assignee_ids.is_empty());

    assert!(h.lifecycle.add_comment(first.id, h.user, "note").await.is_err());
    let comments = h
        .store
        .for_occurrence(first.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.log_type == HistoryLogType::Comment && e.comment.as_deref() == Some("note"))
        .count();
    assert_eq!(comments, 0);

    assert!(h.lifecycle.pause_task(task.id, h.user).await.is_err());
    assert_eq!(h.store.count(task.id).await.unwrap(), live_before);
}
