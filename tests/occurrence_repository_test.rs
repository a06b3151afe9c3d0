mod helpers;

use chrono::Utc;
use uuid::Uuid;

use chorecast::adapters::sqlite::{SqliteOccurrenceRepository, SqliteTaskRepository};
use chorecast::domain::models::{
    CreateOutcome, HistoryEntry, HistoryLogType, OccurrenceFilter, OccurrenceStatus, TaskDefinition,
    TaskOccurrence, TaskStatus,
};
use chorecast::domain::ports::{HistoryLog, OccurrenceStore, TaskLookup, TaskRepository};

use helpers::database::{setup_test_db, teardown_test_db};
use helpers::fixtures::{date, weekly};

async fn seeded_task(pool: &sqlx::SqlitePool) -> TaskDefinition {
    let repo = SqliteTaskRepository::new(pool.clone());
    let task = TaskDefinition::new("Vacuum", weekly(), Uuid::new_v4()).with_description("Living room");
    repo.create_task(&task).await.expect("failed to insert task");
    task
}

fn created_entry(occ: &TaskOccurrence) -> HistoryEntry {
    HistoryEntry::status_change(occ.id, Uuid::nil(), None, occ.status, occ.created_at)
}

#[tokio::test]
async fn test_task_round_trip_and_status() {
    let pool = setup_test_db().await;
    let repo = SqliteTaskRepository::new(pool.clone());
    let task = seeded_task(&pool).await;

    let loaded = repo.by_id(task.id).await.unwrap().expect("task should exist");
    assert_eq!(loaded.name, "Vacuum");
    assert_eq!(loaded.description.as_deref(), Some("Living room"));
    assert_eq!(loaded.schedule, task.schedule);

    repo.set_status(task.id, TaskStatus::Paused).await.unwrap();
    assert!(repo.active_tasks().await.unwrap().is_empty());
    assert_eq!(repo.list_tasks(Some(TaskStatus::Paused)).await.unwrap().len(), 1);

    let err = repo.set_status(Uuid::new_v4(), TaskStatus::Active).await.unwrap_err();
    assert!(err.is_not_found());

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_create_reports_duplicate_for_same_task_and_date() {
    let pool = setup_test_db().await;
    let store = SqliteOccurrenceRepository::new(pool.clone());
    let task = seeded_task(&pool).await;

    let first = TaskOccurrence::new(task.id, date(2024, 1, 1), vec![], Utc::now());
    let outcome = store.create(&first, &[created_entry(&first)]).await.unwrap();
    assert!(matches!(outcome, CreateOutcome::Created(_)));

    let second = TaskOccurrence::new(task.id, date(2024, 1, 1), vec![], Utc::now());
    let outcome = store.create(&second, &[created_entry(&second)]).await.unwrap();
    assert_eq!(outcome, CreateOutcome::Duplicate);

    assert_eq!(store.count(task.id).await.unwrap(), 1);
    assert!(store.for_occurrence(second.id).await.unwrap().is_empty());

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_deleted_occurrence_frees_its_date() {
    let pool = setup_test_db().await;
    let store = SqliteOccurrenceRepository::new(pool.clone());
    let task = seeded_task(&pool).await;

    let occ = TaskOccurrence::new(task.id, date(2024, 1, 8), vec![], Utc::now());
    store.create(&occ, &[created_entry(&occ)]).await.unwrap();

    let deleted = store
        .bulk_delete_future(task.id, date(2024, 1, 1), Uuid::nil(), Utc::now())
        .await
        .unwrap();
    assert_eq!(deleted, vec![occ.id]);
    assert_eq!(store.count(task.id).await.unwrap(), 0);
    assert_eq!(store.latest_due_date(task.id).await.unwrap(), None);
    assert!(store.find_by_task_and_date(task.id, date(2024, 1, 8)).await.unwrap().is_none());

    let replacement = TaskOccurrence::new(task.id, date(2024, 1, 8), vec![], Utc::now());
    let outcome = store.create(&replacement, &[created_entry(&replacement)]).await.unwrap();
    assert!(matches!(outcome, CreateOutcome::Created(_)));

    let history = store.for_occurrence(occ.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].new_value.as_deref(), Some("deleted"));

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_bulk_delete_keeps_past_and_terminal() {
    let pool = setup_test_db().await;
    let store = SqliteOccurrenceRepository::new(pool.clone());
    let task = seeded_task(&pool).await;
    let now = Utc::now();

    let past = TaskOccurrence::new(task.id, date(2024, 1, 1), vec![], now);
    let mut done = TaskOccurrence::new(task.id, date(2024, 1, 15), vec![], now);
    let future = TaskOccurrence::new(task.id, date(2024, 1, 22), vec![Uuid::new_v4()], now);
    for occ in [&past, &done, &future] {
        store.create(occ, &[]).await.unwrap();
    }
    done.status = OccurrenceStatus::Completed;
    done.completed_at = Some(now);
    store.update(&done, OccurrenceStatus::Created, &[]).await.unwrap();

    let deleted = store
        .bulk_delete_future(task.id, date(2024, 1, 10), Uuid::nil(), now)
        .await
        .unwrap();
    assert_eq!(deleted, vec![future.id]);
    assert_eq!(store.get(past.id).await.unwrap().unwrap().status, OccurrenceStatus::Created);
    assert_eq!(store.get(done.id).await.unwrap().unwrap().status, OccurrenceStatus::Completed);

    let history = store.for_occurrence(future.id).await.unwrap();
    assert_eq!(history[0].old_value.as_deref(), Some("assigned"));

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_update_is_compare_and_swap() {
    let pool = setup_test_db().await;
    let store = SqliteOccurrenceRepository::new(pool.clone());
    let task = seeded_task(&pool).await;

    let mut occ = TaskOccurrence::new(task.id, date(2024, 1, 1), vec![], Utc::now());
    store.create(&occ, &[]).await.unwrap();

    occ.status = OccurrenceStatus::Completed;
    occ.completed_at = Some(Utc::now());
    let entry = HistoryEntry::status_change(
        occ.id,
        Uuid::nil(),
        Some(OccurrenceStatus::Created),
        OccurrenceStatus::Completed,
        Utc::now(),
    );
    store.update(&occ, OccurrenceStatus::Created, &[entry]).await.unwrap();

    let mut stale = occ.clone();
    stale.status = OccurrenceStatus::Skipped;
    stale.skipped_at = Some(Utc::now());
    let err = store.update(&stale, OccurrenceStatus::Created, &[]).await.unwrap_err();
    assert!(err.is_conflict());

    let missing = TaskOccurrence::new(task.id, date(2024, 2, 1), vec![], Utc::now());
    let err = store.update(&missing, OccurrenceStatus::Created, &[]).await.unwrap_err();
    assert!(err.is_not_found());

    let stored = store.get(occ.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OccurrenceStatus::Completed);
    assert!(stored.completed_at.is_some());
    assert_eq!(store.for_occurrence(occ.id).await.unwrap().len(), 1);

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_most_recent_terminal_uses_latest_completion_or_skip() {
    let pool = setup_test_db().await;
    let store = SqliteOccurrenceRepository::new(pool.clone());
    let task = seeded_task(&pool).await;

    let mut a = TaskOccurrence::new(task.id, date(2024, 1, 1), vec![], Utc::now());
    let mut b = TaskOccurrence::new(task.id, date(2024, 1, 8), vec![], Utc::now());
    store.create(&a, &[]).await.unwrap();
    store.create(&b, &[]).await.unwrap();
    assert_eq!(store.most_recent_terminal(task.id).await.unwrap(), None);

    a.status = OccurrenceStatus::Completed;
    a.completed_at = Some(date(2024, 1, 3).and_hms_opt(9, 0, 0).unwrap().and_utc());
    store.update(&a, OccurrenceStatus::Created, &[]).await.unwrap();

    b.status = OccurrenceStatus::Skipped;
    b.skipped_at = Some(date(2024, 1, 10).and_hms_opt(18, 30, 0).unwrap().and_utc());
    store.update(&b, OccurrenceStatus::Created, &[]).await.unwrap();

    assert_eq!(store.most_recent_terminal(task.id).await.unwrap(), Some(date(2024, 1, 10)));
    assert_eq!(store.latest_due_date(task.id).await.unwrap(), Some(date(2024, 1, 8)));

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_list_filters() {
    let pool = setup_test_db().await;
    let store = SqliteOccurrenceRepository::new(pool.clone());
    let task = seeded_task(&pool).await;
    let other = seeded_task(&pool).await;
    let alice = Uuid::new_v4();

    for (task_id, day, assignees) in [
        (task.id, 15, vec![alice]),
        (task.id, 1, vec![]),
        (task.id, 8, vec![alice, Uuid::new_v4()]),
        (other.id, 8, vec![]),
    ] {
        let occ = TaskOccurrence::new(task_id, date(2024, 1, day), assignees, Utc::now());
        store.create(&occ, &[]).await.unwrap();
    }

    let all_for_task = store.list(OccurrenceFilter::for_task(task.id)).await.unwrap();
    let days: Vec<_> = all_for_task.iter().map(|o| o.due_date).collect();
    assert_eq!(days, vec![date(2024, 1, 1), date(2024, 1, 8), date(2024, 1, 15)]);

    let alice_only = store
        .list(OccurrenceFilter {
            assignee_id: Some(alice),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(alice_only.len(), 2);

    let window = store
        .list(OccurrenceFilter {
            due_from: Some(date(2024, 1, 2)),
            due_to: Some(date(2024, 1, 8)),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(window.len(), 2);

    let assigned = store
        .list(OccurrenceFilter {
            task_id: Some(task.id),
            status: Some(OccurrenceStatus::Assigned),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(assigned.len(), 2);

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_history_append_and_order() {
    let pool = setup_test_db().await;
    let store = SqliteOccurrenceRepository::new(pool.clone());
    let task = seeded_task(&pool).await;

    let occ = TaskOccurrence::new(task.id, date(2024, 1, 1), vec![], Utc::now());
    store.create(&occ, &[created_entry(&occ)]).await.unwrap();

    let at = occ.created_at;
    store
        .append(&HistoryEntry::comment(occ.id, Uuid::nil(), "first", at))
        .await
        .unwrap();
    store
        .append(&HistoryEntry::comment(occ.id, Uuid::nil(), "second", at))
        .await
        .unwrap();

    let history = store.for_occurrence(occ.id).await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].log_type, HistoryLogType::StatusChange);
    assert_eq!(history[1].comment.as_deref(), Some("first"));
    assert_eq!(history[2].comment.as_deref(), Some("second"));

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_active_tasks_reports_unreadable_rows() {
    let pool = setup_test_db().await;
    let repo = SqliteTaskRepository::new(pool.clone());
    let good = seeded_task(&pool).await;

    let bad_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO tasks (id, name, schedule, status, created_by, created_at, updated_at)
         VALUES (?, 'Broken', '{\"type\":\"fortnightly\"}', 'active', ?, ?, ?)",
    )
    .bind(bad_id.to_string())
    .bind(Uuid::nil().to_string())
    .bind("2024-01-01T00:00:00.000000Z")
    .bind("2024-01-01T00:00:00.000000Z")
    .execute(&pool)
    .await
    .unwrap();

    let entries = repo.active_tasks().await.unwrap();
    assert_eq!(entries.len(), 2);
    let unreadable: Vec<_> = entries.iter().filter_map(|e| e.as_ref().err()).collect();
    assert_eq!(unreadable.len(), 1);
    assert_eq!(unreadable[0].id, bad_id);
    assert_eq!(unreadable[0].name, "Broken");
    assert!(unreadable[0].error.contains("fortnightly"));
    assert!(entries.iter().any(|e| e.as_ref().is_ok_and(|t| t.id == good.id)));

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_has_any_counts_deleted_occurrences() {
    let pool = setup_test_db().await;
    let store = SqliteOccurrenceRepository::new(pool.clone());
    let task = seeded_task(&pool).await;
    assert!(!store.has_any(task.id).await.unwrap());

    let occ = TaskOccurrence::new(task.id, date(2024, 2, 1), vec![], Utc::now());
    store.create(&occ, &[created_entry(&occ)]).await.unwrap();
    store
        .bulk_delete_future(task.id, date(2024, 1, 1), Uuid::nil(), Utc::now())
        .await
        .unwrap();

    assert_eq!(store.count(task.id).await.unwrap(), 0);
    assert!(store.has_any(task.id).await.unwrap());

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_bulk_delete_records_prior_status_of_cleared_assignment() {
    let pool = setup_test_db().await;
    let store = SqliteOccurrenceRepository::new(pool.clone());
    let task = seeded_task(&pool).await;

    let mut occ = TaskOccurrence::new(task.id, date(2024, 2, 1), vec![Uuid::new_v4()], Utc::now());
    store.create(&occ, &[]).await.unwrap();
    occ.assignee_ids.clear();
    store.update(&occ, OccurrenceStatus::Assigned, &[]).await.unwrap();

    let deleted = store
        .bulk_delete_future(task.id, date(2024, 1, 1), Uuid::nil(), Utc::now())
        .await
        .unwrap();
    assert_eq!(deleted, vec![occ.id]);

    let history = store.for_occurrence(occ.id).await.unwrap();
    assert_eq!(history[0].old_value.as_deref(), Some("assigned"));
    assert_eq!(history[0].new_value.as_deref(), Some("deleted"));

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_history_blocks_hard_delete_of_occurrence() {
    let pool = setup_test_db().await;
    let store = SqliteOccurrenceRepository::new(pool.clone());
    let task = seeded_task(&pool).await;

    let occ = TaskOccurrence::new(task.id, date(2024, 1, 1), vec![], Utc::now());
    store.create(&occ, &[created_entry(&occ)]).await.unwrap();

    let result = sqlx::query("DELETE FROM task_occurrences WHERE id = ?")
        .bind(occ.id.to_string())
        .execute(&pool)
        .await;
    assert!(result.is_err());
    assert_eq!(store.for_occurrence(occ.id).await.unwrap().len(), 1);

    let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(task.id.to_string())
        .execute(&pool)
        .await;
    assert!(result.is_err());

    teardown_test_db(pool).await;
}
