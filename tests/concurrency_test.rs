//! Concurrent generation against a file-backed, multi-connection database.

mod helpers;

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tempfile::TempDir;
use uuid::Uuid;

use chorecast::adapters::sqlite::{initialize_database, SqliteOccurrenceRepository, SqliteTaskRepository};
use chorecast::domain::models::{
    CreateOutcome, DatabaseConfig, OccurrenceFilter, SchedulerConfig, TaskDefinition, TaskOccurrence,
};
use chorecast::domain::ports::{FixedClock, OccurrenceStore, TaskRepository};
use chorecast::services::{HorizonRunner, NextAnchor, OccurrenceGenerator, OccurrenceLifecycle};

use helpers::fixtures::{date, weekly};

struct FileHarness {
    _dir: TempDir,
    tasks: Arc<SqliteTaskRepository>,
    store: Arc<SqliteOccurrenceRepository>,
    generator: Arc<OccurrenceGenerator<SqliteOccurrenceRepository>>,
}

async fn file_harness() -> FileHarness {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        path: dir.path().join("chorecast.db").display().to_string(),
        max_connections: 5,
    };
    let pool = initialize_database(&config).await.unwrap();
    let clock = Arc::new(FixedClock::on(date(2024, 1, 1)));
    let store = Arc::new(SqliteOccurrenceRepository::new(pool.clone()));

    FileHarness {
        _dir: dir,
        tasks: Arc::new(SqliteTaskRepository::new(pool)),
        generator: Arc::new(OccurrenceGenerator::new(store.clone(), clock)),
        store,
    }
}

#[tokio::test]
async fn test_concurrent_inserts_for_same_date_create_one_row() {
    let h = file_harness().await;
    let task = TaskDefinition::new("Vacuum", weekly(), Uuid::nil());
    h.tasks.create_task(&task).await.unwrap();

    let attempts = (0..8).map(|_| {
        let store = h.store.clone();
        let occ = TaskOccurrence::new(task.id, date(2024, 1, 8), vec![], Utc::now());
        tokio::spawn(async move { store.create(&occ, &[]).await })
    });
    let outcomes: Vec<CreateOutcome> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let created = outcomes
        .iter()
        .filter(|o| matches!(o, CreateOutcome::Created(_)))
        .count();
    assert_eq!(created, 1);
    assert_eq!(h.store.count(task.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_concurrent_generate_next_is_deduplicated() {
    let h = file_harness().await;
    let task = TaskDefinition::new("Bins", weekly(), Uuid::nil());
    h.tasks.create_task(&task).await.unwrap();
    let first = h.generator.create_initial(&task, Uuid::nil()).await.unwrap().unwrap();

    let anchor = NextAnchor {
        due_date: first.due_date,
        terminal_date: None,
    };
    let calls = (0..6).map(|_| {
        let generator = h.generator.clone();
        let task = task.clone();
        tokio::spawn(async move { generator.generate_next(&task, anchor, Uuid::nil()).await })
    });
    let results: Vec<Option<TaskOccurrence>> = join_all(calls)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_some()).count(), 1);
    let rows = h
        .store
        .list(OccurrenceFilter::for_task(task.id))
        .await
        .unwrap();
    let dates: Vec<_> = rows.iter().map(|o| o.due_date).collect();
    assert_eq!(dates, vec![date(2024, 1, 1), date(2024, 1, 8)]);
}

#[tokio::test]
async fn test_overlapping_batch_runs_do_not_duplicate() {
    let h = file_harness().await;
    for name in ["Dishes", "Laundry", "Plants"] {
        let task = TaskDefinition::new(name, weekly(), Uuid::nil());
        h.tasks.create_task(&task).await.unwrap();
    }
    let config = SchedulerConfig {
        horizon_days: 28,
        ..Default::default()
    };
    let runner = Arc::new(HorizonRunner::new(h.generator.clone(), h.tasks.clone(), &config));

    let runs = (0..4).map(|_| {
        let runner = runner.clone();
        tokio::spawn(async move { runner.run_all().await })
    });
    let reports: Vec<_> = join_all(runs)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let generated: usize = reports.iter().map(|r| r.occurrences_generated).sum();
    // 2024-01-01 through 2024-01-29: five weekly dates per task.
    assert_eq!(generated, 15);
    assert!(reports.iter().all(|r| r.tasks_failed == 0));

    let all = h.store.list(OccurrenceFilter::default()).await.unwrap();
    assert_eq!(all.len(), 15);
}

#[tokio::test]
async fn test_racing_completions_transition_once() {
    let h = file_harness().await;
    let task = TaskDefinition::new("Mop", weekly(), Uuid::nil());
    h.tasks.create_task(&task).await.unwrap();
    let first = h.generator.create_initial(&task, Uuid::nil()).await.unwrap().unwrap();
    let lifecycle = Arc::new(OccurrenceLifecycle::new(
        h.store.clone(),
        h.tasks.clone(),
        h.generator.clone(),
    ));

    let attempts = (0..4).map(|_| {
        let lifecycle = lifecycle.clone();
        let id = first.id;
        tokio::spawn(async move { lifecycle.complete(id, Uuid::new_v4()).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(err.is_conflict() || err.is_invalid_transition(), "unexpected error: {err}");
    }

    let history = lifecycle.history(first.id).await.unwrap();
    let completions = history
        .iter()
        .filter(|e| e.new_value.as_deref() == Some("completed"))
        .count();
    assert_eq!(completions, 1);
    assert_eq!(h.store.count(task.id).await.unwrap(), 2);
}
