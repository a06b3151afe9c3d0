use std::sync::Arc;

use chrono::NaiveDate;
use sqlx::SqlitePool;
use uuid::Uuid;

use chorecast::adapters::sqlite::{SqliteOccurrenceRepository, SqliteTaskRepository};
use chorecast::domain::models::{
    EndCondition, IntervalUnit, SchedulerConfig, ScheduleConfig, TaskDefinition, TaskOccurrence,
};
use chorecast::domain::ports::{FixedClock, TaskRepository};
use chorecast::services::{HorizonRunner, OccurrenceGenerator, OccurrenceLifecycle};

use super::database::setup_test_db;

pub type Store = SqliteOccurrenceRepository;
pub type Tasks = SqliteTaskRepository;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn weekly() -> ScheduleConfig {
    ScheduleConfig::FixedInterval {
        interval: 1,
        unit: IntervalUnit::Week,
        end_condition: EndCondition::Never,
    }
}

/// Services wired against one in-memory SQLite database and a fixed clock.
pub struct Harness {
    pub pool: SqlitePool,
    pub clock: Arc<FixedClock>,
    pub tasks: Arc<Tasks>,
    pub store: Arc<Store>,
    pub generator: Arc<OccurrenceGenerator<Store>>,
    pub lifecycle: OccurrenceLifecycle<Store, Tasks>,
    pub runner: HorizonRunner<Store, Tasks>,
    pub user: Uuid,
}

impl Harness {
    pub async fn new(today: NaiveDate) -> Self {
        Self::with_config(today, SchedulerConfig::default()).await
    }

    pub async fn with_config(today: NaiveDate, config: SchedulerConfig) -> Self {
        let pool = setup_test_db().await;
        let clock = Arc::new(FixedClock::on(today));
        let tasks = Arc::new(SqliteTaskRepository::new(pool.clone()));
        let store = Arc::new(SqliteOccurrenceRepository::new(pool.clone()));
        let generator = Arc::new(OccurrenceGenerator::new(store.clone(), clock.clone()).with_config(&config));
        let lifecycle = OccurrenceLifecycle::new(store.clone(), tasks.clone(), generator.clone());
        let runner = HorizonRunner::new(generator.clone(), tasks.clone(), &config);

        Self {
            pool,
            clock,
            tasks,
            store,
            generator,
            lifecycle,
            runner,
            user: Uuid::new_v4(),
        }
    }

    /// Persist a task and create its initial occurrence.
    pub async fn add_task(&self, name: &str, schedule: ScheduleConfig) -> (TaskDefinition, Option<TaskOccurrence>) {
        let task = TaskDefinition::new(name, schedule, self.user);
        self.tasks.create_task(&task).await.expect("failed to create task");
        let initial = self
            .generator
            .create_initial(&task, self.user)
            .await
            .expect("failed to create initial occurrence");
        (task, initial)
    }
}
