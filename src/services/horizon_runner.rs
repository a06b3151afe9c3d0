//! Horizon batch generation across all active tasks, and the periodic
//! daemon that drives it.
//!
//! Tasks are processed independently: a failing or capped task is recorded
//! in the report and the batch moves on. An optional wall-clock budget stops
//! scheduling further tasks once spent, returning partial results.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, NaiveDate};
use serde::Serialize;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{SchedulerConfig, SYSTEM_USER_ID};
use crate::domain::ports::{OccurrenceStore, TaskLookup};
use crate::services::occurrence_generator::{GenerationReport, OccurrenceGenerator};

/// A task whose generation failed during a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct TaskFailure {
    pub task_id: Uuid,
    pub task_name: String,
    pub error: String,
}

/// Aggregate outcome of one batch run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub horizon: Option<NaiveDate>,
    pub tasks_processed: usize,
    pub tasks_failed: usize,
    /// Tasks left unprocessed because the budget ran out.
    pub tasks_skipped: usize,
    pub occurrences_generated: usize,
    /// Tasks stopped by the iteration cap or a non-advancing schedule.
    pub capped: Vec<Uuid>,
    pub failures: Vec<TaskFailure>,
    pub budget_exhausted: bool,
}

/// Runs horizon generation for every active task.
pub struct HorizonRunner<S: OccurrenceStore, T: TaskLookup> {
    generator: Arc<OccurrenceGenerator<S>>,
    tasks: Arc<T>,
    horizon_days: u32,
    budget: Option<Duration>,
}

impl<S: OccurrenceStore, T: TaskLookup> HorizonRunner<S, T> {
    pub fn new(generator: Arc<OccurrenceGenerator<S>>, tasks: Arc<T>, config: &SchedulerConfig) -> Self {
        Self {
            generator,
            tasks,
            horizon_days: config.horizon_days,
            budget: config.batch_budget_secs.map(Duration::from_secs),
        }
    }

    /// Override the wall-clock budget for a batch run.
    pub fn with_budget(mut self, budget: Option<Duration>) -> Self {
        self.budget = budget;
        self
    }

    /// Today plus the configured horizon.
    pub fn horizon(&self) -> NaiveDate {
        let today = self.generator.clock().today();
        today
            .checked_add_days(Days::new(u64::from(self.horizon_days)))
            .unwrap_or(NaiveDate::MAX)
    }

    /// Generate occurrences up to the horizon for every active task.
    #[instrument(skip_all)]
    pub async fn run_all(&self) -> DomainResult<BatchReport> {
        let started = Instant::now();
        let horizon = self.horizon();
        let tasks = self.tasks.active_tasks().await?;
        let mut report = BatchReport {
            horizon: Some(horizon),
            ..Default::default()
        };

        for (index, entry) in tasks.iter().enumerate() {
            if let Some(budget) = self.budget {
                if started.elapsed() >= budget {
                    report.budget_exhausted = true;
                    report.tasks_skipped = tasks.len() - index;
                    warn!(
                        remaining = report.tasks_skipped,
                        budget_secs = budget.as_secs(),
                        "Batch budget exhausted; remaining tasks deferred"
                    );
                    break;
                }
            }

            let task = match entry {
                Ok(task) => task,
                Err(unreadable) => {
                    report.tasks_failed += 1;
                    report.failures.push(TaskFailure {
                        task_id: unreadable.id,
                        task_name: unreadable.name.clone(),
                        error: unreadable.error.clone(),
                    });
                    continue;
                }
            };

            match self.generator.generate_for_task(task, horizon, SYSTEM_USER_ID).await {
                Ok(outcome) => {
                    report.tasks_processed += 1;
                    report.occurrences_generated += outcome.created.len();
                    if outcome.capped() {
                        report.capped.push(task.id);
                    }
                }
                Err(e) => {
                    error!(task_id = %task.id, error = %e, "Generation failed for task");
                    report.tasks_failed += 1;
                    report.failures.push(TaskFailure {
                        task_id: task.id,
                        task_name: task.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            %horizon,
            processed = report.tasks_processed,
            failed = report.tasks_failed,
            generated = report.occurrences_generated,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Horizon batch finished"
        );
        Ok(report)
    }

    /// Generate occurrences up to the horizon for one task now.
    pub async fn run_for_task(&self, task_id: Uuid) -> DomainResult<GenerationReport> {
        let task = self
            .tasks
            .by_id(task_id)
            .await?
            .ok_or(DomainError::TaskNotFound(task_id))?;
        self.generator
            .generate_for_task(&task, self.horizon(), SYSTEM_USER_ID)
            .await
    }
}

/// Periodic trigger for `HorizonRunner::run_all`.
pub struct SchedulerDaemon<S: OccurrenceStore + 'static, T: TaskLookup + 'static> {
    runner: Arc<HorizonRunner<S, T>>,
    period: Duration,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl<S: OccurrenceStore + 'static, T: TaskLookup + 'static> SchedulerDaemon<S, T> {
    pub fn new(runner: Arc<HorizonRunner<S, T>>, period: Duration) -> Self {
        Self {
            runner,
            period,
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Start the run loop; the first batch runs immediately.
    pub fn start(&self) -> tokio::task::JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);

        let runner = self.runner.clone();
        let running = self.running.clone();
        let shutdown = self.shutdown.clone();
        let period = self.period;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            while running.load(Ordering::SeqCst) {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown.notified() => break,
                }
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(e) = runner.run_all().await {
                    error!(error = %e, "Horizon batch failed");
                }
            }
            info!("Scheduler daemon stopped");
        })
    }

    /// Stop the loop. A batch already in progress finishes first.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
