//! Occurrence generation.
//!
//! Turns a task's schedule into concrete occurrences in three ways:
//! the initial occurrence when a task is defined, batch generation up to a
//! horizon date, and the single next occurrence after one is completed or
//! skipped. Every create goes through the store's uniqueness guarantee, so
//! concurrent triggers racing for the same task and date produce one row.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    HistoryEntry, OccurrenceFilter, OccurrenceStatus, ScheduleConfig, SchedulerConfig,
    TaskDefinition, TaskOccurrence,
};
use crate::domain::ports::{Clock, OccurrenceStore};
use crate::services::end_condition::has_ended;
use crate::services::schedule_calculator::ScheduleCalculator;

/// Default hard cap on candidates examined in one batch run for one task.
pub const DEFAULT_MAX_ITERATIONS: u32 = 1000;

const SCHEDULER_COMMENT: &str = "Generated by scheduler";

/// Persisted facts a batch run starts from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationContext {
    /// Live occurrences already generated for the task.
    pub existing_count: u64,
    /// Latest due date among live occurrences; the running anchor.
    pub last_due_date: Option<NaiveDate>,
    /// Date of the most recent completion or skip.
    pub last_terminal_date: Option<NaiveDate>,
}

/// Why a batch run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Next candidate falls after the horizon.
    Horizon,
    /// End condition reached.
    Ended,
    /// The schedule produced no date.
    NoDate,
    /// Iteration cap hit.
    IterationCap,
    /// The calculator returned a date that does not advance.
    NonAdvancing,
    /// One-off task already has its occurrence.
    AlreadyGenerated,
    /// `variable_interval` task still has an open occurrence.
    AwaitingCompletion,
    /// Task is not active.
    Inactive,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Horizon => "horizon",
            Self::Ended => "ended",
            Self::NoDate => "no_date",
            Self::IterationCap => "iteration_cap",
            Self::NonAdvancing => "non_advancing",
            Self::AlreadyGenerated => "already_generated",
            Self::AwaitingCompletion => "awaiting_completion",
            Self::Inactive => "inactive",
        }
    }
}

/// Result of a batch run for one task.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub created: Vec<TaskOccurrence>,
    /// Candidates that already existed (pre-check or lost insert race).
    pub duplicates: u32,
    pub stop: StopReason,
}

impl GenerationReport {
    fn stopped(stop: StopReason) -> Self {
        Self {
            created: Vec::new(),
            duplicates: 0,
            stop,
        }
    }

    /// Whether generation was cut short by a safety valve.
    pub fn capped(&self) -> bool {
        matches!(self.stop, StopReason::IterationCap | StopReason::NonAdvancing)
    }
}

/// Anchor for generating the occurrence after a terminal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextAnchor {
    /// Due date of the occurrence that just ended.
    pub due_date: NaiveDate,
    /// Date it was completed or skipped.
    pub terminal_date: Option<NaiveDate>,
}

impl NextAnchor {
    pub fn after(occurrence: &TaskOccurrence) -> Self {
        Self {
            due_date: occurrence.due_date,
            terminal_date: occurrence.terminal_at().map(|at| at.date_naive()),
        }
    }
}

/// Generates occurrences for tasks.
pub struct OccurrenceGenerator<S: OccurrenceStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    calculator: ScheduleCalculator,
    max_iterations: u32,
}

impl<S: OccurrenceStore> OccurrenceGenerator<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            calculator: ScheduleCalculator::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Apply iteration and calendar-search limits from configuration.
    pub fn with_config(mut self, config: &SchedulerConfig) -> Self {
        self.calculator = ScheduleCalculator::new(config.max_search_months);
        self.max_iterations = config.max_iterations.max(1);
        self
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Load the persisted facts a batch run for `task_id` starts from.
    pub async fn load_context(&self, task_id: Uuid) -> DomainResult<GenerationContext> {
        Ok(GenerationContext {
            existing_count: self.store.count(task_id).await?,
            last_due_date: self.store.latest_due_date(task_id).await?,
            last_terminal_date: self.store.most_recent_terminal(task_id).await?,
        })
    }

    /// Create the first occurrence of a newly defined task.
    ///
    /// Returns `None` when the schedule yields no date, when its end
    /// condition already excludes the first date, or when the occurrence
    /// already exists.
    #[instrument(skip_all, fields(task_id = %task.id, kind = task.schedule.as_str()))]
    pub async fn create_initial(
        &self,
        task: &TaskDefinition,
        user_id: Uuid,
    ) -> DomainResult<Option<TaskOccurrence>> {
        let today = self.clock.today();
        let Some(due_date) = self.calculator.first_due_date(&task.schedule, today) else {
            warn!("Schedule produced no first date; nothing to schedule");
            return Ok(None);
        };

        // A one-off task gets one occurrence ever, even if it was deleted.
        if task.schedule.is_once() && self.store.has_any(task.id).await? {
            debug!("One-off task already has its occurrence");
            return Ok(None);
        }

        let count = self.store.count(task.id).await?;
        if has_ended(&task.schedule, count + 1, Some(due_date)) {
            info!(%due_date, "End condition excludes the first occurrence");
            return Ok(None);
        }

        let comment = format!("Initial occurrence created for task: {}", task.name);
        self.create_one(task, due_date, user_id, &comment).await
    }

    /// Load context and generate up to `horizon` for one task.
    pub async fn generate_for_task(
        &self,
        task: &TaskDefinition,
        horizon: NaiveDate,
        user_id: Uuid,
    ) -> DomainResult<GenerationReport> {
        if !task.is_active() {
            return Ok(GenerationReport::stopped(StopReason::Inactive));
        }
        let context = self.load_context(task.id).await?;
        self.generate_until(task, horizon, context, user_id).await
    }

    /// Materialize every occurrence of `task` due on or before `horizon`.
    ///
    /// Re-running with the same horizon creates nothing new.
    #[instrument(skip_all, fields(task_id = %task.id, kind = task.schedule.as_str(), %horizon))]
    pub async fn generate_until(
        &self,
        task: &TaskDefinition,
        horizon: NaiveDate,
        context: GenerationContext,
        user_id: Uuid,
    ) -> DomainResult<GenerationReport> {
        let report = match &task.schedule {
            ScheduleConfig::Once { .. } => self.generate_once(task, context, user_id).await?,
            ScheduleConfig::VariableInterval { .. } => {
                self.generate_variable(task, horizon, context, user_id).await?
            }
            _ => self.generate_series(task, horizon, context, user_id).await?,
        };

        debug!(
            created = report.created.len(),
            duplicates = report.duplicates,
            stop = report.stop.as_str(),
            "Generation finished"
        );
        Ok(report)
    }

    /// Create the occurrence following one that was just completed or
    /// skipped.
    ///
    /// Returns `None` for one-off and inactive tasks, when the schedule has
    /// ended or produced no date, and when that occurrence already exists.
    #[instrument(skip_all, fields(task_id = %task.id, kind = task.schedule.as_str()))]
    pub async fn generate_next(
        &self,
        task: &TaskDefinition,
        anchor: NextAnchor,
        user_id: Uuid,
    ) -> DomainResult<Option<TaskOccurrence>> {
        if task.schedule.is_once() || !task.is_active() {
            return Ok(None);
        }

        let anchor_date = if task.schedule.anchors_on_completion() {
            match anchor.terminal_date {
                Some(date) => date,
                None => return Ok(None),
            }
        } else {
            anchor.due_date
        };

        let today = self.clock.today();
        let Some(candidate) = self
            .calculator
            .next_due_date(&task.schedule, Some(anchor_date), today)
        else {
            return Ok(None);
        };

        let count = self.store.count(task.id).await?;
        if has_ended(&task.schedule, count + 1, Some(candidate)) {
            info!(%candidate, "Schedule has ended; no next occurrence");
            return Ok(None);
        }

        self.create_one(task, candidate, user_id, SCHEDULER_COMMENT).await
    }

    async fn generate_once(
        &self,
        task: &TaskDefinition,
        context: GenerationContext,
        user_id: Uuid,
    ) -> DomainResult<GenerationReport> {
        if context.existing_count > 0 || self.store.has_any(task.id).await? {
            return Ok(GenerationReport::stopped(StopReason::AlreadyGenerated));
        }
        let today = self.clock.today();
        let Some(due_date) = self.calculator.first_due_date(&task.schedule, today) else {
            return Ok(GenerationReport::stopped(StopReason::NoDate));
        };
        if has_ended(&task.schedule, 1, Some(due_date)) {
            return Ok(GenerationReport::stopped(StopReason::Ended));
        }

        let mut report = GenerationReport::stopped(StopReason::AlreadyGenerated);
        self.record(
            &mut report,
            self.create_one(task, due_date, user_id, SCHEDULER_COMMENT).await?,
        );
        Ok(report)
    }

    async fn generate_variable(
        &self,
        task: &TaskDefinition,
        horizon: NaiveDate,
        context: GenerationContext,
        user_id: Uuid,
    ) -> DomainResult<GenerationReport> {
        if self.has_open_occurrence(task.id).await? {
            return Ok(GenerationReport::stopped(StopReason::AwaitingCompletion));
        }

        let today = self.clock.today();
        let candidate = match context.last_terminal_date {
            Some(completed) => self
                .calculator
                .next_due_date(&task.schedule, Some(completed), today),
            None if context.existing_count == 0 => {
                self.calculator.first_due_date(&task.schedule, today)
            }
            None => None,
        };
        let Some(candidate) = candidate else {
            return Ok(GenerationReport::stopped(StopReason::NoDate));
        };
        if candidate > horizon {
            return Ok(GenerationReport::stopped(StopReason::Horizon));
        }
        if has_ended(&task.schedule, context.existing_count + 1, Some(candidate)) {
            return Ok(GenerationReport::stopped(StopReason::Ended));
        }

        let mut report = GenerationReport::stopped(StopReason::AwaitingCompletion);
        self.record(
            &mut report,
            self.create_one(task, candidate, user_id, SCHEDULER_COMMENT).await?,
        );
        Ok(report)
    }

    async fn generate_series(
        &self,
        task: &TaskDefinition,
        horizon: NaiveDate,
        context: GenerationContext,
        user_id: Uuid,
    ) -> DomainResult<GenerationReport> {
        let today = self.clock.today();
        let mut report = GenerationReport::stopped(StopReason::Horizon);
        let mut count = context.existing_count;
        let mut anchor = context.last_due_date;
        let mut iterations = 0u32;

        loop {
            if iterations >= self.max_iterations {
                warn!(
                    iterations,
                    created = report.created.len(),
                    "Iteration cap reached; stopping generation"
                );
                report.stop = StopReason::IterationCap;
                break;
            }
            iterations += 1;

            let candidate = match anchor {
                Some(previous) => self.calculator.next_due_date(&task.schedule, Some(previous), today),
                None => self.calculator.first_due_date(&task.schedule, today),
            };
            let Some(candidate) = candidate else {
                report.stop = StopReason::NoDate;
                break;
            };
            if let Some(previous) = anchor {
                if candidate <= previous {
                    warn!(%previous, %candidate, "Schedule did not advance; stopping generation");
                    report.stop = StopReason::NonAdvancing;
                    break;
                }
            }
            if candidate > horizon {
                report.stop = StopReason::Horizon;
                break;
            }
            if has_ended(&task.schedule, count + 1, Some(candidate)) {
                report.stop = StopReason::Ended;
                break;
            }

            let created = self.create_one(task, candidate, user_id, SCHEDULER_COMMENT).await?;
            self.record(&mut report, created);
            count += 1;
            anchor = Some(candidate);
        }

        Ok(report)
    }

    fn record(&self, report: &mut GenerationReport, created: Option<TaskOccurrence>) {
        match created {
            Some(occurrence) => report.created.push(occurrence),
            None => report.duplicates += 1,
        }
    }

    async fn has_open_occurrence(&self, task_id: Uuid) -> DomainResult<bool> {
        for status in [OccurrenceStatus::Created, OccurrenceStatus::Assigned] {
            let filter = OccurrenceFilter {
                task_id: Some(task_id),
                status: Some(status),
                ..Default::default()
            };
            if !self.store.list(filter).await?.is_empty() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// De-duplicated create. `None` means a live occurrence already exists
    /// on that date, found either by the pre-check or by the store's
    /// uniqueness guarantee.
    async fn create_one(
        &self,
        task: &TaskDefinition,
        due_date: NaiveDate,
        user_id: Uuid,
        comment: &str,
    ) -> DomainResult<Option<TaskOccurrence>> {
        if self
            .store
            .find_by_task_and_date(task.id, due_date)
            .await?
            .is_some()
        {
            debug!(%due_date, "Occurrence already exists");
            return Ok(None);
        }

        let now = self.clock.now();
        let occurrence = TaskOccurrence::new(task.id, due_date, task.default_assignee_ids.clone(), now);
        let entry = HistoryEntry::status_change(occurrence.id, user_id, None, occurrence.status, now)
            .with_comment(comment);

        let created = self.store.create(&occurrence, &[entry]).await?.into_created();
        match &created {
            Some(occurrence) => {
                debug!(occurrence_id = %occurrence.id, %due_date, status = occurrence.status.as_str(), "Occurrence created")
            }
            None => debug!(%due_date, "Lost insert race; occurrence already exists"),
        }
        Ok(created)
    }
}
