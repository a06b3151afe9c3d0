//! Scheduler CLI commands: one-shot horizon runs and the periodic daemon.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tracing::info;

use crate::cli::commands::{App, CommandContext};
use crate::cli::id_resolver::resolve_task_id;
use crate::cli::output::{output, short_id, CommandOutput};
use crate::domain::models::TaskOccurrence;
use crate::services::{BatchReport, GenerationReport, SchedulerDaemon};

#[derive(Args, Debug)]
pub struct SchedulerArgs {
    #[command(subcommand)]
    pub command: SchedulerCommands,
}

#[derive(Subcommand, Debug)]
pub enum SchedulerCommands {
    /// Generate occurrences up to the horizon once
    Run {
        /// Only this task (ID or prefix)
        #[arg(long)]
        task: Option<String>,

        /// Override the configured horizon in days
        #[arg(long)]
        horizon_days: Option<u32>,

        /// Stop scheduling more tasks after this many seconds
        #[arg(long)]
        budget_secs: Option<u64>,
    },
    /// Run horizon generation periodically until interrupted
    Daemon {
        /// Seconds between runs (defaults to scheduler.run_interval_secs)
        #[arg(long)]
        interval_secs: Option<u64>,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct BatchOutput {
    pub report: BatchReport,
}

impl CommandOutput for BatchOutput {
    fn to_human(&self) -> String {
        let r = &self.report;
        let mut lines = vec![format!(
            "Generated {} occurrence(s) across {} task(s)",
            r.occurrences_generated, r.tasks_processed
        )];
        if let Some(horizon) = r.horizon {
            lines.push(format!("Horizon: {}", horizon));
        }
        for failure in &r.failures {
            lines.push(format!("  failed: {} ({}): {}", failure.task_name, short_id(&failure.task_id), failure.error));
        }
        if !r.capped.is_empty() {
            lines.push(format!("  {} task(s) stopped early by safety limits", r.capped.len()));
        }
        if r.budget_exhausted {
            lines.push(format!("  budget exhausted, {} task(s) deferred", r.tasks_skipped));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct TaskRunOutput {
    pub task_id: String,
    pub created: Vec<TaskOccurrence>,
    pub duplicates: u32,
    pub stop: String,
}

impl TaskRunOutput {
    fn new(task_id: uuid::Uuid, report: GenerationReport) -> Self {
        Self {
            task_id: task_id.to_string(),
            created: report.created,
            duplicates: report.duplicates,
            stop: report.stop.as_str().to_string(),
        }
    }
}

impl CommandOutput for TaskRunOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Generated {} occurrence(s) (stopped: {})",
            self.created.len(),
            self.stop.replace('_', " ")
        )];
        for occ in &self.created {
            lines.push(format!("  {} due {}", short_id(&occ.id), occ.due_date));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: SchedulerArgs, ctx: &CommandContext) -> Result<()> {
    match args.command {
        SchedulerCommands::Run {
            task,
            horizon_days,
            budget_secs,
        } => {
            let mut config = ctx.config.clone();
            if let Some(days) = horizon_days {
                config.scheduler.horizon_days = days.max(1);
            }
            if budget_secs.is_some() {
                config.scheduler.batch_budget_secs = budget_secs;
            }
            let app = App::open(&config).await?;

            match task {
                Some(prefix) => {
                    let task_id = resolve_task_id(&app.pool, &prefix).await?;
                    let report = app.runner.run_for_task(task_id).await?;
                    output(&TaskRunOutput::new(task_id, report), ctx.json);
                }
                None => {
                    let report = app.runner.run_all().await?;
                    output(&BatchOutput { report }, ctx.json);
                }
            }
        }

        SchedulerCommands::Daemon { interval_secs } => {
            let app = App::open(&ctx.config).await?;
            let period = Duration::from_secs(
                interval_secs
                    .unwrap_or(ctx.config.scheduler.run_interval_secs)
                    .max(1),
            );

            let daemon = SchedulerDaemon::new(Arc::clone(&app.runner), period);
            let handle = daemon.start();
            info!(period_secs = period.as_secs(), "Scheduler daemon started");

            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for shutdown signal")?;
            info!("Shutdown requested");
            daemon.stop();
            handle.await.context("Scheduler daemon task panicked")?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::TaskFailure;

    #[test]
    fn test_batch_output_mentions_failures() {
        let report = BatchReport {
            tasks_processed: 1,
            occurrences_generated: 4,
            failures: vec![TaskFailure {
                task_id: uuid::Uuid::nil(),
                task_name: "Laundry".to_string(),
                error: "Database error: locked".to_string(),
            }],
            ..Default::default()
        };
        let human = BatchOutput { report }.to_human();
        assert!(human.starts_with("Generated 4 occurrence(s) across 1 task(s)"));
        assert!(human.contains("Laundry"));
    }

    #[tokio::test]
    async fn test_run_against_fresh_database() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = crate::domain::models::Config::default();
        config.database.path = dir.path().join("chorecast.db").display().to_string();
        let ctx = CommandContext {
            config,
            user: uuid::Uuid::nil(),
            json: true,
        };

        let args = SchedulerArgs {
            command: SchedulerCommands::Run {
                task: None,
                horizon_days: Some(7),
                budget_secs: None,
            },
        };
        execute(args, &ctx).await.unwrap();
        assert!(dir.path().join("chorecast.db").exists());
    }
}
