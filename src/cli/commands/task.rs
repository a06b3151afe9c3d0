//! Task CLI commands for managing chore definitions.

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Weekday};
use clap::{Args, Subcommand};
use uuid::Uuid;

use crate::cli::commands::occurrence::OccurrenceListOutput;
use crate::cli::commands::{App, CommandContext};
use crate::cli::id_resolver::resolve_task_id;
use crate::cli::output::{list_table, output, render_list, short_id, truncate, CommandOutput};
use crate::domain::models::schedule::{parse_date, weekday_name};
use crate::domain::models::{
    EndCondition, IntervalUnit, OccurrenceFilter, Ordinal, ScheduleConfig, TaskDefinition,
    TaskOccurrence, TaskStatus,
};
use crate::domain::ports::{OccurrenceStore, TaskLookup, TaskRepository};

#[derive(Args, Debug)]
pub struct TaskArgs {
    #[command(subcommand)]
    pub command: TaskCommands,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Define a new chore and schedule its first occurrence
    Create {
        /// Chore name
        name: String,

        /// Longer description
        #[arg(long)]
        description: Option<String>,

        /// Default assignees (comma-separated user IDs)
        #[arg(long, value_delimiter = ',')]
        assignees: Vec<Uuid>,

        #[command(flatten)]
        schedule: ScheduleArgs,
    },
    /// List chores
    List {
        /// Filter by status (active, paused, soft-deleted)
        #[arg(long)]
        status: Option<String>,
    },
    /// Show a chore with its occurrences
    Show {
        /// Task ID (full UUID or unique prefix)
        id: String,
    },
    /// Pause a chore and delete its future open occurrences
    Pause {
        /// Task ID (full UUID or unique prefix)
        id: String,
    },
    /// Resume a paused chore and regenerate up to the horizon
    Resume {
        /// Task ID (full UUID or unique prefix)
        id: String,
    },
    /// Delete a chore, keeping its completed history
    Delete {
        /// Task ID (full UUID or unique prefix)
        id: String,
    },
}

/// Recurrence flags. Exactly one of --once, --every, --days, --day-of-month,
/// --weekday, or --schedule-json selects the kind.
#[derive(Args, Debug, Default, Clone)]
pub struct ScheduleArgs {
    /// Single due date (YYYY-MM-DD)
    #[arg(long)]
    pub once: Option<String>,

    /// Repeat every N units
    #[arg(long)]
    pub every: Option<u32>,

    /// Unit for --every: day, week, month, year
    #[arg(long, default_value = "day")]
    pub unit: String,

    /// Count --every from the last completion instead of the last due date
    #[arg(long)]
    pub after_completion: bool,

    /// Weekdays, comma-separated names or 0-6 with 0 = Sunday
    #[arg(long, value_delimiter = ',')]
    pub days: Vec<String>,

    /// Day number in each month (1-31); months without it are skipped
    #[arg(long)]
    pub day_of_month: Option<u32>,

    /// Weekday for a monthly nth-weekday schedule
    #[arg(long)]
    pub weekday: Option<String>,

    /// Which --weekday of the month: first, second, third, fourth, last
    #[arg(long, default_value = "first")]
    pub ordinal: String,

    /// Stop after this many occurrences
    #[arg(long)]
    pub times: Option<u32>,

    /// Stop before this date (YYYY-MM-DD)
    #[arg(long)]
    pub until: Option<String>,

    /// Full schedule as JSON, for example '{"type":"fixed_interval","interval":2,"unit":"week"}'
    #[arg(long)]
    pub schedule_json: Option<String>,
}

impl ScheduleArgs {
    /// Build and validate the schedule described by the flags.
    pub fn build(&self) -> Result<ScheduleConfig> {
        let selected = [
            self.once.is_some(),
            self.every.is_some(),
            !self.days.is_empty(),
            self.day_of_month.is_some(),
            self.weekday.is_some(),
            self.schedule_json.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();
        if selected != 1 {
            bail!(
                "Specify exactly one schedule: --once, --every, --days, --day-of-month, --weekday, or --schedule-json"
            );
        }

        let mut schedule = if let Some(raw) = &self.schedule_json {
            serde_json::from_str(raw).context("Invalid --schedule-json")?
        } else if let Some(raw) = &self.once {
            ScheduleConfig::Once {
                due_date: Some(parse_cli_date(raw)?),
                end_condition: EndCondition::Never,
            }
        } else if let Some(interval) = self.every {
            let unit = IntervalUnit::from_str(&self.unit)
                .with_context(|| format!("Invalid unit '{}'. Use day, week, month, or year", self.unit))?;
            if self.after_completion {
                ScheduleConfig::VariableInterval {
                    interval,
                    unit,
                    end_condition: EndCondition::Never,
                }
            } else {
                ScheduleConfig::FixedInterval {
                    interval,
                    unit,
                    end_condition: EndCondition::Never,
                }
            }
        } else if let Some(day_of_month) = self.day_of_month {
            ScheduleConfig::SpecificDayOfMonth {
                day_of_month,
                end_condition: EndCondition::Never,
            }
        } else if let Some(raw) = &self.weekday {
            let weekday = parse_weekday(raw)?;
            let occurrence = Ordinal::from_str(&self.ordinal).with_context(|| {
                format!("Invalid ordinal '{}'. Use first, second, third, fourth, or last", self.ordinal)
            })?;
            ScheduleConfig::SpecificWeekdayOfMonth {
                weekday,
                occurrence,
                end_condition: EndCondition::Never,
            }
        } else {
            let mut days = self
                .days
                .iter()
                .map(|d| parse_weekday(d))
                .collect::<Result<Vec<Weekday>>>()?;
            days.sort_by_key(Weekday::num_days_from_monday);
            days.dedup();
            ScheduleConfig::SpecificDaysOfWeek {
                days,
                end_condition: EndCondition::Never,
            }
        };

        match (self.times, &self.until) {
            (Some(_), Some(_)) => bail!("Use either --times or --until, not both"),
            (Some(times), None) => schedule = schedule.with_end_condition(EndCondition::Times { times }),
            (None, Some(raw)) => {
                schedule = schedule.with_end_condition(EndCondition::Date {
                    date: Some(parse_cli_date(raw)?),
                });
            }
            (None, None) => {}
        }

        let issues = schedule.validate();
        if !issues.is_empty() {
            bail!("Invalid schedule: {}", issues.join("; "));
        }
        Ok(schedule)
    }
}

fn parse_cli_date(raw: &str) -> Result<NaiveDate> {
    parse_date(raw).with_context(|| format!("Invalid date '{}'. Use YYYY-MM-DD", raw))
}

fn parse_weekday(raw: &str) -> Result<Weekday> {
    weekday_name::parse(raw)
        .with_context(|| format!("Invalid weekday '{}'. Use a name or 0-6 with 0 = Sunday", raw))
}

#[derive(Debug, serde::Serialize)]
pub struct TaskOutput {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub schedule: ScheduleConfig,
    pub schedule_summary: String,
    pub default_assignee_ids: Vec<Uuid>,
    pub created_at: String,
}

impl From<&TaskDefinition> for TaskOutput {
    fn from(task: &TaskDefinition) -> Self {
        Self {
            id: task.id.to_string(),
            name: task.name.clone(),
            description: task.description.clone(),
            status: task.status.as_str().to_string(),
            schedule: task.schedule.clone(),
            schedule_summary: task.schedule.description(),
            default_assignee_ids: task.default_assignee_ids.clone(),
            created_at: task.created_at.to_rfc3339(),
        }
    }
}

impl TaskOutput {
    fn detail_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Task: {}", self.name),
            format!("ID: {}", self.id),
            format!("Status: {}", self.status),
            format!("Schedule: {}", self.schedule_summary),
        ];
        if let Some(description) = &self.description {
            lines.push(format!("Description: {}", description));
        }
        if !self.default_assignee_ids.is_empty() {
            let ids: Vec<String> = self.default_assignee_ids.iter().map(short_id).collect();
            lines.push(format!("Assignees: {}", ids.join(", ")));
        }
        lines.push(format!("Created: {}", self.created_at));
        lines
    }
}

#[derive(Debug, serde::Serialize)]
pub struct TaskCreateOutput {
    pub task: TaskOutput,
    pub first_occurrence: Option<TaskOccurrence>,
}

impl CommandOutput for TaskCreateOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!("Created task {} ({})", self.task.name, short_id_str(&self.task.id))];
        lines.push(format!("Schedule: {}", self.task.schedule_summary));
        match &self.first_occurrence {
            Some(occ) => lines.push(format!("First occurrence due {}", occ.due_date)),
            None => lines.push("No occurrence scheduled".to_string()),
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct TaskListOutput {
    pub tasks: Vec<TaskOutput>,
    pub total: usize,
}

impl CommandOutput for TaskListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["ID", "Name", "Status", "Schedule"]);
        for task in &self.tasks {
            table.add_row(vec![
                short_id_str(&task.id),
                truncate(&task.name, 30),
                task.status.clone(),
                truncate(&task.schedule_summary, 40),
            ]);
        }
        render_list("task", table, self.total)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct TaskDetailOutput {
    pub task: TaskOutput,
    pub occurrences: OccurrenceListOutput,
}

impl CommandOutput for TaskDetailOutput {
    fn to_human(&self) -> String {
        let mut lines = self.task.detail_lines();
        lines.push(String::new());
        lines.push(self.occurrences.to_human());
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct TaskActionOutput {
    pub success: bool,
    pub task_id: String,
    pub action: String,
    pub status: String,
    pub occurrences_deleted: usize,
    pub occurrences_created: usize,
}

impl CommandOutput for TaskActionOutput {
    fn to_human(&self) -> String {
        let mut line = format!("Task {} {} (now {})", short_id_str(&self.task_id), self.action, self.status);
        if self.occurrences_deleted > 0 {
            line.push_str(&format!(", {} future occurrence(s) removed", self.occurrences_deleted));
        }
        if self.occurrences_created > 0 {
            line.push_str(&format!(", {} occurrence(s) scheduled", self.occurrences_created));
        }
        line
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

fn short_id_str(id: &str) -> String {
    id.chars().take(8).collect()
}

pub async fn execute(args: TaskArgs, ctx: &CommandContext) -> Result<()> {
    let app = App::open(&ctx.config).await?;
    run(args, &app, ctx).await
}

async fn run(args: TaskArgs, app: &App, ctx: &CommandContext) -> Result<()> {
    match args.command {
        TaskCommands::Create {
            name,
            description,
            assignees,
            schedule,
        } => {
            let schedule = schedule.build()?;
            let mut task = TaskDefinition::new(name, schedule, ctx.user).with_assignees(assignees);
            if let Some(description) = description {
                task = task.with_description(description);
            }

            app.tasks.create_task(&task).await?;
            let first_occurrence = app.generator.create_initial(&task, ctx.user).await?;

            let out = TaskCreateOutput {
                task: TaskOutput::from(&task),
                first_occurrence,
            };
            output(&out, ctx.json);
        }

        TaskCommands::List { status } => {
            let status = status
                .map(|s| {
                    TaskStatus::from_str(&s).with_context(|| {
                        format!("Invalid status '{}'. Use active, paused, or soft-deleted", s)
                    })
                })
                .transpose()?;
            let tasks = app.tasks.list_tasks(status).await?;
            let out = TaskListOutput {
                total: tasks.len(),
                tasks: tasks.iter().map(TaskOutput::from).collect(),
            };
            output(&out, ctx.json);
        }

        TaskCommands::Show { id } => {
            let task_id = resolve_task_id(&app.pool, &id).await?;
            let task = app
                .tasks
                .by_id(task_id)
                .await?
                .with_context(|| format!("Task {} not found", task_id))?;
            let occurrences = app.occurrences.list(OccurrenceFilter::for_task(task_id)).await?;
            let out = TaskDetailOutput {
                task: TaskOutput::from(&task),
                occurrences: OccurrenceListOutput::new(occurrences),
            };
            output(&out, ctx.json);
        }

        TaskCommands::Pause { id } => {
            let task_id = resolve_task_id(&app.pool, &id).await?;
            let change = app.lifecycle.pause_task(task_id, ctx.user).await?;
            output(&retired("paused", &change.task, change.deleted.len()), ctx.json);
        }

        TaskCommands::Delete { id } => {
            let task_id = resolve_task_id(&app.pool, &id).await?;
            let change = app.lifecycle.delete_task(task_id, ctx.user).await?;
            output(&retired("deleted", &change.task, change.deleted.len()), ctx.json);
        }

        TaskCommands::Resume { id } => {
            let task_id = resolve_task_id(&app.pool, &id).await?;
            let report = app
                .lifecycle
                .resume_task(task_id, ctx.user, app.runner.horizon())
                .await?;
            let out = TaskActionOutput {
                success: true,
                task_id: task_id.to_string(),
                action: "resumed".to_string(),
                status: TaskStatus::Active.as_str().to_string(),
                occurrences_deleted: 0,
                occurrences_created: report.created.len(),
            };
            output(&out, ctx.json);
        }
    }

    Ok(())
}

fn retired(action: &str, task: &TaskDefinition, deleted: usize) -> TaskActionOutput {
    TaskActionOutput {
        success: true,
        task_id: task.id.to_string(),
        action: action.to_string(),
        status: task.status.as_str().to_string(),
        occurrences_deleted: deleted,
        occurrences_created: 0,
    }
}
