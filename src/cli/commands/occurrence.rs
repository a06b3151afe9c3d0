//! Occurrence CLI commands: listing, completion, skipping, edits, and history.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use console::style;
use uuid::Uuid;

use crate::cli::commands::{App, CommandContext};
use crate::cli::id_resolver::{resolve_occurrence_id, resolve_task_id};
use crate::cli::output::{list_table, output, render_list, short_id, truncate, CommandOutput};
use crate::domain::models::schedule::parse_date;
use crate::domain::models::{HistoryEntry, HistoryLogType, OccurrenceFilter, OccurrenceStatus, TaskOccurrence};
use crate::domain::ports::OccurrenceStore;
use crate::services::{OccurrenceUpdate, TransitionOutcome};

#[derive(Args, Debug)]
pub struct OccurrenceArgs {
    #[command(subcommand)]
    pub command: OccurrenceCommands,
}

#[derive(Subcommand, Debug)]
pub enum OccurrenceCommands {
    /// List occurrences
    List {
        /// Only occurrences of this task (ID or prefix)
        #[arg(long)]
        task: Option<String>,

        /// Filter by status (created, assigned, completed, skipped, deleted)
        #[arg(long)]
        status: Option<String>,

        /// Only occurrences assigned to this user
        #[arg(long)]
        assignee: Option<Uuid>,

        /// Earliest due date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// Latest due date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,
    },
    /// Show one occurrence
    Show {
        /// Occurrence ID (full UUID or unique prefix)
        id: String,
    },
    /// Mark an occurrence done and schedule the next one
    Complete {
        /// Occurrence ID (full UUID or unique prefix)
        id: String,
    },
    /// Skip an occurrence with a reason and schedule the next one
    Skip {
        /// Occurrence ID (full UUID or unique prefix)
        id: String,

        /// Why the chore is skipped
        #[arg(long)]
        reason: String,
    },
    /// Change the due date or assignees of an open occurrence
    Update {
        /// Occurrence ID (full UUID or unique prefix)
        id: String,

        /// New due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,

        /// Replace assignees (comma-separated user IDs)
        #[arg(long, value_delimiter = ',', conflicts_with = "unassign")]
        assignees: Option<Vec<Uuid>>,

        /// Remove every assignee
        #[arg(long)]
        unassign: bool,
    },
    /// Add a comment to an occurrence
    Comment {
        /// Occurrence ID (full UUID or unique prefix)
        id: String,

        /// Comment text
        text: String,
    },
    /// Show the audit history of an occurrence
    History {
        /// Occurrence ID (full UUID or unique prefix)
        id: String,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct OccurrenceListOutput {
    pub occurrences: Vec<TaskOccurrence>,
    pub total: usize,
}

impl OccurrenceListOutput {
    pub fn new(occurrences: Vec<TaskOccurrence>) -> Self {
        Self {
            total: occurrences.len(),
            occurrences,
        }
    }
}

impl CommandOutput for OccurrenceListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["ID", "Task", "Due", "Status", "Assignees"]);
        for occ in &self.occurrences {
            let assignees: Vec<String> = occ.assignee_ids.iter().map(short_id).collect();
            table.add_row(vec![
                short_id(&occ.id),
                short_id(&occ.task_id),
                occ.due_date.to_string(),
                status_label(occ.status),
                truncate(&assignees.join(","), 30),
            ]);
        }
        render_list("occurrence", table, self.total)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

fn status_label(status: OccurrenceStatus) -> String {
    let label = status.as_str();
    match status {
        OccurrenceStatus::Completed => style(label).green().to_string(),
        OccurrenceStatus::Skipped => style(label).yellow().to_string(),
        OccurrenceStatus::Deleted => style(label).dim().to_string(),
        OccurrenceStatus::Created | OccurrenceStatus::Assigned => label.to_string(),
    }
}

#[derive(Debug, serde::Serialize)]
pub struct OccurrenceOutput {
    pub occurrence: TaskOccurrence,
}

impl CommandOutput for OccurrenceOutput {
    fn to_human(&self) -> String {
        let occ = &self.occurrence;
        let mut lines = vec![
            format!("Occurrence: {}", occ.id),
            format!("Task: {}", occ.task_id),
            format!("Due: {}", occ.due_date),
            format!("Status: {}", status_label(occ.status)),
        ];
        if !occ.assignee_ids.is_empty() {
            let ids: Vec<String> = occ.assignee_ids.iter().map(Uuid::to_string).collect();
            lines.push(format!("Assignees: {}", ids.join(", ")));
        }
        if let Some(at) = occ.completed_at {
            lines.push(format!("Completed: {}", at.to_rfc3339()));
        }
        if let Some(at) = occ.skipped_at {
            lines.push(format!("Skipped: {}", at.to_rfc3339()));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct TransitionOutput {
    pub success: bool,
    pub occurrence: TaskOccurrence,
    pub next: Option<TaskOccurrence>,
}

impl From<TransitionOutcome> for TransitionOutput {
    fn from(outcome: TransitionOutcome) -> Self {
        Self {
            success: true,
            occurrence: outcome.occurrence,
            next: outcome.next,
        }
    }
}

impl CommandOutput for TransitionOutput {
    fn to_human(&self) -> String {
        let mut line = format!(
            "Occurrence {} due {} is now {}",
            short_id(&self.occurrence.id),
            self.occurrence.due_date,
            status_label(self.occurrence.status)
        );
        if let Some(next) = &self.next {
            line.push_str(&format!("\nNext occurrence due {} ({})", next.due_date, short_id(&next.id)));
        }
        line
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct HistoryOutput {
    pub occurrence_id: Uuid,
    pub entries: Vec<HistoryEntry>,
}

impl CommandOutput for HistoryOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["When", "User", "Type", "Change", "Comment"]);
        for entry in &self.entries {
            let change = match entry.log_type {
                HistoryLogType::Comment => String::new(),
                _ => format!(
                    "{} -> {}",
                    entry.old_value.as_deref().unwrap_or("-"),
                    entry.new_value.as_deref().unwrap_or("-")
                ),
            };
            table.add_row(vec![
                entry.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                short_id(&entry.user_id),
                entry.log_type.as_str().to_string(),
                truncate(&change, 40),
                truncate(entry.comment.as_deref().unwrap_or(""), 50),
            ]);
        }
        render_list("history event", table, self.entries.len())
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct CommentOutput {
    pub success: bool,
    pub entry: HistoryEntry,
}

impl CommandOutput for CommentOutput {
    fn to_human(&self) -> String {
        format!("Comment added to occurrence {}", short_id(&self.entry.occurrence_id))
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: OccurrenceArgs, ctx: &CommandContext) -> Result<()> {
    let app = App::open(&ctx.config).await?;
    run(args, &app, ctx).await
}

async fn run(args: OccurrenceArgs, app: &App, ctx: &CommandContext) -> Result<()> {
    match args.command {
        OccurrenceCommands::List {
            task,
            status,
            assignee,
            from,
            to,
        } => {
            let task_id = match task {
                Some(prefix) => Some(resolve_task_id(&app.pool, &prefix).await?),
                None => None,
            };
            let status = status
                .map(|s| OccurrenceStatus::from_str(&s).with_context(|| format!("Invalid status '{}'", s)))
                .transpose()?;
            let filter = OccurrenceFilter {
                task_id,
                status,
                assignee_id: assignee,
                due_from: from.as_deref().map(parse_cli_date).transpose()?,
                due_to: to.as_deref().map(parse_cli_date).transpose()?,
            };
            let occurrences = app.occurrences.list(filter).await?;
            output(&OccurrenceListOutput::new(occurrences), ctx.json);
        }

        OccurrenceCommands::Show { id } => {
            let occurrence_id = resolve_occurrence_id(&app.pool, &id).await?;
            let occurrence = app.lifecycle.get(occurrence_id).await?;
            output(&OccurrenceOutput { occurrence }, ctx.json);
        }

        OccurrenceCommands::Complete { id } => {
            let occurrence_id = resolve_occurrence_id(&app.pool, &id).await?;
            let outcome = app.lifecycle.complete(occurrence_id, ctx.user).await?;
            output(&TransitionOutput::from(outcome), ctx.json);
        }

        OccurrenceCommands::Skip { id, reason } => {
            let occurrence_id = resolve_occurrence_id(&app.pool, &id).await?;
            let outcome = app.lifecycle.skip(occurrence_id, ctx.user, &reason).await?;
            output(&TransitionOutput::from(outcome), ctx.json);
        }

        OccurrenceCommands::Update {
            id,
            due,
            assignees,
            unassign,
        } => {
            let occurrence_id = resolve_occurrence_id(&app.pool, &id).await?;
            let update = OccurrenceUpdate {
                due_date: due.as_deref().map(parse_cli_date).transpose()?,
                assignee_ids: if unassign { Some(Vec::new()) } else { assignees },
            };
            let occurrence = app.lifecycle.update(occurrence_id, ctx.user, update).await?;
            output(&OccurrenceOutput { occurrence }, ctx.json);
        }

        OccurrenceCommands::Comment { id, text } => {
            let occurrence_id = resolve_occurrence_id(&app.pool, &id).await?;
            let entry = app.lifecycle.add_comment(occurrence_id, ctx.user, &text).await?;
            output(&CommentOutput { success: true, entry }, ctx.json);
        }

        OccurrenceCommands::History { id } => {
            let occurrence_id = resolve_occurrence_id(&app.pool, &id).await?;
            let entries = app.lifecycle.history(occurrence_id).await?;
            output(&HistoryOutput { occurrence_id, entries }, ctx.json);
        }
    }

    Ok(())
}

fn parse_cli_date(raw: &str) -> Result<chrono::NaiveDate> {
    parse_date(raw).with_context(|| format!("Invalid date '{}'. Use YYYY-MM-DD", raw))
}
