//! Command-line interface.

pub mod commands;
pub mod id_resolver;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use uuid::Uuid;

use crate::domain::errors::DomainError;

#[derive(Parser)]
#[command(name = "chorecast")]
#[command(about = "Recurring household chore scheduler", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Output results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file to use instead of .chorecast/config.yaml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// User recorded as the actor in occurrence history
    #[arg(long, global = true, env = "CHORECAST_USER", default_value_t = Uuid::nil())]
    pub user: Uuid,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a chorecast project in the current directory
    Init(commands::init::InitArgs),
    /// Manage chore definitions
    Task(commands::task::TaskArgs),
    /// Work with dated chore occurrences
    Occurrence(commands::occurrence::OccurrenceArgs),
    /// Run horizon generation
    Scheduler(commands::scheduler::SchedulerArgs),
}

/// Error category for scripted callers.
fn error_kind(err: &anyhow::Error) -> &'static str {
    match err.downcast_ref::<DomainError>() {
        Some(e) if e.is_not_found() => "not_found",
        Some(DomainError::ValidationFailed(_)) => "validation_failed",
        Some(e) if e.is_invalid_transition() => "invalid_state_transition",
        Some(e) if e.is_conflict() => "concurrency_conflict",
        Some(_) => "internal",
        None => "error",
    }
}

/// Print an error to stderr and exit non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let body = serde_json::json!({
            "success": false,
            "kind": error_kind(&err),
            "error": format!("{:#}", err),
        });
        eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {:#}", style("Error:").red().bold(), err);
    }
    std::process::exit(1)
}
