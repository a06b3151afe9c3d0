//! End-condition evaluation.
//!
//! Decides whether a recurrence has ended, judged against the candidate
//! next due date (never the wall clock) and the total number of
//! occurrences including the one about to be created.

use chrono::NaiveDate;
use tracing::warn;

use crate::domain::models::{EndCondition, ScheduleConfig};

/// Outcome of evaluating an end condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndEvaluation {
    /// The candidate may be created.
    Continue,
    /// The recurrence has ended; the candidate must not be created.
    Ended,
    /// The end condition is unusable and was ignored (non-ending).
    InvalidEndCondition,
}

impl EndEvaluation {
    pub fn is_ended(&self) -> bool {
        matches!(self, Self::Ended)
    }
}

/// Evaluate a schedule's end condition.
///
/// `occurrence_count` counts the candidate itself, so a `times` condition
/// ends only once the count exceeds `times`: with `times: 3` a third
/// candidate (count 3) is still admitted and a fourth (count 4) is not.
/// This yields exactly `times` occurrences. A `date` condition ends the
/// recurrence when the candidate falls on or after the end date; with no
/// candidate only the count can end it.
pub fn evaluate(
    config: &ScheduleConfig,
    occurrence_count: u64,
    candidate: Option<NaiveDate>,
) -> EndEvaluation {
    match config.end_condition() {
        EndCondition::Never => EndEvaluation::Continue,
        EndCondition::Times { times } => {
            if occurrence_count > u64::from(*times) {
                EndEvaluation::Ended
            } else {
                EndEvaluation::Continue
            }
        }
        EndCondition::Date { date: Some(end) } => match candidate {
            Some(candidate) if candidate >= *end => EndEvaluation::Ended,
            _ => EndEvaluation::Continue,
        },
        EndCondition::Date { date: None } => EndEvaluation::InvalidEndCondition,
    }
}

/// Whether the recurrence has ended, with the counting rule of
/// [`evaluate`]: `has_ended(times: 3, 3, _)` is `false` because the count
/// includes the candidate being admitted. Invalid end dates never end a
/// recurrence; they are reported as a data-quality warning instead.
pub fn has_ended(config: &ScheduleConfig, occurrence_count: u64, candidate: Option<NaiveDate>) -> bool {
    match evaluate(config, occurrence_count, candidate) {
        EndEvaluation::InvalidEndCondition => {
            warn!(
                kind = config.as_str(),
                "Invalid end condition date; treating schedule as non-ending"
            );
            false
        }
        outcome => outcome.is_ended(),
    }
}
