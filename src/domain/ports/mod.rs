//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the async trait interfaces the scheduling core consumes:
//! - TaskLookup / TaskRepository: read access to task definitions (writable
//!   only for the task-management side)
//! - OccurrenceStore: occurrence persistence with a uniqueness guarantee on
//!   task + due date and atomic state-plus-history writes
//! - HistoryLog: append-only occurrence audit log
//! - Clock: source of "now" for the services
//!
//! These traits keep the calculator, generator, and lifecycle manager
//! independent of any storage technology.

pub mod clock;
pub mod history_log;
pub mod occurrence_store;
pub mod task_lookup;

pub use clock::{Clock, FixedClock, SystemClock};
pub use history_log::HistoryLog;
pub use occurrence_store::OccurrenceStore;
pub use task_lookup::{TaskLookup, TaskRepository};
