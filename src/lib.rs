//! Chorecast - recurring household chore scheduler
//!
//! Chorecast turns declarative recurrence rules ("every 2 weeks", "the last
//! Friday of each month", "7 days after it was last done") into dated
//! occurrences, keeps a rolling horizon of them materialized, and tracks
//! each occurrence through completion, skipping, and reassignment with a
//! full audit history.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, port traits, and errors
//! - **Service Layer** (`services`): schedule calculation, end conditions,
//!   occurrence generation, lifecycle transitions, and batch runs
//! - **Adapters** (`adapters`): SQLite and in-memory port implementations
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use chrono::NaiveDate;
//! use chorecast::domain::models::{EndCondition, IntervalUnit, ScheduleConfig};
//! use chorecast::services::ScheduleCalculator;
//!
//! let schedule = ScheduleConfig::FixedInterval {
//!     interval: 1,
//!     unit: IntervalUnit::Month,
//!     end_condition: EndCondition::Never,
//! };
//! let jan_31 = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
//! let next = ScheduleCalculator::default().next_due_date(&schedule, Some(jan_31), jan_31);
//! assert_eq!(next, NaiveDate::from_ymd_opt(2024, 2, 29));
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use adapters::sqlite::{SqliteOccurrenceRepository, SqliteTaskRepository};
pub use adapters::InMemoryStore;
pub use domain::models::{
    Config, EndCondition, HistoryEntry, IntervalUnit, OccurrenceStatus, Ordinal, ScheduleConfig,
    TaskDefinition, TaskOccurrence, TaskStatus,
};
pub use domain::ports::{Clock, HistoryLog, OccurrenceStore, SystemClock, TaskLookup, TaskRepository};
pub use domain::{DomainError, DomainResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    HorizonRunner, OccurrenceGenerator, OccurrenceLifecycle, ScheduleCalculator, SchedulerDaemon,
};
