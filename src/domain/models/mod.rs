pub mod config;
pub mod history;
pub mod occurrence;
pub mod schedule;
pub mod task;

pub use config::{Config, DatabaseConfig, LoggingConfig, SchedulerConfig};
pub use history::{HistoryEntry, HistoryLogType, SYSTEM_USER_ID};
pub use occurrence::{CreateOutcome, OccurrenceFilter, OccurrenceStatus, TaskOccurrence};
pub use schedule::{EndCondition, IntervalUnit, Ordinal, ScheduleConfig};
pub use task::{TaskDefinition, TaskEntry, TaskStatus, UnreadableTask};
