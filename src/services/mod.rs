pub mod end_condition;
pub mod horizon_runner;
pub mod occurrence_generator;
pub mod occurrence_lifecycle;
pub mod schedule_calculator;

pub use end_condition::{has_ended, EndEvaluation};
pub use horizon_runner::{BatchReport, HorizonRunner, SchedulerDaemon, TaskFailure};
pub use occurrence_generator::{
    GenerationContext, GenerationReport, NextAnchor, OccurrenceGenerator, StopReason,
};
pub use occurrence_lifecycle::{OccurrenceLifecycle, OccurrenceUpdate, TaskStatusChange, TransitionOutcome};
pub use schedule_calculator::ScheduleCalculator;
