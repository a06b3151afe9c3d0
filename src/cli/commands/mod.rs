//! CLI command implementations.

pub mod init;
pub mod occurrence;
pub mod scheduler;
pub mod task;

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{initialize_database, SqliteOccurrenceRepository, SqliteTaskRepository};
use crate::domain::models::Config;
use crate::domain::ports::{Clock, SystemClock};
use crate::services::{HorizonRunner, OccurrenceGenerator, OccurrenceLifecycle};

/// Settings shared by every command invocation.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub config: Config,
    /// Acting user recorded in history entries.
    pub user: Uuid,
    pub json: bool,
}

/// Services wired against the configured SQLite database.
pub struct App {
    pub pool: SqlitePool,
    pub tasks: Arc<SqliteTaskRepository>,
    pub occurrences: Arc<SqliteOccurrenceRepository>,
    pub generator: Arc<OccurrenceGenerator<SqliteOccurrenceRepository>>,
    pub lifecycle: OccurrenceLifecycle<SqliteOccurrenceRepository, SqliteTaskRepository>,
    pub runner: Arc<HorizonRunner<SqliteOccurrenceRepository, SqliteTaskRepository>>,
}

impl App {
    /// Open the configured database, migrating it if needed.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = initialize_database(&config.database)
            .await
            .with_context(|| format!("Failed to open database at {}", config.database.path))?;
        Ok(Self::with_pool(pool, config, Arc::new(SystemClock)))
    }

    pub fn with_pool(pool: SqlitePool, config: &Config, clock: Arc<dyn Clock>) -> Self {
        let tasks = Arc::new(SqliteTaskRepository::new(pool.clone()));
        let occurrences = Arc::new(SqliteOccurrenceRepository::new(pool.clone()));
        let generator = Arc::new(
            OccurrenceGenerator::new(occurrences.clone(), clock).with_config(&config.scheduler),
        );
        let lifecycle = OccurrenceLifecycle::new(occurrences.clone(), tasks.clone(), generator.clone());
        let runner = Arc::new(HorizonRunner::new(generator.clone(), tasks.clone(), &config.scheduler));

        Self {
            pool,
            tasks,
            occurrences,
            generator,
            lifecycle,
            runner,
        }
    }
}
