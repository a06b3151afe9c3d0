//! Port for the occurrence audit log.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::HistoryEntry;

/// Append-only history of occurrence events. Entries are never mutated or deleted.
#[async_trait]
pub trait HistoryLog: Send + Sync {
    /// Append a standalone entry (comments). Transition entries are written
    /// by `OccurrenceStore` in the same transaction as the state change.
    async fn append(&self, entry: &HistoryEntry) -> DomainResult<()>;

    /// Entries for one occurrence, oldest first.
    async fn for_occurrence(&self, occurrence_id: Uuid) -> DomainResult<Vec<HistoryEntry>>;
}
