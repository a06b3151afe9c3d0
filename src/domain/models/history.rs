//! Occurrence history (audit log) domain model.
//!
//! History entries are append-only. Every lifecycle transition writes at
//! least one entry in the same unit of work as the state change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::occurrence::OccurrenceStatus;

/// Kind of history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryLogType {
    StatusChange,
    Comment,
    AssignmentChange,
    DateChange,
}

impl HistoryLogType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StatusChange => "status_change",
            Self::Comment => "comment",
            Self::AssignmentChange => "assignment_change",
            Self::DateChange => "date_change",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "status_change" => Some(Self::StatusChange),
            "comment" => Some(Self::Comment),
            "assignment_change" => Some(Self::AssignmentChange),
            "date_change" => Some(Self::DateChange),
            _ => None,
        }
    }
}

/// One audit entry attached to an occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub occurrence_id: Uuid,
    pub user_id: Uuid,
    pub log_type: HistoryLogType,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    fn new(occurrence_id: Uuid, user_id: Uuid, log_type: HistoryLogType, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            occurrence_id,
            user_id,
            log_type,
            old_value: None,
            new_value: None,
            comment: None,
            created_at: at,
        }
    }

    /// Status change; `from` is `None` when the occurrence is first created.
    pub fn status_change(
        occurrence_id: Uuid,
        user_id: Uuid,
        from: Option<OccurrenceStatus>,
        to: OccurrenceStatus,
        at: DateTime<Utc>,
    ) -> Self {
        let mut entry = Self::new(occurrence_id, user_id, HistoryLogType::StatusChange, at);
        entry.old_value = from.map(|s| s.as_str().to_string());
        entry.new_value = Some(to.as_str().to_string());
        entry
    }

    pub fn comment(occurrence_id: Uuid, user_id: Uuid, text: impl Into<String>, at: DateTime<Utc>) -> Self {
        let mut entry = Self::new(occurrence_id, user_id, HistoryLogType::Comment, at);
        entry.comment = Some(text.into());
        entry
    }

    pub fn date_change(
        occurrence_id: Uuid,
        user_id: Uuid,
        old: impl ToString,
        new: impl ToString,
        at: DateTime<Utc>,
    ) -> Self {
        let mut entry = Self::new(occurrence_id, user_id, HistoryLogType::DateChange, at);
        entry.old_value = Some(old.to_string());
        entry.new_value = Some(new.to_string());
        entry
    }

    /// Assignment change; assignee lists are stored as JSON arrays.
    pub fn assignment_change(
        occurrence_id: Uuid,
        user_id: Uuid,
        old: &[Uuid],
        new: &[Uuid],
        at: DateTime<Utc>,
    ) -> Self {
        let mut entry = Self::new(occurrence_id, user_id, HistoryLogType::AssignmentChange, at);
        entry.old_value = serde_json::to_string(old).ok();
        entry.new_value = serde_json::to_string(new).ok();
        entry
    }

    pub fn with_comment(mut self, text: impl Into<String>) -> Self {
        self.comment = Some(text.into());
        self
    }
}

/// Acting user recorded for entries written by the background scheduler.
pub const SYSTEM_USER_ID: Uuid = Uuid::nil();
