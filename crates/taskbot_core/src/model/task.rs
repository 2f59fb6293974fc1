use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A reminder owned by one chat participant.
///
/// Field names on disk follow the bot's existing `data.json` layout, so a
/// store written by earlier deployments loads unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub description: String,
    /// Fire time for one-shot tasks, anchor for recurring ones.
    #[serde(rename = "dueDate", with = "time::serde::rfc3339")]
    pub due_date: OffsetDateTime,
    #[serde(rename = "recurrenceInterval", default)]
    pub recurrence_interval_minutes: Option<u32>,
    #[serde(rename = "lastReminded", default, with = "time::serde::rfc3339::option")]
    pub last_reminded_at: Option<OffsetDateTime>,
    #[serde(rename = "reminderSent", default)]
    pub reminder_sent: bool,
    #[serde(rename = "isCompleted", default)]
    pub is_completed: bool,
    #[serde(rename = "userJid")]
    pub owner_id: String,
}

impl Task {
    pub fn is_recurring(&self) -> bool {
        self.recurrence_interval_minutes.is_some()
    }

    pub fn is_pending_for(&self, owner_id: &str) -> bool {
        self.owner_id == owner_id && !self.is_completed
    }
}
