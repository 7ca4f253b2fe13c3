use crate::model::TaskStatus;
use serde::Serialize;

/// Computed preview of a task's next reminder. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderSlot {
    pub id: String,
    pub task_id: String,
    pub title: String,
    pub trigger_at: String,
    pub channel: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderLogEntry {
    pub task_id: String,
    pub title: String,
    pub status: TaskStatus,
    pub timestamp: String,
}
