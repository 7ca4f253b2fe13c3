mod reminder;
mod task;

pub use reminder::{ReminderLogEntry, ReminderSlot};
pub use task::{
    CareTask, Frequency, HistoryPatch, Priority, TaskDraft, TaskHistory, TaskPatch, TaskStatus,
    DEFAULT_CATEGORY, DEFAULT_CHANNEL, DEFAULT_REMINDER_LEAD,
};
