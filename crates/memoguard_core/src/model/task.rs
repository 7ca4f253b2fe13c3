use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_REMINDER_LEAD: u32 = 15;
pub const DEFAULT_CHANNEL: &str = "app";
pub const DEFAULT_CATEGORY: &str = "custom";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Completed,
    Skipped,
    Snoozed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
            Self::Snoozed => "snoozed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "skipped" => Some(Self::Skipped),
            "snoozed" => Some(Self::Snoozed),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recurrence label. Callers are not held to the known set, so anything else
/// is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Frequency {
    Once,
    Daily,
    Weekly,
    Monthly,
    Custom,
    Other(String),
}

impl Frequency {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Once => "once",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Custom => "custom",
            Self::Other(value) => value,
        }
    }
}

impl From<String> for Frequency {
    fn from(value: String) -> Self {
        match value.trim() {
            "once" => Self::Once,
            "daily" => Self::Daily,
            "weekly" => Self::Weekly,
            "monthly" => Self::Monthly,
            "custom" => Self::Custom,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for Frequency {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<Frequency> for String {
    fn from(value: Frequency) -> Self {
        match value {
            Frequency::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskHistory {
    pub status: TaskStatus,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CareTask {
    pub id: String,
    pub title: String,
    pub category: String,
    pub frequency: Frequency,
    pub start_at: String,
    #[serde(default)]
    pub end_at: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    pub reminder_lead: u32,
    #[serde(default)]
    pub reminder_channel: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status_history: Vec<TaskHistory>,
}

impl CareTask {
    pub fn primary_channel(&self) -> &str {
        self.reminder_channel
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_CHANNEL)
    }

    pub fn latest_status(&self) -> Option<TaskStatus> {
        self.status_history.last().map(|entry| entry.status)
    }
}

/// Input of the caregiver's add-task form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub start_at: String,
    pub frequency: String,
    pub notes: Option<String>,
    pub category: Option<String>,
    pub priority: Option<Priority>,
    pub reminder_lead: Option<u32>,
    pub reminder_channel: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub category: Option<String>,
    pub frequency: Option<String>,
    pub start_at: Option<String>,
    /// `Some(None)` clears the horizon.
    pub end_at: Option<Option<String>>,
    pub priority: Option<Priority>,
    pub reminder_lead: Option<u32>,
    pub reminder_channel: Option<Vec<String>>,
    pub notes: Option<String>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryPatch {
    pub status: Option<TaskStatus>,
    pub timestamp: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{CareTask, Frequency, Priority, TaskStatus};

    #[test]
    fn frequency_keeps_unknown_values() {
        let parsed: Frequency = serde_json::from_str("\"every other tuesday\"").unwrap();
        assert_eq!(parsed, Frequency::Other("every other tuesday".into()));
        assert_eq!(
            serde_json::to_string(&parsed).unwrap(),
            "\"every other tuesday\""
        );

        let weekly: Frequency = serde_json::from_str("\"weekly\"").unwrap();
        assert_eq!(weekly, Frequency::Weekly);
    }

    #[test]
    fn task_defaults_missing_optional_fields() {
        let content = serde_json::json!({
            "id": "t-1",
            "title": "walk",
            "category": "companionship",
            "frequency": "daily",
            "start_at": "2025-09-01T08:00:00+08:00",
            "reminder_lead": 30
        });

        let task: CareTask = serde_json::from_value(content).unwrap();

        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.end_at, None);
        assert!(task.status_history.is_empty());
        assert_eq!(task.primary_channel(), "app");
        assert_eq!(task.latest_status(), None);
    }

    #[test]
    fn negative_reminder_lead_is_rejected() {
        let content = serde_json::json!({
            "id": "t-1",
            "title": "walk",
            "category": "companionship",
            "frequency": "daily",
            "start_at": "2025-09-01T08:00:00+08:00",
            "reminder_lead": -5
        });

        assert!(serde_json::from_value::<CareTask>(content).is_err());
    }

    #[test]
    fn status_parse_is_case_insensitive() {
        assert_eq!(TaskStatus::parse(" Snoozed "), Some(TaskStatus::Snoozed));
        assert_eq!(TaskStatus::parse("in_progress"), None);
        assert_eq!(Priority::parse("HIGH"), Some(Priority::High));
    }
}
