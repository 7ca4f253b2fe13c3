use crate::error::AppError;
use crate::model::{CareTask, Frequency, Priority, TaskHistory, TaskStatus};
use crate::normalize::parse_remote_tasks;
use std::path::{Path, PathBuf};

/// Where a [`crate::store::TaskStore`] refreshes its tasks from.
pub trait TaskSource {
    fn name(&self) -> &str;

    fn list_tasks(&self) -> Result<Vec<CareTask>, AppError>;
}

/// Built-in fixtures used when no remote feed is configured.
pub struct SeedSource;

impl TaskSource for SeedSource {
    fn name(&self) -> &str {
        "seed"
    }

    fn list_tasks(&self) -> Result<Vec<CareTask>, AppError> {
        Ok(vec![CareTask {
            id: "t-001".to_string(),
            title: "Morning choline tablet".to_string(),
            category: "medication".to_string(),
            frequency: Frequency::Daily,
            start_at: "2025-09-01T08:00:00+08:00".to_string(),
            end_at: None,
            priority: Priority::High,
            reminder_lead: 15,
            reminder_channel: vec!["app".to_string()],
            notes: Some("Within 30 minutes after breakfast".to_string()),
            status_history: vec![TaskHistory {
                status: TaskStatus::Completed,
                timestamp: "2025-09-20T08:15:00+08:00".to_string(),
            }],
        }])
    }
}

/// A JSON export of the task API (`GET /tasks`).
pub struct RemoteFileSource {
    path: PathBuf,
    label: String,
}

impl RemoteFileSource {
    pub fn new(path: PathBuf) -> Self {
        let label = path.display().to_string();
        Self { path, label }
    }
}

impl TaskSource for RemoteFileSource {
    fn name(&self) -> &str {
        &self.label
    }

    fn list_tasks(&self) -> Result<Vec<CareTask>, AppError> {
        let value = read_json_file(&self.path)?;
        Ok(parse_remote_tasks(&value)?)
    }
}

/// Reads an exported JSON document, tolerating a leading BOM.
pub fn read_json_file(path: &Path) -> Result<serde_json::Value, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
    let content = content.trim_start_matches('\u{feff}');
    serde_json::from_str(content).map_err(|err| {
        AppError::invalid_data(format!("invalid JSON in {}: {}", path.display(), err))
    })
}
