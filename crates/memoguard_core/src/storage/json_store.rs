use crate::config::app_dir;
use crate::error::AppError;
use crate::model::CareTask;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SCHEMA_VERSION: u32 = 1;
const STORE_FILE_NAME: &str = "tasks.json";
const STORE_ENV_VAR: &str = "MEMOGUARD_STORE_PATH";

#[derive(Debug, Serialize, Deserialize)]
struct StoredTasks {
    schema_version: u32,
    #[serde(default)]
    version: u64,
    tasks: Vec<CareTask>,
}

/// Persisted snapshot: the task list plus the collection version it was
/// saved at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredState {
    pub version: u64,
    pub tasks: Vec<CareTask>,
}

pub fn store_path() -> Result<PathBuf, AppError> {
    match std::env::var(STORE_ENV_VAR) {
        Ok(path) if !path.trim().is_empty() => Ok(PathBuf::from(path)),
        _ => Ok(app_dir()?.join(STORE_FILE_NAME)),
    }
}

/// Returns `None` when nothing has been saved yet.
pub fn load_state(path: &Path) -> Result<Option<StoredState>, AppError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
    let stored: StoredTasks = serde_json::from_str(&content)
        .map_err(|err| AppError::invalid_data(format!("{}: {}", path.display(), err)))?;

    if !(1..=SCHEMA_VERSION).contains(&stored.schema_version) {
        return Err(AppError::invalid_data("schema_version mismatch"));
    }

    let mut seen = std::collections::HashSet::new();
    for task in &stored.tasks {
        if !seen.insert(task.id.as_str()) {
            return Err(AppError::invalid_data(format!(
                "duplicate task id '{}'",
                task.id
            )));
        }
    }

    log::debug!(
        "loaded {} tasks at version {} from {}",
        stored.tasks.len(),
        stored.version,
        path.display()
    );

    Ok(Some(StoredState {
        version: stored.version,
        tasks: stored.tasks,
    }))
}

pub fn save_state(path: &Path, state: &StoredState) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| AppError::io(err.to_string()))?;
    }

    let stored = StoredTasks {
        schema_version: SCHEMA_VERSION,
        version: state.version,
        tasks: state.tasks.clone(),
    };
    let content = serde_json::to_string_pretty(&stored)
        .map_err(|err| AppError::invalid_data(err.to_string()))?;
    std::fs::write(path, content).map_err(|err| AppError::io(err.to_string()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, permissions).map_err(|err| AppError::io(err.to_string()))?;
    }

    log::debug!(
        "saved {} tasks at version {} to {}",
        state.tasks.len(),
        state.version,
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{SCHEMA_VERSION, StoredState, load_state, save_state};
    use crate::model::{CareTask, Frequency, Priority, TaskHistory, TaskStatus};
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(file_name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("memoguard-{nanos}-{file_name}"))
    }

    fn sample_task() -> CareTask {
        CareTask {
            id: "t-001".to_string(),
            title: "morning choline".to_string(),
            category: "medication".to_string(),
            frequency: Frequency::Daily,
            start_at: "2025-09-01T08:00:00+08:00".to_string(),
            end_at: None,
            priority: Priority::High,
            reminder_lead: 15,
            reminder_channel: vec!["app".to_string()],
            notes: Some("after breakfast".to_string()),
            status_history: vec![TaskHistory {
                status: TaskStatus::Completed,
                timestamp: "2025-09-20T08:15:00+08:00".to_string(),
            }],
        }
    }

    #[test]
    fn missing_file_loads_as_none() {
        let path = temp_path("missing.json");
        assert_eq!(load_state(&path).unwrap(), None);
    }

    #[test]
    fn save_and_load_keeps_version_and_tasks() {
        let path = temp_path("tasks.json");
        let state = StoredState {
            version: 7,
            tasks: vec![sample_task()],
        };

        save_state(&path, &state).unwrap();
        let loaded = load_state(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(loaded, Some(state));
    }

    #[test]
    fn rejects_newer_schema() {
        let path = temp_path("bad-schema.json");
        let bad = format!(
            "{{\n  \"schema_version\": {},\n  \"tasks\": []\n}}",
            SCHEMA_VERSION + 1
        );
        fs::write(&path, bad).unwrap();

        let err = load_state(&path).unwrap_err();
        fs::remove_file(&path).ok();

        assert_eq!(err.code(), "invalid_data");
    }

    #[test]
    fn rejects_duplicate_ids() {
        let path = temp_path("duplicate.json");
        let content = serde_json::json!({
            "schema_version": 1,
            "version": 1,
            "tasks": [sample_task(), sample_task()]
        });
        fs::write(&path, content.to_string()).unwrap();

        let err = load_state(&path).unwrap_err();
        fs::remove_file(&path).ok();

        assert_eq!(err.code(), "invalid_data");
        assert!(err.message().contains("t-001"));
    }

    #[test]
    fn rejects_unknown_status() {
        let path = temp_path("bad-status.json");
        let content = "{\n  \"schema_version\": 1,\n  \"tasks\": [\n    {\n      \"id\": \"t-1\",\n      \"title\": \"demo\",\n      \"category\": \"custom\",\n      \"frequency\": \"once\",\n      \"start_at\": \"2025-12-20T00:00:00Z\",\n      \"reminder_lead\": 5,\n      \"status_history\": [{\"status\": \"lost\", \"timestamp\": \"2025-12-20T00:00:00Z\"}]\n    }\n  ]\n}";
        fs::write(&path, content).unwrap();

        let err = load_state(&path).unwrap_err();
        fs::remove_file(&path).ok();

        assert_eq!(err.code(), "invalid_data");
    }

    #[test]
    fn missing_version_defaults_to_zero() {
        let path = temp_path("no-version.json");
        fs::write(&path, "{\"schema_version\": 1, \"tasks\": []}").unwrap();

        let loaded = load_state(&path).unwrap().unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(loaded.version, 0);
        assert!(loaded.tasks.is_empty());
    }
}
