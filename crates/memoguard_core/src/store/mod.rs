mod collection;
mod history;

pub use collection::TaskCollection;

use crate::error::AppError;
use crate::model::{CareTask, HistoryPatch, TaskDraft, TaskHistory, TaskPatch, TaskStatus};
use crate::source::TaskSource;
use crate::storage::json_store::{self, StoredState};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Success,
    Error,
}

impl LoadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Owns the current [`TaskCollection`] and its on-disk copy.
///
/// Nothing is written until [`TaskStore::save`] is called. Saving refuses to
/// overwrite a file that another writer moved past the version this store
/// was opened at.
#[derive(Debug)]
pub struct TaskStore {
    path: Option<PathBuf>,
    snapshot: TaskCollection,
    persisted_version: u64,
    state: LoadState,
    error: Option<AppError>,
}

impl TaskStore {
    pub fn open(path: &Path) -> Result<Self, AppError> {
        let stored = json_store::load_state(path)?.unwrap_or_default();
        let state = if stored.tasks.is_empty() {
            LoadState::Idle
        } else {
            LoadState::Success
        };
        Ok(Self {
            path: Some(path.to_path_buf()),
            persisted_version: stored.version,
            snapshot: TaskCollection::new(stored.version, stored.tasks),
            state,
            error: None,
        })
    }

    pub fn in_memory(tasks: Vec<CareTask>) -> Self {
        let state = if tasks.is_empty() {
            LoadState::Idle
        } else {
            LoadState::Success
        };
        Self {
            path: None,
            snapshot: TaskCollection::new(0, tasks),
            persisted_version: 0,
            state,
            error: None,
        }
    }

    pub fn snapshot(&self) -> &TaskCollection {
        &self.snapshot
    }

    pub fn list_tasks(&self) -> &[CareTask] {
        self.snapshot.tasks()
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn error(&self) -> Option<&AppError> {
        self.error.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.snapshot.version() != self.persisted_version
    }

    /// Replaces the snapshot with whatever `source` returns. A failed fetch
    /// keeps the last good snapshot; the error is only surfaced when there is
    /// nothing to fall back to.
    pub fn fetch(&mut self, source: &dyn TaskSource) -> LoadState {
        self.state = LoadState::Loading;
        self.error = None;

        match source
            .list_tasks()
            .and_then(|tasks| self.snapshot.replaced(tasks))
        {
            Ok(next) => {
                log::info!("fetched {} tasks from {}", next.len(), source.name());
                self.snapshot = next;
                self.state = LoadState::Success;
            }
            Err(err) if !self.snapshot.is_empty() => {
                log::warn!(
                    "fetch from {} failed, keeping {} cached tasks: {}",
                    source.name(),
                    self.snapshot.len(),
                    err
                );
                self.state = LoadState::Success;
            }
            Err(err) => {
                log::error!("fetch from {} failed: {}", source.name(), err);
                self.state = LoadState::Error;
                self.error = Some(err);
            }
        }

        self.state
    }

    pub fn get_task(&self, id: &str) -> Result<&CareTask, AppError> {
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(AppError::invalid_input("id is required"));
        }
        self.snapshot
            .get(trimmed)
            .ok_or_else(|| AppError::not_found("task not found"))
    }

    pub fn add_task(&mut self, draft: &TaskDraft, now: OffsetDateTime) -> Result<CareTask, AppError> {
        let (next, task) = self.snapshot.with_task_added(draft, now)?;
        self.commit(next);
        Ok(task)
    }

    pub fn update_task(&mut self, id: &str, patch: &TaskPatch) -> Result<CareTask, AppError> {
        let (next, task) = self.snapshot.with_task_updated(id, patch)?;
        self.commit(next);
        Ok(task)
    }

    pub fn remove_task(&mut self, id: &str) -> Result<CareTask, AppError> {
        let (next, task) = self.snapshot.without_task(id)?;
        self.commit(next);
        Ok(task)
    }

    pub fn mark_completed(&mut self, id: &str, now: OffsetDateTime) -> Result<CareTask, AppError> {
        let (next, task) = self.snapshot.with_completion(id, now)?;
        self.commit(next);
        Ok(task)
    }

    pub fn add_reminder_entry(
        &mut self,
        id: &str,
        status: TaskStatus,
        timestamp: &str,
    ) -> Result<(CareTask, TaskHistory), AppError> {
        let (next, task, entry) = self.snapshot.with_history_entry(id, status, timestamp)?;
        self.commit(next);
        Ok((task, entry))
    }

    pub fn update_reminder_entry(
        &mut self,
        id: &str,
        timestamp: &str,
        patch: &HistoryPatch,
    ) -> Result<CareTask, AppError> {
        let (next, task) = self.snapshot.with_history_updated(id, timestamp, patch)?;
        self.commit(next);
        Ok(task)
    }

    pub fn remove_reminder_entry(&mut self, id: &str, timestamp: &str) -> Result<CareTask, AppError> {
        let (next, task) = self.snapshot.without_history_entry(id, timestamp)?;
        self.commit(next);
        Ok(task)
    }

    pub fn save(&mut self) -> Result<(), AppError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };

        if let Some(on_disk) = json_store::load_state(path)?
            && on_disk.version != self.persisted_version
        {
            return Err(AppError::invalid_data(format!(
                "store changed on disk (version {} != {})",
                on_disk.version, self.persisted_version
            )));
        }

        json_store::save_state(
            path,
            &StoredState {
                version: self.snapshot.version(),
                tasks: self.snapshot.tasks().to_vec(),
            },
        )?;
        self.persisted_version = self.snapshot.version();
        Ok(())
    }

    fn commit(&mut self, next: TaskCollection) {
        log::debug!(
            "task collection version {} -> {}",
            self.snapshot.version(),
            next.version()
        );
        self.snapshot = next;
        self.state = LoadState::Success;
    }
}
