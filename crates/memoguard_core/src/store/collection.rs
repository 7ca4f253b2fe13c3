use crate::clock::{parse_input_timestamp, parse_timestamp};
use crate::error::AppError;
use crate::model::{
    CareTask, DEFAULT_CATEGORY, DEFAULT_CHANNEL, DEFAULT_REMINDER_LEAD, Frequency, HistoryPatch,
    ReminderLogEntry, TaskDraft, TaskHistory, TaskPatch, TaskStatus,
};
use crate::store::history;
use time::{OffsetDateTime, UtcOffset};

/// Versioned task snapshot. Reads borrow; every change yields a new
/// collection one version ahead and leaves `self` untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskCollection {
    version: u64,
    tasks: Vec<CareTask>,
}

impl TaskCollection {
    pub fn new(version: u64, tasks: Vec<CareTask>) -> Self {
        Self { version, tasks }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn tasks(&self) -> &[CareTask] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CareTask> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn replaced(&self, tasks: Vec<CareTask>) -> Result<Self, AppError> {
        let version = self
            .version
            .checked_add(1)
            .ok_or_else(|| AppError::invalid_data("task collection version overflow"))?;
        Ok(Self { version, tasks })
    }

    pub fn with_task_added(
        &self,
        draft: &TaskDraft,
        now: OffsetDateTime,
    ) -> Result<(Self, CareTask), AppError> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(AppError::invalid_input("title is required"));
        }
        parse_input_timestamp(&draft.start_at, "start_at")?;

        let frequency = match draft.frequency.trim() {
            "" => Frequency::Once,
            value => Frequency::from(value),
        };
        let category = draft
            .category
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_CATEGORY);
        let channels = match draft.reminder_channel.as_deref() {
            Some(channels) => clean_channels(channels),
            None => vec![DEFAULT_CHANNEL.to_string()],
        };

        let task = CareTask {
            id: self.next_id(now),
            title: title.to_string(),
            category: category.to_string(),
            frequency,
            start_at: draft.start_at.trim().to_string(),
            end_at: None,
            priority: draft.priority.unwrap_or_default(),
            reminder_lead: draft.reminder_lead.unwrap_or(DEFAULT_REMINDER_LEAD),
            reminder_channel: channels,
            notes: Some(draft.notes.clone().unwrap_or_default()),
            status_history: Vec::new(),
        };

        let mut tasks = Vec::with_capacity(self.tasks.len() + 1);
        tasks.push(task.clone());
        tasks.extend(self.tasks.iter().cloned());
        Ok((self.replaced(tasks)?, task))
    }

    pub fn with_task_updated(
        &self,
        id: &str,
        patch: &TaskPatch,
    ) -> Result<(Self, CareTask), AppError> {
        if patch.is_empty() {
            return Err(AppError::invalid_input("nothing to update"));
        }

        self.map_task(id, |task| {
            let mut updated = task.clone();
            if let Some(title) = patch.title.as_deref() {
                let trimmed = title.trim();
                if trimmed.is_empty() {
                    return Err(AppError::invalid_input("title is required"));
                }
                updated.title = trimmed.to_string();
            }
            if let Some(category) = patch.category.as_deref() {
                updated.category = category.trim().to_string();
            }
            if let Some(frequency) = patch.frequency.as_deref() {
                updated.frequency = Frequency::from(frequency.trim());
            }
            if let Some(start_at) = patch.start_at.as_deref() {
                parse_input_timestamp(start_at, "start_at")?;
                updated.start_at = start_at.trim().to_string();
            }
            if let Some(end_at) = patch.end_at.as_ref() {
                if let Some(value) = end_at.as_deref() {
                    parse_input_timestamp(value, "end_at")?;
                }
                updated.end_at = end_at.as_ref().map(|value| value.trim().to_string());
            }
            if let Some(priority) = patch.priority {
                updated.priority = priority;
            }
            if let Some(lead) = patch.reminder_lead {
                updated.reminder_lead = lead;
            }
            if let Some(channels) = patch.reminder_channel.as_deref() {
                updated.reminder_channel = clean_channels(channels);
            }
            if let Some(notes) = patch.notes.as_deref() {
                updated.notes = Some(notes.to_string());
            }
            Ok(updated)
        })
    }

    pub fn without_task(&self, id: &str) -> Result<(Self, CareTask), AppError> {
        let index = self.index_of(id)?;
        let mut tasks = self.tasks.clone();
        let removed = tasks.remove(index);
        Ok((self.replaced(tasks)?, removed))
    }

    pub fn with_completion(
        &self,
        id: &str,
        now: OffsetDateTime,
    ) -> Result<(Self, CareTask), AppError> {
        self.map_task(id, |task| {
            let (history, _) = history::insert_entry(&task.status_history, TaskStatus::Completed, now)?;
            Ok(with_history(task, history))
        })
    }

    pub fn with_history_entry(
        &self,
        id: &str,
        status: TaskStatus,
        timestamp: &str,
    ) -> Result<(Self, CareTask, TaskHistory), AppError> {
        let at = parse_input_timestamp(timestamp, "timestamp")?;
        let mut inserted = None;
        let (next, task) = self.map_task(id, |task| {
            let (history, entry) = history::insert_entry(&task.status_history, status, at)?;
            inserted = Some(entry);
            Ok(with_history(task, history))
        })?;
        let entry = inserted.ok_or_else(|| AppError::not_found("reminder entry not found"))?;
        Ok((next, task, entry))
    }

    pub fn with_history_updated(
        &self,
        id: &str,
        timestamp: &str,
        patch: &HistoryPatch,
    ) -> Result<(Self, CareTask), AppError> {
        if patch.status.is_none() && patch.timestamp.is_none() {
            return Err(AppError::invalid_input("nothing to update"));
        }
        let at = parse_input_timestamp(timestamp, "timestamp")?;
        let target = patch
            .timestamp
            .as_deref()
            .map(|value| parse_input_timestamp(value, "new timestamp"))
            .transpose()?;

        self.map_task(id, |task| {
            let (history, _) = history::update_entry(&task.status_history, at, patch, target)?;
            Ok(with_history(task, history))
        })
    }

    pub fn without_history_entry(
        &self,
        id: &str,
        timestamp: &str,
    ) -> Result<(Self, CareTask), AppError> {
        let at = parse_input_timestamp(timestamp, "timestamp")?;
        self.map_task(id, |task| {
            let (history, _) = history::remove_entry(&task.status_history, at)?;
            Ok(with_history(task, history))
        })
    }

    /// Tasks whose start falls on `now`'s calendar date in `offset`.
    pub fn scheduled_today(
        &self,
        now: OffsetDateTime,
        offset: UtcOffset,
    ) -> Result<Vec<&CareTask>, AppError> {
        let today = now.to_offset(offset).date();
        let mut matching = Vec::new();
        for task in &self.tasks {
            let start = parse_timestamp(&task.start_at, "start_at")?;
            if start.to_offset(offset).date() == today {
                matching.push(task);
            }
        }
        Ok(matching)
    }

    /// First `limit` tasks by start time.
    pub fn upcoming(&self, limit: usize) -> Result<Vec<&CareTask>, AppError> {
        let mut keyed = Vec::with_capacity(self.tasks.len());
        for task in &self.tasks {
            keyed.push((parse_timestamp(&task.start_at, "start_at")?, task));
        }
        keyed.sort_by_key(|(start, _)| *start);
        Ok(keyed.into_iter().take(limit).map(|(_, task)| task).collect())
    }

    /// Most recent `limit` status entries across all tasks, newest first.
    pub fn reminder_log(&self, limit: usize) -> Result<Vec<ReminderLogEntry>, AppError> {
        let mut entries = Vec::new();
        for task in &self.tasks {
            for entry in &task.status_history {
                let at = parse_timestamp(&entry.timestamp, "timestamp")?;
                entries.push((
                    at,
                    ReminderLogEntry {
                        task_id: task.id.clone(),
                        title: task.title.clone(),
                        status: entry.status,
                        timestamp: entry.timestamp.clone(),
                    },
                ));
            }
        }
        entries.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(entries
            .into_iter()
            .take(limit)
            .map(|(_, entry)| entry)
            .collect())
    }

    fn index_of(&self, id: &str) -> Result<usize, AppError> {
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(AppError::invalid_input("id is required"));
        }
        self.tasks
            .iter()
            .position(|task| task.id == trimmed)
            .ok_or_else(|| AppError::not_found("task not found"))
    }

    fn map_task<F>(&self, id: &str, mut change: F) -> Result<(Self, CareTask), AppError>
    where
        F: FnMut(&CareTask) -> Result<CareTask, AppError>,
    {
        let index = self.index_of(id)?;
        let updated = change(&self.tasks[index])?;
        let mut tasks = self.tasks.clone();
        tasks[index] = updated.clone();
        Ok((self.replaced(tasks)?, updated))
    }

    fn next_id(&self, now: OffsetDateTime) -> String {
        let mut millis = now.unix_timestamp_nanos() / 1_000_000;
        loop {
            let candidate = format!("t-{millis}");
            if self.get(&candidate).is_none() {
                return candidate;
            }
            millis += 1;
        }
    }
}

fn with_history(task: &CareTask, history: Vec<TaskHistory>) -> CareTask {
    CareTask {
        status_history: history,
        ..task.clone()
    }
}

fn clean_channels(channels: &[String]) -> Vec<String> {
    channels
        .iter()
        .map(|channel| channel.trim())
        .filter(|channel| !channel.is_empty())
        .map(str::to_string)
        .collect()
}
