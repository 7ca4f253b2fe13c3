use crate::clock::parse_timestamp;
use crate::error::AppError;
use crate::model::{
    CareTask, HistoryPatch, ReminderLogEntry, ReminderSlot, TaskDraft, TaskHistory, TaskPatch,
    TaskStatus,
};
use crate::notify::{LOCAL_CHANNEL, Notifier, notifier_from_env};
use crate::scheduler;
use crate::source::TaskSource;
use crate::storage::json_store;
use crate::store::{LoadState, TaskStore};
use std::path::Path;
use time::{Duration, OffsetDateTime, UtcOffset};

/// Length of the "upcoming tasks" and "reminder log" dashboard lists.
pub const DASHBOARD_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListView {
    All,
    Today,
    Upcoming,
}

#[derive(Debug)]
pub struct SyncOutcome {
    pub state: LoadState,
    pub tasks: Vec<CareTask>,
    /// Set when the source failed and cached tasks were kept.
    pub used_cache: bool,
}

#[derive(Debug)]
pub struct NotificationOutcome {
    pub delivered: Vec<ReminderSlot>,
    pub skipped: Vec<ReminderSlot>,
    pub failures: Vec<NotificationFailure>,
}

#[derive(Debug)]
pub struct NotificationFailure {
    pub slot_id: String,
    pub error: AppError,
}

pub fn add_task(draft: &TaskDraft, now: OffsetDateTime) -> Result<CareTask, AppError> {
    let path = json_store::store_path()?;
    add_task_with_path(&path, draft, now)
}

pub fn update_task(id: &str, patch: &TaskPatch) -> Result<CareTask, AppError> {
    let path = json_store::store_path()?;
    update_task_with_path(&path, id, patch)
}

pub fn remove_task(id: &str) -> Result<CareTask, AppError> {
    let path = json_store::store_path()?;
    remove_task_with_path(&path, id)
}

pub fn get_task(id: &str) -> Result<CareTask, AppError> {
    let path = json_store::store_path()?;
    get_task_with_path(&path, id)
}

pub fn complete_task(id: &str, now: OffsetDateTime) -> Result<CareTask, AppError> {
    let path = json_store::store_path()?;
    complete_task_with_path(&path, id, now)
}

pub fn list_tasks(
    view: ListView,
    now: OffsetDateTime,
    offset: UtcOffset,
) -> Result<Vec<CareTask>, AppError> {
    let path = json_store::store_path()?;
    list_tasks_with_path(&path, view, now, offset)
}

pub fn reminder_log(limit: usize) -> Result<Vec<ReminderLogEntry>, AppError> {
    let path = json_store::store_path()?;
    reminder_log_with_path(&path, limit)
}

pub fn upcoming_reminders(limit: usize, now: OffsetDateTime) -> Result<Vec<ReminderSlot>, AppError> {
    let path = json_store::store_path()?;
    upcoming_reminders_with_path(&path, limit, now)
}

pub fn add_reminder_entry(
    id: &str,
    status: TaskStatus,
    timestamp: &str,
) -> Result<(CareTask, TaskHistory), AppError> {
    let path = json_store::store_path()?;
    add_reminder_entry_with_path(&path, id, status, timestamp)
}

pub fn update_reminder_entry(
    id: &str,
    timestamp: &str,
    patch: &HistoryPatch,
) -> Result<CareTask, AppError> {
    let path = json_store::store_path()?;
    update_reminder_entry_with_path(&path, id, timestamp, patch)
}

pub fn remove_reminder_entry(id: &str, timestamp: &str) -> Result<CareTask, AppError> {
    let path = json_store::store_path()?;
    remove_reminder_entry_with_path(&path, id, timestamp)
}

pub fn sync_tasks(source: &dyn TaskSource) -> Result<SyncOutcome, AppError> {
    let path = json_store::store_path()?;
    sync_tasks_with_path(&path, source)
}

pub fn notify_due_reminders(
    now: OffsetDateTime,
    window_minutes: u32,
) -> Result<NotificationOutcome, AppError> {
    let path = json_store::store_path()?;
    let notifier = notifier_from_env()?;
    notify_due_reminders_with_path(&path, now, window_minutes, notifier.as_ref())
}

fn mutate<T, F>(path: &Path, change: F) -> Result<T, AppError>
where
    F: FnOnce(&mut TaskStore) -> Result<T, AppError>,
{
    let mut store = TaskStore::open(path)?;
    let result = change(&mut store)?;
    store.save()?;
    Ok(result)
}

fn add_task_with_path(
    path: &Path,
    draft: &TaskDraft,
    now: OffsetDateTime,
) -> Result<CareTask, AppError> {
    let task = mutate(path, |store| store.add_task(draft, now))?;
    log::info!("added task {} ({})", task.id, task.title);
    Ok(task)
}

fn update_task_with_path(path: &Path, id: &str, patch: &TaskPatch) -> Result<CareTask, AppError> {
    mutate(path, |store| store.update_task(id, patch))
}

fn remove_task_with_path(path: &Path, id: &str) -> Result<CareTask, AppError> {
    let task = mutate(path, |store| store.remove_task(id))?;
    log::info!("removed task {}", task.id);
    Ok(task)
}

fn get_task_with_path(path: &Path, id: &str) -> Result<CareTask, AppError> {
    TaskStore::open(path)?.get_task(id).cloned()
}

fn complete_task_with_path(
    path: &Path,
    id: &str,
    now: OffsetDateTime,
) -> Result<CareTask, AppError> {
    mutate(path, |store| store.mark_completed(id, now))
}

fn list_tasks_with_path(
    path: &Path,
    view: ListView,
    now: OffsetDateTime,
    offset: UtcOffset,
) -> Result<Vec<CareTask>, AppError> {
    let store = TaskStore::open(path)?;
    let snapshot = store.snapshot();
    let tasks = match view {
        ListView::All => snapshot.tasks().iter().collect(),
        ListView::Today => snapshot.scheduled_today(now, offset)?,
        ListView::Upcoming => snapshot.upcoming(DASHBOARD_LIMIT)?,
    };
    Ok(tasks.into_iter().cloned().collect())
}

fn reminder_log_with_path(path: &Path, limit: usize) -> Result<Vec<ReminderLogEntry>, AppError> {
    TaskStore::open(path)?.snapshot().reminder_log(limit)
}

fn upcoming_reminders_with_path(
    path: &Path,
    limit: usize,
    now: OffsetDateTime,
) -> Result<Vec<ReminderSlot>, AppError> {
    let store = TaskStore::open(path)?;
    scheduler::upcoming_reminders(store.list_tasks(), limit, now)
}

fn add_reminder_entry_with_path(
    path: &Path,
    id: &str,
    status: TaskStatus,
    timestamp: &str,
) -> Result<(CareTask, TaskHistory), AppError> {
    mutate(path, |store| store.add_reminder_entry(id, status, timestamp))
}

fn update_reminder_entry_with_path(
    path: &Path,
    id: &str,
    timestamp: &str,
    patch: &HistoryPatch,
) -> Result<CareTask, AppError> {
    mutate(path, |store| store.update_reminder_entry(id, timestamp, patch))
}

fn remove_reminder_entry_with_path(
    path: &Path,
    id: &str,
    timestamp: &str,
) -> Result<CareTask, AppError> {
    mutate(path, |store| store.remove_reminder_entry(id, timestamp))
}

fn sync_tasks_with_path(path: &Path, source: &dyn TaskSource) -> Result<SyncOutcome, AppError> {
    let mut store = TaskStore::open(path)?;
    let before = store.snapshot().version();

    let state = store.fetch(source);
    if state == LoadState::Error {
        return Err(store
            .error()
            .cloned()
            .unwrap_or_else(|| AppError::io(format!("fetch from {} failed", source.name()))));
    }

    let used_cache = store.snapshot().version() == before;
    if !used_cache {
        store.save()?;
    }

    Ok(SyncOutcome {
        state,
        tasks: store.list_tasks().to_vec(),
        used_cache,
    })
}

fn notify_due_reminders_with_path(
    path: &Path,
    now: OffsetDateTime,
    window_minutes: u32,
    notifier: &dyn Notifier,
) -> Result<NotificationOutcome, AppError> {
    let store = TaskStore::open(path)?;
    let tasks = store.list_tasks();
    let horizon = now + Duration::minutes(i64::from(window_minutes));
    let slots = scheduler::upcoming_reminders(tasks, tasks.len(), now)?;

    let mut outcome = NotificationOutcome {
        delivered: Vec::new(),
        skipped: Vec::new(),
        failures: Vec::new(),
    };

    for slot in slots {
        let trigger = parse_timestamp(&slot.trigger_at, "trigger_at")?;
        if trigger > horizon {
            // sorted ascending, nothing later can be due
            break;
        }

        if slot.channel != LOCAL_CHANNEL {
            log::info!(
                "reminder {} uses channel '{}', not delivered locally",
                slot.id,
                slot.channel
            );
            outcome.skipped.push(slot);
            continue;
        }

        match notifier.notify(&slot) {
            Ok(()) => outcome.delivered.push(slot),
            Err(err) => {
                log::warn!("reminder {} failed: {}", slot.id, err);
                outcome.failures.push(NotificationFailure {
                    slot_id: slot.id.clone(),
                    error: err,
                });
            }
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::{
        ListView, add_reminder_entry_with_path, add_task_with_path, complete_task_with_path,
        get_task_with_path, list_tasks_with_path, notify_due_reminders_with_path,
        reminder_log_with_path, remove_reminder_entry_with_path, remove_task_with_path,
        sync_tasks_with_path, update_reminder_entry_with_path, update_task_with_path,
        upcoming_reminders_with_path,
    };
    use crate::error::{AppError, ParseError};
    use crate::model::{
        CareTask, Frequency, HistoryPatch, Priority, ReminderSlot, TaskDraft, TaskPatch,
        TaskStatus,
    };
    use crate::notify::Notifier;
    use crate::source::{SeedSource, TaskSource};
    use crate::storage::json_store::{self, StoredState};
    use std::cell::RefCell;
    use std::path::{Path, PathBuf};
    use std::time::{SystemTime, UNIX_EPOCH};
    use time::format_description::well_known::Rfc3339;
    use time::macros::datetime;
    use time::{Duration, OffsetDateTime, UtcOffset};

    const NOW: OffsetDateTime = datetime!(2025-09-20 08:00 UTC);

    fn temp_path(file_name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("memoguard-{nanos}-{file_name}"))
    }

    fn task(id: &str, start: OffsetDateTime, lead: u32, channel: &str) -> CareTask {
        CareTask {
            id: id.to_string(),
            title: format!("title {id}"),
            category: "medication".to_string(),
            frequency: Frequency::Daily,
            start_at: start.format(&Rfc3339).unwrap(),
            end_at: None,
            priority: Priority::High,
            reminder_lead: lead,
            reminder_channel: vec![channel.to_string()],
            notes: None,
            status_history: Vec::new(),
        }
    }

    fn seed(path: &Path, tasks: Vec<CareTask>) {
        json_store::save_state(path, &StoredState { version: 1, tasks }).unwrap();
    }

    struct RecordingNotifier {
        seen: RefCell<Vec<String>>,
        fail_for: Option<String>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, slot: &ReminderSlot) -> Result<(), AppError> {
            if self.fail_for.as_deref() == Some(slot.task_id.as_str()) {
                return Err(AppError::io("bus unavailable"));
            }
            self.seen.borrow_mut().push(slot.task_id.clone());
            Ok(())
        }
    }

    struct BrokenSource;

    impl TaskSource for BrokenSource {
        fn name(&self) -> &str {
            "broken"
        }

        fn list_tasks(&self) -> Result<Vec<CareTask>, AppError> {
            Err(AppError::io("timed out"))
        }
    }

    struct MalformedSource;

    impl TaskSource for MalformedSource {
        fn name(&self) -> &str {
            "malformed"
        }

        fn list_tasks(&self) -> Result<Vec<CareTask>, AppError> {
            Err(ParseError::new("r-1", "title", "missing").into())
        }
    }

    #[test]
    fn add_task_persists_defaults() {
        let path = temp_path("api-add.json");
        let draft = TaskDraft {
            title: "walk".to_string(),
            start_at: "2025-09-21T09:00:00Z".to_string(),
            frequency: "daily".to_string(),
            notes: Some("bring water".to_string()),
            ..TaskDraft::default()
        };

        let task = add_task_with_path(&path, &draft, NOW).unwrap();
        let loaded = json_store::load_state(&path).unwrap().unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.tasks, vec![task.clone()]);
        assert_eq!(task.reminder_lead, 15);
        assert_eq!(task.notes.as_deref(), Some("bring water"));
    }

    #[test]
    fn failed_mutation_leaves_file_untouched() {
        let path = temp_path("api-untouched.json");
        seed(&path, vec![task("t-1", NOW, 0, "app")]);
        let before = std::fs::read_to_string(&path).unwrap();

        let err = complete_task_with_path(&path, "t-404", NOW).unwrap_err();
        let after = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(err.code(), "not_found");
        assert_eq!(before, after);
    }

    #[test]
    fn update_get_and_remove_task() {
        let path = temp_path("api-update.json");
        seed(&path, vec![task("t-1", NOW, 0, "app")]);
        let patch = TaskPatch {
            priority: Some(Priority::Low),
            ..TaskPatch::default()
        };

        update_task_with_path(&path, "t-1", &patch).unwrap();
        let fetched = get_task_with_path(&path, "t-1").unwrap();
        let removed = remove_task_with_path(&path, "t-1").unwrap();
        let err = get_task_with_path(&path, "t-1").unwrap_err();
        std::fs::remove_file(&path).ok();

        assert_eq!(fetched.priority, Priority::Low);
        assert_eq!(removed.id, "t-1");
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn complete_and_history_crud_feed_reminder_log() {
        let path = temp_path("api-history.json");
        seed(&path, vec![task("t-1", NOW, 0, "app")]);

        complete_task_with_path(&path, "t-1", NOW).unwrap();
        let (_, entry) =
            add_reminder_entry_with_path(&path, "t-1", TaskStatus::Snoozed, "2025-09-20T08:00:00Z")
                .unwrap();
        assert_eq!(entry.timestamp, "2025-09-20T08:00:01Z");

        let patch = HistoryPatch {
            status: Some(TaskStatus::Skipped),
            timestamp: None,
        };
        update_reminder_entry_with_path(&path, "t-1", "2025-09-20T08:00:01Z", &patch).unwrap();
        let log = reminder_log_with_path(&path, 5).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].status, TaskStatus::Skipped);
        assert_eq!(log[1].status, TaskStatus::Completed);

        let task = remove_reminder_entry_with_path(&path, "t-1", "2025-09-20T08:00:00Z").unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(task.status_history.len(), 1);
        assert_eq!(task.status_history[0].status, TaskStatus::Skipped);
    }

    #[test]
    fn list_views_filter_tasks() {
        let path = temp_path("api-list.json");
        seed(
            &path,
            vec![
                task("today", NOW + Duration::hours(2), 0, "app"),
                task("later", NOW + Duration::days(3), 0, "app"),
            ],
        );

        let all = list_tasks_with_path(&path, ListView::All, NOW, UtcOffset::UTC).unwrap();
        let today = list_tasks_with_path(&path, ListView::Today, NOW, UtcOffset::UTC).unwrap();
        let upcoming =
            list_tasks_with_path(&path, ListView::Upcoming, NOW, UtcOffset::UTC).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(all.len(), 2);
        assert_eq!(today.len(), 1);
        assert_eq!(today[0].id, "today");
        assert_eq!(upcoming[0].id, "today");
    }

    #[test]
    fn upcoming_reminders_reads_store() {
        let path = temp_path("api-reminders.json");
        seed(
            &path,
            vec![
                task("b", NOW + Duration::hours(2), 30, "sms"),
                task("a", NOW + Duration::hours(1), 15, "app"),
            ],
        );

        let slots = upcoming_reminders_with_path(&path, 3, NOW).unwrap();
        let missing = upcoming_reminders_with_path(&temp_path("api-none.json"), 3, NOW).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].task_id, "a");
        assert!(missing.is_empty());
    }

    #[test]
    fn sync_saves_fetched_tasks() {
        let path = temp_path("api-sync.json");

        let outcome = sync_tasks_with_path(&path, &SeedSource).unwrap();
        let loaded = json_store::load_state(&path).unwrap().unwrap();
        std::fs::remove_file(&path).ok();

        assert!(!outcome.used_cache);
        assert_eq!(outcome.tasks.len(), 1);
        assert_eq!(loaded.tasks, outcome.tasks);
    }

    #[test]
    fn sync_falls_back_to_cached_tasks() {
        let path = temp_path("api-sync-cache.json");
        seed(&path, vec![task("cached", NOW, 0, "app")]);

        let outcome = sync_tasks_with_path(&path, &BrokenSource).unwrap();
        std::fs::remove_file(&path).ok();

        assert!(outcome.used_cache);
        assert_eq!(outcome.tasks[0].id, "cached");
    }

    #[test]
    fn sync_without_cache_fails() {
        let path = temp_path("api-sync-empty.json");

        let err = sync_tasks_with_path(&path, &BrokenSource).unwrap_err();

        assert_eq!(err.code(), "io_error");
        assert_eq!(err.message(), "timed out");
        assert!(!path.exists());
    }

    #[test]
    fn sync_keeps_the_source_error_code() {
        let path = temp_path("api-sync-malformed.json");

        let err = sync_tasks_with_path(&path, &MalformedSource).unwrap_err();

        assert_eq!(err.code(), "invalid_data");
        assert_eq!(err.message(), "record r-1: title: missing");
    }

    #[test]
    fn notify_delivers_due_app_reminders_only() {
        let path = temp_path("api-notify.json");
        seed(
            &path,
            vec![
                task("due", NOW + Duration::minutes(20), 15, "app"),
                task("sms", NOW + Duration::minutes(10), 0, "sms"),
                task("later", NOW + Duration::hours(3), 15, "app"),
                task("flaky", NOW + Duration::minutes(12), 0, "app"),
            ],
        );
        let notifier = RecordingNotifier {
            seen: RefCell::new(Vec::new()),
            fail_for: Some("flaky".to_string()),
        };

        let outcome = notify_due_reminders_with_path(&path, NOW, 15, &notifier).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(notifier.seen.borrow().as_slice(), ["due".to_string()]);
        assert_eq!(outcome.delivered.len(), 1);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].task_id, "sms");
        assert_eq!(outcome.failures.len(), 1);
        assert!(outcome.failures[0].slot_id.starts_with("flaky-"));
    }
}
