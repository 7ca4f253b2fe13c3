//! Reminder-log maintenance. Every operation returns a fresh list sorted
//! ascending by instant with no two entries sharing an instant.

use crate::clock::{format_timestamp, parse_timestamp};
use crate::error::AppError;
use crate::model::{HistoryPatch, TaskHistory, TaskStatus};
use time::{Duration, OffsetDateTime};

const COLLISION_STEP: Duration = Duration::seconds(1);

pub(crate) fn insert_entry(
    history: &[TaskHistory],
    status: TaskStatus,
    at: OffsetDateTime,
) -> Result<(Vec<TaskHistory>, TaskHistory), AppError> {
    let mut parsed = parse_all(history)?;
    let mut slot = at;
    while parsed.iter().any(|(instant, _)| *instant == slot) {
        slot += COLLISION_STEP;
    }
    if slot != at {
        log::debug!("history timestamp collided, nudged from {at} to {slot}");
    }

    let entry = TaskHistory {
        status,
        timestamp: format_timestamp(slot)?,
    };
    parsed.push((slot, entry.clone()));
    Ok((sorted(parsed), entry))
}

pub(crate) fn remove_entry(
    history: &[TaskHistory],
    at: OffsetDateTime,
) -> Result<(Vec<TaskHistory>, TaskHistory), AppError> {
    let mut parsed = parse_all(history)?;
    let index = parsed
        .iter()
        .position(|(instant, _)| *instant == at)
        .ok_or_else(|| AppError::not_found("reminder entry not found"))?;
    let (_, removed) = parsed.remove(index);
    Ok((sorted(parsed), removed))
}

pub(crate) fn update_entry(
    history: &[TaskHistory],
    at: OffsetDateTime,
    patch: &HistoryPatch,
    target: Option<OffsetDateTime>,
) -> Result<(Vec<TaskHistory>, TaskHistory), AppError> {
    let (remaining, existing) = remove_entry(history, at)?;
    let status = patch.status.unwrap_or(existing.status);
    let moved_to = match target {
        Some(instant) => instant,
        None => parse_timestamp(&existing.timestamp, "timestamp")?,
    };
    insert_entry(&remaining, status, moved_to)
}

fn parse_all(history: &[TaskHistory]) -> Result<Vec<(OffsetDateTime, TaskHistory)>, AppError> {
    history
        .iter()
        .map(|entry| Ok((parse_timestamp(&entry.timestamp, "timestamp")?, entry.clone())))
        .collect()
}

fn sorted(mut parsed: Vec<(OffsetDateTime, TaskHistory)>) -> Vec<TaskHistory> {
    parsed.sort_by_key(|(instant, _)| *instant);
    parsed.into_iter().map(|(_, entry)| entry).collect()
}
