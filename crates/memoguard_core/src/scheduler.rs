//! Upcoming-reminder preview.
//!
//! Each task fires `reminder_lead` minutes before its `start_at`. A trigger
//! that already passed is shown one day later instead; the task's frequency
//! is not consulted.

use crate::clock::{format_clock, format_utc, parse_timestamp};
use crate::error::AppError;
use crate::model::{CareTask, ReminderSlot};
use time::{Duration, OffsetDateTime, UtcOffset};

pub const DEFAULT_LIMIT: usize = 3;

/// Computes the `limit` soonest reminders relative to `now`.
///
/// Fails on the first task whose `start_at` cannot be parsed; no partial
/// result is returned in that case.
pub fn upcoming_reminders(
    tasks: &[CareTask],
    limit: usize,
    now: OffsetDateTime,
) -> Result<Vec<ReminderSlot>, AppError> {
    if limit == 0 || tasks.is_empty() {
        return Ok(Vec::new());
    }

    let mut triggers = Vec::with_capacity(tasks.len());
    for task in tasks {
        triggers.push((next_trigger(task, now)?, task));
    }

    // stable: equal triggers keep input order
    triggers.sort_by_key(|(trigger, _)| *trigger);
    triggers.truncate(limit);

    triggers
        .into_iter()
        .map(|(trigger, task)| build_slot(task, trigger))
        .collect()
}

pub fn upcoming_reminders_now(
    tasks: &[CareTask],
    limit: usize,
) -> Result<Vec<ReminderSlot>, AppError> {
    upcoming_reminders(tasks, limit, OffsetDateTime::now_utc())
}

pub fn next_trigger(task: &CareTask, now: OffsetDateTime) -> Result<OffsetDateTime, AppError> {
    let start = parse_timestamp(&task.start_at, &format!("task {} start_at", task.id))?;
    let trigger = start - Duration::minutes(i64::from(task.reminder_lead));
    if trigger < now {
        Ok(trigger + Duration::days(1))
    } else {
        Ok(trigger)
    }
}

fn build_slot(task: &CareTask, trigger: OffsetDateTime) -> Result<ReminderSlot, AppError> {
    let trigger_at = format_utc(trigger)?;
    Ok(ReminderSlot {
        id: format!("{}-{}", task.id, trigger_at),
        task_id: task.id.clone(),
        title: task.title.clone(),
        trigger_at,
        channel: task.primary_channel().to_string(),
    })
}

/// `HH:MM` of the slot's trigger in `offset`.
pub fn format_reminder(slot: &ReminderSlot, offset: UtcOffset) -> Result<String, AppError> {
    let trigger = parse_timestamp(&slot.trigger_at, "trigger_at")?;
    format_clock(trigger, offset)
}
