//! Parsing of task records as served by the admin REST API or stored by the
//! companion app's mock layer. Each accepted legacy field name is listed
//! below; anything else is ignored.
//!
//! | field            | accepted keys (first wins)                  |
//! |------------------|---------------------------------------------|
//! | start            | `startAt`, `dueAt`, `start_at`              |
//! | end              | `endAt`, `end_at`                           |
//! | notes            | `notes`, `description`                      |
//! | reminder lead    | `reminderLead`, `reminder_lead`             |
//! | reminder channel | `reminderChannel`, `reminder_channel`       |
//! | history          | `statusHistory`, `status_history`, else `history` + `reminders` |
//! | entry time       | `timestamp`, `changedAt`                    |

use crate::clock::{format_timestamp, parse_timestamp};
use crate::error::ParseError;
use crate::model::{
    CareTask, DEFAULT_CATEGORY, DEFAULT_CHANNEL, DEFAULT_REMINDER_LEAD, Frequency, Priority,
    TaskHistory, TaskStatus,
};
use serde_json::{Map, Value};
use time::{Duration, OffsetDateTime};

const START_KEYS: &[&str] = &["startAt", "dueAt", "start_at"];
const END_KEYS: &[&str] = &["endAt", "end_at"];
const NOTES_KEYS: &[&str] = &["notes", "description"];
const LEAD_KEYS: &[&str] = &["reminderLead", "reminder_lead"];
const CHANNEL_KEYS: &[&str] = &["reminderChannel", "reminder_channel"];
const HISTORY_KEYS: &[&str] = &["statusHistory", "status_history"];
const MERGED_HISTORY_KEYS: &[&str] = &["history", "reminders"];
const ENTRY_TIME_KEYS: &[&str] = &["timestamp", "changedAt"];

pub fn parse_remote_tasks(value: &Value) -> Result<Vec<CareTask>, ParseError> {
    parse_records(value, "tasks", parse_remote_task, |task| task.id.as_str())
}

/// Parses every element of a JSON array with `parse`, rejecting a record
/// whose id repeats an earlier one.
pub(crate) fn parse_records<T, P, I>(
    value: &Value,
    collection: &'static str,
    parse: P,
    id_of: I,
) -> Result<Vec<T>, ParseError>
where
    P: Fn(usize, &Value) -> Result<T, ParseError>,
    I: Fn(&T) -> &str,
{
    let records = value
        .as_array()
        .ok_or_else(|| ParseError::new("payload", collection, "expected a JSON array"))?;
    let mut parsed: Vec<T> = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let item = parse(index, record)?;
        let id = id_of(&item);
        if parsed.iter().any(|seen| id_of(seen) == id) {
            return Err(ParseError::new(
                format!("#{index} ({id})"),
                "id",
                "duplicate of an earlier record",
            ));
        }
        parsed.push(item);
    }
    Ok(parsed)
}

pub fn parse_remote_task(index: usize, value: &Value) -> Result<CareTask, ParseError> {
    let record = Record::open(index, value)?;

    let title = record
        .string(&["title"])?
        .filter(|title| !title.trim().is_empty())
        .ok_or_else(|| record.error("title", "missing"))?;

    let start_at = record
        .string(START_KEYS)?
        .ok_or_else(|| record.error("startAt", "missing"))?;
    parse_timestamp(&start_at, "startAt").map_err(|err| record.error("startAt", err.message()))?;

    let end_at = record.string(END_KEYS)?;
    if let Some(value) = end_at.as_deref() {
        parse_timestamp(value, "endAt").map_err(|err| record.error("endAt", err.message()))?;
    }

    let priority = match record.string(&["priority"])? {
        Some(raw) => Priority::parse(&raw)
            .ok_or_else(|| record.error("priority", format!("unknown priority '{raw}'")))?,
        None => Priority::Medium,
    };

    let reminder_lead = match record.first(LEAD_KEYS) {
        None | Some(Value::Null) => DEFAULT_REMINDER_LEAD,
        Some(Value::Number(number)) => number
            .as_u64()
            .and_then(|lead| u32::try_from(lead).ok())
            .ok_or_else(|| record.error("reminderLead", "must be a non-negative integer"))?,
        Some(_) => return Err(record.error("reminderLead", "must be a number")),
    };

    let reminder_channel = match record.first(CHANNEL_KEYS) {
        None | Some(Value::Null) => vec![DEFAULT_CHANNEL.to_string()],
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| record.error("reminderChannel", "entries must be strings"))
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(record.error("reminderChannel", "must be an array")),
    };

    Ok(CareTask {
        id: record.id.clone(),
        title,
        category: record
            .string(&["category"])?
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        frequency: record
            .string(&["frequency"])?
            .map(Frequency::from)
            .unwrap_or(Frequency::Once),
        start_at,
        end_at,
        priority,
        reminder_lead,
        reminder_channel,
        notes: record.string(NOTES_KEYS)?,
        status_history: record.history()?,
    })
}

/// One JSON object with a non-blank string `id`; errors name that id.
pub(crate) struct Record<'a> {
    pub(crate) id: String,
    object: &'a Map<String, Value>,
}

impl<'a> Record<'a> {
    pub(crate) fn open(index: usize, value: &'a Value) -> Result<Self, ParseError> {
        let object = value
            .as_object()
            .ok_or_else(|| ParseError::new(format!("#{index}"), "record", "expected an object"))?;
        match object.get("id") {
            Some(Value::String(id)) if !id.trim().is_empty() => Ok(Self {
                id: id.trim().to_string(),
                object,
            }),
            _ => Err(ParseError::new(format!("#{index}"), "id", "missing")),
        }
    }

    pub(crate) fn error<M: Into<String>>(&self, field: &'static str, reason: M) -> ParseError {
        ParseError::new(self.id.as_str(), field, reason)
    }

    pub(crate) fn first(&self, keys: &[&str]) -> Option<&'a Value> {
        let object: &'a Map<String, Value> = self.object;
        keys.iter()
            .filter_map(|key| object.get(*key))
            .find(|value| !value.is_null())
    }

    pub(crate) fn has(&self, keys: &[&str]) -> bool {
        self.first(keys).is_some()
    }

    pub(crate) fn string(&self, keys: &[&'static str]) -> Result<Option<String>, ParseError> {
        match self.first(keys) {
            None => Ok(None),
            Some(Value::String(value)) => Ok(Some(value.clone())),
            Some(_) => Err(self.error(keys[0], "must be a string")),
        }
    }

    /// Like [`Record::string`] but blank values count as absent.
    pub(crate) fn text(&self, keys: &[&'static str]) -> Result<Option<String>, ParseError> {
        Ok(self
            .string(keys)?
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty()))
    }

    pub(crate) fn strings(&self, key: &'static str) -> Result<Vec<String>, ParseError> {
        match self.first(&[key]) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| self.error(key, "entries must be strings"))
                })
                .collect(),
            Some(_) => Err(self.error(key, "must be an array")),
        }
    }

    fn history(&self) -> Result<Vec<TaskHistory>, ParseError> {
        let mut entries = Vec::new();
        if let Some(value) = self.first(HISTORY_KEYS) {
            self.collect_entries(value, &mut entries)?;
        } else {
            for key in MERGED_HISTORY_KEYS {
                if let Some(value) = self.object.get(*key).filter(|value| !value.is_null()) {
                    self.collect_entries(value, &mut entries)?;
                }
            }
        }

        entries.sort_by_key(|(at, _)| *at);

        // same one-second nudge as the reminder log uses for collisions
        let mut previous: Option<OffsetDateTime> = None;
        for (at, entry) in entries.iter_mut() {
            if let Some(last) = previous
                && *at <= last
            {
                *at = last + Duration::seconds(1);
                entry.timestamp =
                    format_timestamp(*at).map_err(|err| self.error("timestamp", err.message()))?;
            }
            previous = Some(*at);
        }
        Ok(entries.into_iter().map(|(_, entry)| entry).collect())
    }

    fn collect_entries(
        &self,
        value: &Value,
        out: &mut Vec<(OffsetDateTime, TaskHistory)>,
    ) -> Result<(), ParseError> {
        let items = value
            .as_array()
            .ok_or_else(|| self.error("statusHistory", "must be an array"))?;

        for item in items {
            let entry = item
                .as_object()
                .ok_or_else(|| self.error("statusHistory", "entries must be objects"))?;
            let raw_status = entry
                .get("status")
                .and_then(Value::as_str)
                .ok_or_else(|| self.error("status", "missing"))?;
            let status = parse_status(raw_status)
                .ok_or_else(|| self.error("status", format!("unknown status '{raw_status}'")))?;
            let raw_time = ENTRY_TIME_KEYS
                .iter()
                .find_map(|key| entry.get(*key).and_then(Value::as_str))
                .ok_or_else(|| self.error("timestamp", "missing"))?;
            let at = parse_timestamp(raw_time, "timestamp")
                .map_err(|err| self.error("timestamp", err.message()))?;
            let timestamp =
                format_timestamp(at).map_err(|err| self.error("timestamp", err.message()))?;
            out.push((at, TaskHistory { status, timestamp }));
        }
        Ok(())
    }
}

/// The admin schema tracks `in_progress`; the companion app has no such
/// state and treats it as still pending.
fn parse_status(raw: &str) -> Option<TaskStatus> {
    match raw.trim() {
        "in_progress" => Some(TaskStatus::Pending),
        other => TaskStatus::parse(other),
    }
}
