//! Memory records from the companion app's feed.
//!
//! | field        | accepted keys (first wins)          | when absent                 |
//! |--------------|-------------------------------------|-----------------------------|
//! | title        | `title`                             | `未命名回忆`                |
//! | body         | `richText`, `content`               | empty                       |
//! | cover        | `coverId`, `cover_id`               | first media id              |
//! | created      | `createdAt`, `created_at`           | `now`                       |
//! | updated      | `updatedAt`, `updated_at`           | created                     |
//! | event date   | `eventDate`, `event_date`           | UTC date of `now`           |
//! | insights     | `insights`                          | computed from the body      |
//! | media target | `targetId`, `target_id`             | required                    |
//! | author       | `createdBy`, `created_by`           | required                    |

use crate::clock::{format_timestamp, parse_timestamp};
use crate::error::{AppError, ParseError};
use crate::insight::{MemoryInsights, Tone, insights_for, plain_text};
use crate::normalize::{Record, parse_records};
use crate::source::read_json_file;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use time::OffsetDateTime;
use time::macros::format_description;

pub const UNTITLED: &str = "未命名回忆";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
    Link,
}

impl MediaKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            "document" => Some(Self::Document),
            "link" => Some(Self::Link),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    Note,
    Audio,
    Highlight,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryMedia {
    pub id: String,
    pub kind: MediaKind,
    pub url: String,
    pub name: Option<String>,
    pub thumbnail: Option<String>,
    pub transcript: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryAnnotation {
    pub id: String,
    pub kind: AnnotationKind,
    pub target_id: String,
    /// Seconds into the media, for audio and video targets.
    pub timestamp: Option<f64>,
    pub body: String,
    pub created_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryItem {
    pub id: String,
    pub title: String,
    pub content: String,
    pub rich_text: String,
    pub media: Vec<MemoryMedia>,
    pub cover_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub event_date: String,
    pub people: Vec<String>,
    pub tags: Vec<String>,
    pub mood: String,
    pub location: String,
    pub insights: MemoryInsights,
    pub annotations: Vec<MemoryAnnotation>,
}

/// Reads a JSON array of memory records from `path`.
pub fn load_memories(path: &Path, now: OffsetDateTime) -> Result<Vec<MemoryItem>, AppError> {
    let value = read_json_file(path)?;
    let memories = parse_memories(&value, now)?;
    log::debug!("parsed {} memories from {}", memories.len(), path.display());
    Ok(memories)
}

pub fn parse_memories(value: &Value, now: OffsetDateTime) -> Result<Vec<MemoryItem>, ParseError> {
    parse_records(
        value,
        "memories",
        |index, record| parse_memory(index, record, now),
        |memory| memory.id.as_str(),
    )
}

pub fn parse_memory(
    index: usize,
    value: &Value,
    now: OffsetDateTime,
) -> Result<MemoryItem, ParseError> {
    let record = Record::open(index, value)?;

    let rich_text = record.string(&["richText", "rich_text"])?;
    let content = record.string(&["content"])?;
    let body = rich_text.clone().or_else(|| content.clone()).unwrap_or_default();
    let plain = plain_text(&body);

    let media = parse_media(&record)?;
    let cover_id = record
        .text(&["coverId", "cover_id"])?
        .or_else(|| media.first().map(|item| item.id.clone()));

    let created_at = match record.string(&["createdAt", "created_at"])? {
        Some(raw) => checked_timestamp(&record, "createdAt", &raw)?,
        None => format_timestamp(now).map_err(|err| record.error("createdAt", err.message()))?,
    };
    let updated_at = match record.string(&["updatedAt", "updated_at"])? {
        Some(raw) => checked_timestamp(&record, "updatedAt", &raw)?,
        None => created_at.clone(),
    };
    let event_date = match record.text(&["eventDate", "event_date"])? {
        Some(date) => date,
        None => now
            .to_offset(time::UtcOffset::UTC)
            .date()
            .format(format_description!("[year]-[month]-[day]"))
            .map_err(|err| record.error("eventDate", err.to_string()))?,
    };

    let insights = match record.first(&["insights"]) {
        Some(value) => parse_insights(&record, value)?,
        None => insights_for(&plain),
    };

    Ok(MemoryItem {
        id: record.id.clone(),
        title: record.text(&["title"])?.unwrap_or_else(|| UNTITLED.to_string()),
        content: content.unwrap_or_else(|| plain.clone()),
        rich_text: rich_text.filter(|text| !text.is_empty()).unwrap_or(plain),
        media,
        cover_id,
        created_at,
        updated_at,
        event_date,
        people: record.strings("people")?,
        tags: record.strings("tags")?,
        mood: record.string(&["mood"])?.unwrap_or_default(),
        location: record.string(&["location"])?.unwrap_or_default(),
        insights,
        annotations: parse_annotations(&record)?,
    })
}

fn checked_timestamp(record: &Record<'_>, field: &'static str, raw: &str) -> Result<String, ParseError> {
    parse_timestamp(raw, field).map_err(|err| record.error(field, err.message()))?;
    Ok(raw.trim().to_string())
}

fn parse_media(record: &Record<'_>) -> Result<Vec<MemoryMedia>, ParseError> {
    let Some(value) = record.first(&["media"]) else {
        return Ok(Vec::new());
    };
    let items = value
        .as_array()
        .ok_or_else(|| record.error("media", "must be an array"))?;

    items
        .iter()
        .enumerate()
        .map(|(position, item)| -> Result<MemoryMedia, ParseError> {
            let item = item
                .as_object()
                .ok_or_else(|| record.error("media", "entries must be objects"))?;
            let field = |key: &str| item.get(key).and_then(Value::as_str).map(str::to_string);
            let kind = match field("type") {
                None => MediaKind::Image,
                Some(raw) => MediaKind::parse(&raw)
                    .ok_or_else(|| record.error("media", format!("unknown media type '{raw}'")))?,
            };
            Ok(MemoryMedia {
                id: field("id").unwrap_or_else(|| format!("{}-media-{position}", record.id)),
                kind,
                url: field("url").unwrap_or_default(),
                name: field("name"),
                thumbnail: field("thumbnail"),
                transcript: field("transcript"),
            })
        })
        .collect()
}

fn parse_annotations(record: &Record<'_>) -> Result<Vec<MemoryAnnotation>, ParseError> {
    let Some(value) = record.first(&["annotations"]) else {
        return Ok(Vec::new());
    };
    let items = value
        .as_array()
        .ok_or_else(|| record.error("annotations", "must be an array"))?;

    let mut annotations = Vec::with_capacity(items.len());
    for item in items {
        let item = item
            .as_object()
            .ok_or_else(|| record.error("annotations", "entries must be objects"))?;
        let required = |keys: &[&str], field: &'static str| {
            keys.iter()
                .find_map(|key| item.get(*key).and_then(Value::as_str))
                .map(str::to_string)
                .ok_or_else(|| record.error(field, "missing"))
        };
        let kind = match required(&["type"], "annotations.type")?.as_str() {
            "note" => AnnotationKind::Note,
            "audio" => AnnotationKind::Audio,
            "highlight" => AnnotationKind::Highlight,
            other => {
                return Err(record.error(
                    "annotations.type",
                    format!("unknown annotation type '{other}'"),
                ));
            }
        };
        let timestamp = match item.get("timestamp") {
            None | Some(Value::Null) => None,
            Some(Value::Number(number)) => number.as_f64(),
            Some(_) => return Err(record.error("annotations.timestamp", "must be a number")),
        };
        annotations.push(MemoryAnnotation {
            id: required(&["id"], "annotations.id")?,
            kind,
            target_id: required(&["targetId", "target_id"], "annotations.targetId")?,
            timestamp,
            body: required(&["body"], "annotations.body")?,
            created_by: required(&["createdBy", "created_by"], "annotations.createdBy")?,
        });
    }
    Ok(annotations)
}

fn parse_insights(record: &Record<'_>, value: &Value) -> Result<MemoryInsights, ParseError> {
    let object = value
        .as_object()
        .ok_or_else(|| record.error("insights", "must be an object"))?;
    let summary = object
        .get("summary")
        .and_then(Value::as_str)
        .ok_or_else(|| record.error("insights.summary", "missing"))?;
    let raw_tone = object
        .get("tone")
        .and_then(Value::as_str)
        .ok_or_else(|| record.error("insights.tone", "missing"))?;
    let tone = Tone::parse(raw_tone)
        .ok_or_else(|| record.error("insights.tone", format!("unknown tone '{raw_tone}'")))?;
    let keywords = match object.get("keywords") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| record.error("insights.keywords", "entries must be strings"))
            })
            .collect::<Result<_, _>>()?,
        Some(_) => return Err(record.error("insights.keywords", "must be an array")),
    };

    Ok(MemoryInsights {
        summary: summary.to_string(),
        tone,
        keywords,
    })
}
