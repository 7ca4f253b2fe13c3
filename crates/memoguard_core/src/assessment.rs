//! Patient assessments (cognitive scores and PET biomarkers).
//!
//! Records come from clinic exports with inconsistent shapes. A record is
//! matched to a known template by `templateId`, `template`, then by
//! `assessment` or `label` compared case-insensitively with the template
//! labels. Without a template the metric is inferred from which value keys
//! are present.

use crate::error::{AppError, ParseError};
use crate::normalize::{Record, parse_records};
use crate::source::read_json_file;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime, UtcOffset};

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

pub const DEFAULT_STATUS: &str = "未填写";
pub const CUSTOM_LABEL: &str = "自定义评估";

const TAU_KEYS: &[&str] = &["tauLevel", "tau", "tauValue"];
const AMYLOID_KEYS: &[&str] = &["amyloidBetaLevel", "amyloidBeta", "abLevel"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentMetric {
    Score,
    Tau,
    Amyloid,
}

impl AssessmentMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Score => "score",
            Self::Tau => "tau",
            Self::Amyloid => "amyloid",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "score" => Some(Self::Score),
            "tau" => Some(Self::Tau),
            "amyloid" => Some(Self::Amyloid),
            _ => None,
        }
    }

    fn fallback_unit(&self) -> &'static str {
        match self {
            Self::Score => "分",
            Self::Tau | Self::Amyloid => "pg/mL",
        }
    }

    fn value_keys(&self) -> &'static [&'static str] {
        match self {
            Self::Score => &["score"],
            Self::Tau => TAU_KEYS,
            Self::Amyloid => AMYLOID_KEYS,
        }
    }
}

impl fmt::Display for AssessmentMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssessmentTemplate {
    pub id: &'static str,
    pub label: &'static str,
    pub metric: AssessmentMetric,
    pub default_unit: &'static str,
    pub description: &'static str,
}

pub const TEMPLATES: &[AssessmentTemplate] = &[
    AssessmentTemplate {
        id: "cognitive-moca",
        label: "MoCA",
        metric: AssessmentMetric::Score,
        default_unit: "分",
        description: "蒙特利尔认知评估",
    },
    AssessmentTemplate {
        id: "cognitive-mmse",
        label: "MMSE",
        metric: AssessmentMetric::Score,
        default_unit: "分",
        description: "简易精神状态检查",
    },
    AssessmentTemplate {
        id: "pet-tau",
        label: "PET Tau",
        metric: AssessmentMetric::Tau,
        default_unit: "SUVR",
        description: "Tau PET 影像",
    },
    AssessmentTemplate {
        id: "pet-amyloid",
        label: "Amyloid PET",
        metric: AssessmentMetric::Amyloid,
        default_unit: "SUVR",
        description: "淀粉样蛋白 PET 影像",
    },
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientAssessment {
    pub id: String,
    /// `YYYY-MM-DD`.
    pub date: String,
    pub template_id: String,
    pub label: String,
    pub metric: AssessmentMetric,
    pub value: Option<f64>,
    pub unit: String,
    pub status: String,
    pub notes: Option<String>,
}

pub fn template_by_id(id: &str) -> Option<&'static AssessmentTemplate> {
    TEMPLATES.iter().find(|template| template.id == id)
}

fn template_by_label(label: &str) -> Option<&'static AssessmentTemplate> {
    let key = label.trim().to_lowercase();
    TEMPLATES
        .iter()
        .find(|template| template.label.to_lowercase() == key)
}

/// Reads a JSON array of assessment records from `path`, oldest first.
pub fn load_assessments(
    path: &Path,
    now: OffsetDateTime,
) -> Result<Vec<PatientAssessment>, AppError> {
    let value = read_json_file(path)?;
    let assessments = parse_assessments(&value, now)?;
    log::debug!(
        "parsed {} assessments from {}",
        assessments.len(),
        path.display()
    );
    Ok(assessments)
}

/// Parses and sorts by date; records on the same day keep their order.
pub fn parse_assessments(
    value: &Value,
    now: OffsetDateTime,
) -> Result<Vec<PatientAssessment>, ParseError> {
    let mut assessments = parse_records(
        value,
        "assessments",
        |index, record| parse_assessment(index, record, now),
        |assessment| assessment.id.as_str(),
    )?;
    assessments.sort_by(|a, b| a.date.cmp(&b.date));
    Ok(assessments)
}

pub fn parse_assessment(
    index: usize,
    value: &Value,
    now: OffsetDateTime,
) -> Result<PatientAssessment, ParseError> {
    let record = Record::open(index, value)?;

    let template = resolve_template(&record)?;
    let metric = match template {
        Some(template) => template.metric,
        None => infer_metric(&record)?,
    };

    let template_id = match record.text(&["templateId"])? {
        Some(id) => id,
        None => template
            .map(|template| template.id.to_string())
            .unwrap_or_else(|| format!("custom-{metric}")),
    };

    let label = match template {
        Some(template) => template.label.to_string(),
        None => record
            .text(&["label"])?
            .or(record.text(&["assessment"])?)
            .unwrap_or_else(|| CUSTOM_LABEL.to_string()),
    };

    let unit = record
        .text(&["unit"])?
        .or_else(|| template.map(|template| template.default_unit.to_string()))
        .unwrap_or_else(|| metric.fallback_unit().to_string());

    Ok(PatientAssessment {
        id: record.id.clone(),
        date: parse_date(&record, now)?,
        template_id,
        label,
        metric,
        value: derive_value(&record, metric)?,
        unit,
        status: record
            .text(&["status"])?
            .unwrap_or_else(|| DEFAULT_STATUS.to_string()),
        notes: record.text(&["notes"])?,
    })
}

fn resolve_template(
    record: &Record<'_>,
) -> Result<Option<&'static AssessmentTemplate>, ParseError> {
    for key in ["templateId", "template"] {
        if let Some(template) = record.text(&[key])?.as_deref().and_then(template_by_id) {
            return Ok(Some(template));
        }
    }
    for key in ["assessment", "label"] {
        if let Some(template) = record.text(&[key])?.as_deref().and_then(template_by_label) {
            return Ok(Some(template));
        }
    }
    Ok(None)
}

fn infer_metric(record: &Record<'_>) -> Result<AssessmentMetric, ParseError> {
    if let Some(raw) = record.text(&["metric"])? {
        return AssessmentMetric::parse(&raw)
            .ok_or_else(|| record.error("metric", format!("unknown metric '{raw}'")));
    }
    if record.has(&["tauLevel", "tau"]) {
        return Ok(AssessmentMetric::Tau);
    }
    if record.has(AMYLOID_KEYS) {
        return Ok(AssessmentMetric::Amyloid);
    }
    Ok(AssessmentMetric::Score)
}

fn derive_value(record: &Record<'_>, metric: AssessmentMetric) -> Result<Option<f64>, ParseError> {
    if let Some(value) = record.first(&["value"])
        && let Some(number) = numeric(record, "value", value)?
    {
        return Ok(Some(number));
    }
    let keys = metric.value_keys();
    match record.first(keys) {
        Some(value) => numeric(record, keys[0], value),
        None => Ok(None),
    }
}

fn numeric(
    record: &Record<'_>,
    field: &'static str,
    value: &Value,
) -> Result<Option<f64>, ParseError> {
    match value {
        Value::Null => Ok(None),
        Value::Number(number) => Ok(number.as_f64()),
        Value::String(raw) if raw.trim().is_empty() => Ok(None),
        Value::String(raw) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|number| number.is_finite())
            .map(Some)
            .ok_or_else(|| record.error(field, format!("'{raw}' is not a number"))),
        _ => Err(record.error(field, "must be a number")),
    }
}

/// Accepts `YYYY-MM-DD` or any string starting with one (RFC 3339 included).
fn parse_date(record: &Record<'_>, now: OffsetDateTime) -> Result<String, ParseError> {
    let Some(raw) = record.text(&["date"])? else {
        return now
            .to_offset(UtcOffset::UTC)
            .date()
            .format(DATE_FORMAT)
            .map_err(|err| record.error("date", err.to_string()));
    };
    let head = raw.get(..10).unwrap_or(raw.as_str());
    let date = Date::parse(head, DATE_FORMAT)
        .map_err(|_| record.error("date", format!("expected YYYY-MM-DD, got '{raw}'")))?;
    date.format(DATE_FORMAT)
        .map_err(|err| record.error("date", err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::{
        AssessmentMetric, CUSTOM_LABEL, DEFAULT_STATUS, load_assessments, parse_assessment,
        parse_assessments, template_by_id,
    };
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};
    use time::macros::datetime;

    fn temp_path(file_name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("memoguard-{nanos}-{file_name}"))
    }

    #[test]
    fn template_id_drives_metric_label_and_unit() {
        let now = datetime!(2025-09-20 12:00 UTC);
        let value = serde_json::json!({
            "id": "a-1",
            "date": "2025-09-01",
            "templateId": "cognitive-moca",
            "label": "whatever the clinic typed",
            "value": 24
        });

        let assessment = parse_assessment(0, &value, now).unwrap();

        assert_eq!(assessment.metric, AssessmentMetric::Score);
        assert_eq!(assessment.label, "MoCA");
        assert_eq!(assessment.unit, "分");
        assert_eq!(assessment.value, Some(24.0));
        assert_eq!(assessment.status, DEFAULT_STATUS);
        assert_eq!(assessment.notes, None);
    }

    #[test]
    fn label_matches_template_case_insensitively() {
        let now = datetime!(2025-09-20 12:00 UTC);
        let value = serde_json::json!({
            "id": "a-2",
            "assessment": " amyloid pet ",
            "amyloidBeta": "1.42",
            "status": " 已复核 ",
            "notes": "  "
        });

        let assessment = parse_assessment(0, &value, now).unwrap();

        assert_eq!(assessment.template_id, "pet-amyloid");
        assert_eq!(assessment.metric, AssessmentMetric::Amyloid);
        assert_eq!(assessment.unit, "SUVR");
        assert_eq!(assessment.value, Some(1.42));
        assert_eq!(assessment.status, "已复核");
        assert_eq!(assessment.notes, None);
        assert_eq!(assessment.date, "2025-09-20");
    }

    #[test]
    fn metric_is_inferred_without_template() {
        let now = datetime!(2025-09-20 12:00 UTC);

        let tau = parse_assessment(0, &serde_json::json!({ "id": "a", "tauLevel": 310 }), now)
            .unwrap();
        assert_eq!(tau.metric, AssessmentMetric::Tau);
        assert_eq!(tau.template_id, "custom-tau");
        assert_eq!(tau.unit, "pg/mL");
        assert_eq!(tau.label, CUSTOM_LABEL);
        assert_eq!(tau.value, Some(310.0));

        let plain = parse_assessment(0, &serde_json::json!({ "id": "b", "label": "Clock" }), now)
            .unwrap();
        assert_eq!(plain.metric, AssessmentMetric::Score);
        assert_eq!(plain.label, "Clock");
        assert_eq!(plain.value, None);
    }

    #[test]
    fn blank_value_falls_back_to_metric_key() {
        let now = datetime!(2025-09-20 12:00 UTC);
        let value = serde_json::json!({
            "id": "a-3",
            "templateId": "pet-tau",
            "value": "",
            "tau": 1.1
        });

        let assessment = parse_assessment(0, &value, now).unwrap();

        assert_eq!(assessment.value, Some(1.1));
    }

    #[test]
    fn rejects_malformed_fields() {
        let now = datetime!(2025-09-20 12:00 UTC);

        let bad_value = serde_json::json!({ "id": "a-4", "value": "high" });
        let err = parse_assessment(0, &bad_value, now).unwrap_err();
        assert_eq!(err.to_string(), "record a-4: value: 'high' is not a number");

        let bad_metric = serde_json::json!({ "id": "a-5", "metric": "iq" });
        assert_eq!(parse_assessment(0, &bad_metric, now).unwrap_err().field, "metric");

        let bad_date = serde_json::json!({ "id": "a-6", "date": "Sept 1" });
        assert_eq!(parse_assessment(0, &bad_date, now).unwrap_err().field, "date");
    }

    #[test]
    fn assessments_sort_by_date_and_reject_repeated_ids() {
        let now = datetime!(2025-09-20 12:00 UTC);
        let value = serde_json::json!([
            { "id": "late", "date": "2025-09-10T08:00:00+08:00" },
            { "id": "early", "date": "2025-03-02" },
            { "id": "same-day", "date": "2025-09-10" }
        ]);

        let ids: Vec<String> = parse_assessments(&value, now)
            .unwrap()
            .into_iter()
            .map(|assessment| assessment.id)
            .collect();
        assert_eq!(ids, vec!["early", "late", "same-day"]);

        let repeated = serde_json::json!([{ "id": "x" }, { "id": "x" }]);
        let err = parse_assessments(&repeated, now).unwrap_err();
        assert_eq!(err.record, "#1 (x)");
    }

    #[test]
    fn templates_are_listed_by_id() {
        assert_eq!(template_by_id("pet-tau").map(|t| t.label), Some("PET Tau"));
        assert!(template_by_id("unknown").is_none());
    }

    #[test]
    fn load_assessments_reads_file() {
        let path = temp_path("assessments.json");
        std::fs::write(&path, "[{\"id\": \"a-1\", \"template\": \"cognitive-mmse\", \"score\": 27}]")
            .unwrap();

        let assessments = load_assessments(&path, datetime!(2025-09-20 12:00 UTC)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(assessments[0].label, "MMSE");
        assert_eq!(assessments[0].value, Some(27.0));
    }
}
