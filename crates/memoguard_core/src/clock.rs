use crate::error::AppError;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

pub fn parse_timestamp(value: &str, field: &str) -> Result<OffsetDateTime, AppError> {
    OffsetDateTime::parse(value.trim(), &Rfc3339)
        .map_err(|_| AppError::invalid_data(format!("{field} must be RFC3339, got '{value}'")))
}

/// Same as [`parse_timestamp`] but reports the value as user input.
pub fn parse_input_timestamp(value: &str, field: &str) -> Result<OffsetDateTime, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_input(format!("{field} is required")));
    }
    OffsetDateTime::parse(trimmed, &Rfc3339)
        .map_err(|_| AppError::invalid_input(format!("{field} must be RFC3339")))
}

pub fn format_timestamp(value: OffsetDateTime) -> Result<String, AppError> {
    value
        .format(&Rfc3339)
        .map_err(|err| AppError::invalid_data(err.to_string()))
}

pub fn format_utc(value: OffsetDateTime) -> Result<String, AppError> {
    format_timestamp(value.to_offset(UtcOffset::UTC))
}

pub fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

/// Accepts `Z`, `+08:00`, `-0530` and `+8`.
pub fn parse_offset(raw: &str) -> Result<UtcOffset, AppError> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
        return Ok(UtcOffset::UTC);
    }

    let invalid = || AppError::invalid_input(format!("invalid utc offset '{raw}'"));
    let (sign, rest) = match trimmed.chars().next() {
        Some('+') => (1i8, &trimmed[1..]),
        Some('-') => (-1i8, &trimmed[1..]),
        _ => return Err(invalid()),
    };

    if !rest.bytes().all(|byte| byte.is_ascii_digit() || byte == b':') {
        return Err(invalid());
    }
    let (hours, minutes) = match rest.split_once(':') {
        Some((hours, minutes)) => (hours, minutes),
        None if rest.len() == 4 => rest.split_at(2),
        None => (rest, "0"),
    };
    let hours: i8 = hours.parse().map_err(|_| invalid())?;
    let minutes: i8 = minutes.parse().map_err(|_| invalid())?;
    let hours = sign.checked_mul(hours).ok_or_else(invalid)?;
    let minutes = sign.checked_mul(minutes).ok_or_else(invalid)?;

    UtcOffset::from_hms(hours, minutes, 0).map_err(|_| invalid())
}

pub fn format_clock(value: OffsetDateTime, offset: UtcOffset) -> Result<String, AppError> {
    value
        .to_offset(offset)
        .format(format_description!("[hour]:[minute]"))
        .map_err(|err| AppError::invalid_data(err.to_string()))
}
