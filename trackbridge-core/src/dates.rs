//! Date layouts used by the two systems and the correlation store
//!
//! | layout    | example                |
//! |-----------|------------------------|
//! | Source    | `2021-06-01`           |
//! | Target    | `01/Jun/21 3:04 PM`    |
//! | persisted | `2021-06-01 15:04:05`  |
//! | extracted | `2021-06-01T15:04:05Z` |
//!
//! Conversions return `None` on unparseable or empty input.

use chrono::{Local, NaiveDate, NaiveDateTime};

pub const SOURCE_DATE: &str = "%Y-%m-%d";
pub const SOURCE_DATE_TIME: &str = "%Y-%m-%d %H:%M:%S";
pub const TARGET_DATE: &str = "%d/%b/%y %-I:%M %p";
const TARGET_DATE_PARSE: &str = "%d/%b/%y %I:%M %p";
pub const PERSISTED: &str = "%Y-%m-%d %H:%M:%S";
pub const EXTRACTED: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Time of day stamped on every worklog start
pub const WORKLOG_START_TIME: &str = "06:00:00.000";

/// Source date, optionally with a `HH:MM:SS` time, to Target layout
pub fn source_to_target(date: &str, time: Option<&str>) -> Option<String> {
    if date.is_empty() {
        return None;
    }
    let parsed = match time.filter(|t| !t.is_empty()) {
        Some(time) => {
            NaiveDateTime::parse_from_str(&format!("{} {}", date, time), SOURCE_DATE_TIME).ok()?
        }
        None => NaiveDate::parse_from_str(date, SOURCE_DATE)
            .ok()?
            .and_hms_opt(0, 0, 0)?,
    };
    Some(parsed.format(TARGET_DATE).to_string())
}

/// Target layout back to a plain Source date
pub fn target_to_source(date: &str) -> Option<String> {
    if date.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(date, TARGET_DATE_PARSE)
        .ok()
        .map(|parsed| parsed.format(SOURCE_DATE).to_string())
}

/// Extracted store timestamp to the layout written back on update
pub fn extracted_to_persisted(timestamp: &str) -> Option<String> {
    NaiveDateTime::parse_from_str(timestamp, EXTRACTED)
        .ok()
        .map(|parsed| parsed.format(PERSISTED).to_string())
}

/// Accepts either persisted or extracted input and yields the persisted layout
pub fn normalize_persisted(timestamp: &str) -> Option<String> {
    if NaiveDateTime::parse_from_str(timestamp, PERSISTED).is_ok() {
        return Some(timestamp.to_string());
    }
    extracted_to_persisted(timestamp)
}

pub fn persisted_now() -> String {
    Local::now().format(PERSISTED).to_string()
}

/// `<date performed>T06:00:00.000<offset>`
pub fn worklog_started(date_performed: &str, offset: &str) -> String {
    let offset = if offset.is_empty() { "+0530" } else { offset };
    format!("{}T{}{}", date_performed, WORKLOG_START_TIME, offset)
}

/// Date part of a worklog `started` value, `None` without a `T` separator
pub fn started_date(started: &str) -> Option<&str> {
    match started.split_once('T') {
        Some((date, _)) if !date.is_empty() => Some(date),
        _ => None,
    }
}
