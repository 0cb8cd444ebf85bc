//! Time entry → worklog

use crate::dates::{started_date, worklog_started};
use crate::model::{TimeEntry, Worklog, WorklogRequest};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorklogDraft {
    /// Set when updating an existing worklog
    pub id: Option<String>,
    pub seconds: i64,
    pub comment: String,
    pub started: String,
    pub author_email: String,
    /// Leaf task the entry was logged against
    pub source_task_id: String,
    pub source_time_entry_id: String,
    pub source_user_id: String,
}

/// Logged time in seconds, `None` when the minutes do not fit
fn logged_seconds(entry: &TimeEntry) -> Option<i64> {
    let seconds = entry.minutes.checked_mul(60);
    if seconds.is_none() {
        warn!(time_entry = %entry.id, minutes = entry.minutes, "Logged time out of range, skipping");
    }
    seconds
}

impl WorklogDraft {
    pub fn from_entry(entry: &TimeEntry, timezone: &str, worklog_id: Option<&str>) -> Option<Self> {
        Some(Self {
            id: worklog_id.map(str::to_string),
            seconds: logged_seconds(entry)?,
            comment: entry.notes.clone(),
            started: worklog_started(&entry.date_performed, timezone),
            author_email: entry.user.email.clone(),
            source_task_id: entry.task_id.clone(),
            source_time_entry_id: entry.id.clone(),
            source_user_id: entry.user.id.clone(),
        })
    }

    pub fn request(&self) -> WorklogRequest {
        WorklogRequest {
            id: self.id.clone(),
            time_spent_seconds: self.seconds,
            comment: self.comment.clone(),
            started: self.started.clone(),
            author_email: self.author_email.clone(),
        }
    }
}

/// Update draft when the logged time, day or comment drifted
///
/// A worklog whose `started` value has no date part cannot be compared and
/// is skipped.
pub fn draft_update(entry: &TimeEntry, existing: &Worklog, timezone: &str) -> Option<WorklogDraft> {
    let Some(day) = started_date(&existing.started) else {
        warn!(
            worklog_id = %existing.id,
            started = %existing.started,
            "Existing worklog has no start date, skipping"
        );
        return None;
    };

    let seconds = logged_seconds(entry)?;

    let drifted = existing.time_spent_seconds != seconds
        || !day.eq_ignore_ascii_case(&entry.date_performed)
        || !existing.comment.eq_ignore_ascii_case(&entry.notes);
    if !drifted {
        return None;
    }
    WorklogDraft::from_entry(entry, timezone, Some(&existing.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{time_entry, worklog};

    #[test]
    fn test_draft_from_entry() {
        let entry = time_entry("3001", "601", 90, "2021-06-01");
        let draft = WorklogDraft::from_entry(&entry, "", None).unwrap();
        assert_eq!(draft.seconds, 5400);
        assert_eq!(draft.started, "2021-06-01T06:00:00.000+0530");
        assert_eq!(draft.source_task_id, "601");
        assert_eq!(draft.request().id, None);
    }

    #[test]
    fn test_update_only_on_drift() {
        let entry = time_entry("3001", "601", 60, "2021-06-01");
        let mut existing = worklog("88", 3600, "2021-06-01T06:00:00.000+0530");
        existing.comment = entry.notes.clone();
        assert_eq!(draft_update(&entry, &existing, "+0530"), None);

        existing.time_spent_seconds = 1800;
        let draft = draft_update(&entry, &existing, "+0530").unwrap();
        assert_eq!(draft.id.as_deref(), Some("88"));
        assert_eq!(draft.seconds, 3600);

        existing.time_spent_seconds = 3600;
        existing.started = "2021-06-02T06:00:00.000+0530".to_string();
        assert!(draft_update(&entry, &existing, "+0530").is_some());
    }

    #[test]
    fn test_undated_worklog_skipped() {
        let entry = time_entry("3001", "601", 30, "2021-06-01");
        let existing = worklog("88", 60, "yesterday");
        assert_eq!(draft_update(&entry, &existing, "+0530"), None);
    }

    #[test]
    fn test_out_of_range_minutes_dropped() {
        let mut entry = time_entry("3001", "601", 30, "2021-06-01");
        entry.minutes = i64::MAX / 2;
        assert_eq!(WorklogDraft::from_entry(&entry, "+0530", None), None);

        let existing = worklog("88", 1800, "2021-06-01T06:00:00.000+0530");
        assert_eq!(draft_update(&entry, &existing, "+0530"), None);
    }
}
