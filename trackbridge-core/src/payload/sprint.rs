//! Sub-task → sprint

use crate::dates::{source_to_target, target_to_source};
use crate::model::{SourceTask, Sprint, SprintUpdate};

/// End time used when a sprint starts and ends on the same day
const SAME_DAY_END: &str = "01:00:00";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SprintDraft {
    /// Set when updating an existing sprint
    pub id: Option<i64>,
    pub name: String,
    /// Target date layout, empty when the Source date is unusable
    pub start_date: String,
    pub end_date: String,
    pub rapid_view_id: i64,
    pub source_task_id: i64,
    /// Milestone the sub-task belongs to, 0 when unknown
    pub source_parent_id: i64,
}

impl SprintDraft {
    /// `None` when the sub-task id is not numeric
    pub fn from_task(task: &SourceTask, rapid_view_id: i64, sprint_id: Option<i64>) -> Option<Self> {
        let source_task_id = task.id.parse().ok()?;
        let end_time = (task.start_date == task.due_date).then_some(SAME_DAY_END);
        Some(Self {
            id: sprint_id,
            name: task.title.clone(),
            start_date: source_to_target(&task.start_date, None).unwrap_or_default(),
            end_date: source_to_target(&task.due_date, end_time).unwrap_or_default(),
            rapid_view_id,
            source_task_id,
            source_parent_id: task.parent_id.parse().unwrap_or(0),
        })
    }

    pub fn to_update(&self, sprint_id: i64) -> SprintUpdate {
        SprintUpdate {
            id: sprint_id,
            name: self.name.clone(),
            start_date: self.start_date.clone(),
            end_date: self.end_date.clone(),
            rapid_view_id: self.rapid_view_id,
        }
    }
}

/// Title, start or due date of the sub-task no longer match the sprint
pub fn drifted(task: &SourceTask, sprint: &Sprint) -> bool {
    let start = target_to_source(&sprint.start_date).unwrap_or_default();
    let end = target_to_source(&sprint.end_date).unwrap_or_default();
    !task.title.eq_ignore_ascii_case(&sprint.name)
        || !task.start_date.eq_ignore_ascii_case(&start)
        || !task.due_date.eq_ignore_ascii_case(&end)
}
