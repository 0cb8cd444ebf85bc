//! Entities read from the Source task system
//!
//! Ids stay as strings: the Source API returns them that way and entities
//! with non-numeric ids are dropped at matching time, not at decode time.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceProject {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceUser {
    pub id: String,
    pub email: String,
}

/// Milestone, sub-task (sprint container) or leaf task (issue), depending on depth
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTask {
    pub id: String,
    pub workspace_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub due_date: String,
    #[serde(default)]
    pub story_type: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub assignee: Option<SourceUser>,
    #[serde(default)]
    pub parent_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: String,
    pub workspace_id: String,
    /// Leaf task the time was logged against
    pub task_id: String,
    pub minutes: i64,
    #[serde(default)]
    pub notes: String,
    /// `YYYY-MM-DD`
    pub date_performed: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    pub user: SourceUser,
}
