//! Rows of the correlation store

use serde::{Deserialize, Serialize};
use std::fmt;

/// Binds a Source workspace to a Target project and epic; one reconciliation run each
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectPair {
    pub id: i64,
    pub name: String,
    pub source_workspace_id: String,
    pub target_project_id: i64,
    pub target_project_key: String,
    pub target_epic_id: i64,
}

impl ProjectPair {
    /// `<project key>-<epic id>`
    pub fn epic_key(&self) -> String {
        format!("{}-{}", self.target_project_key, self.target_epic_id)
    }
}

/// A project pair before the store assigns its id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProjectPair {
    pub name: String,
    pub source_workspace_id: String,
    pub target_project_id: i64,
    pub target_project_key: String,
    pub target_epic_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CorrelationKind {
    Sprint,
    Issue,
}

impl CorrelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorrelationKind::Sprint => "sprint",
            CorrelationKind::Issue => "issue",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sprint" => Some(CorrelationKind::Sprint),
            "issue" => Some(CorrelationKind::Issue),
            _ => None,
        }
    }
}

impl fmt::Display for CorrelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source task ↔ Target sprint or issue
///
/// Sprint rows carry the sub-task in `source_task_id` and the milestone in
/// `source_parent_id`. Issue rows carry the leaf task and its sub-task, and
/// use the sprint id as the Target parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCorrelation {
    pub id: i64,
    pub project_id: i64,
    pub kind: CorrelationKind,
    pub source_task_id: i64,
    pub source_parent_id: i64,
    pub target_issue_id: Option<i64>,
    pub target_sprint_id: i64,
    pub target_parent_id: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
    pub deleted: bool,
}

/// Write request for a sprint correlation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SprintLink {
    pub target_sprint_id: i64,
    pub source_task_id: i64,
    pub source_parent_id: i64,
}

/// Write request for an issue correlation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssueLink {
    pub target_issue_id: i64,
    pub target_sprint_id: i64,
    pub source_task_id: i64,
    pub source_parent_id: i64,
}

/// Source time entry ↔ Target worklog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorklogCorrelation {
    pub id: i64,
    pub target_issue_id: i64,
    pub target_worklog_id: i64,
    pub source_time_entry_id: i64,
    /// Author email on the Target side
    pub target_user: String,
    pub source_user_id: i64,
    pub logged_seconds: i64,
    pub created_at: String,
    pub updated_at: String,
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorklogLink {
    pub target_issue_id: i64,
    pub target_worklog_id: i64,
    pub source_time_entry_id: i64,
    pub target_user: String,
    pub source_user_id: i64,
    pub logged_seconds: i64,
}
