//! Entities and request shapes of the Target issue tracker

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetProject {
    pub id: i64,
    pub key: String,
    pub name: String,
}

/// Board a sprint belongs to; required to create a sprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RapidView {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sprint {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub state: String,
    /// Target date format, empty until the sprint is first updated
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
}

/// One entry of the issue type, status or priority catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
}

impl CatalogEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetUser {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueFields {
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub due_date: String,
    #[serde(default)]
    pub issue_type: Option<CatalogEntry>,
    #[serde(default)]
    pub status: Option<CatalogEntry>,
    #[serde(default)]
    pub priority: Option<CatalogEntry>,
    #[serde(default)]
    pub assignee: Option<TargetUser>,
    /// Rich-text sprint references, see [`crate::reference_tag`]
    #[serde(default)]
    pub sprint: Vec<String>,
    /// Key of the epic this issue is linked to
    #[serde(default)]
    pub epic_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub key: String,
    pub fields: IssueFields,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worklog {
    pub id: String,
    pub time_spent_seconds: i64,
    #[serde(default)]
    pub comment: String,
    /// `<date>T<time><offset>`
    pub started: String,
    #[serde(default)]
    pub author: Option<TargetUser>,
}

/// Full sprint definition sent on update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SprintUpdate {
    pub id: i64,
    pub name: String,
    pub start_date: String,
    pub end_date: String,
    pub rapid_view_id: i64,
}

/// Issue create/update request; catalog values are sent by id only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRequest {
    pub id: Option<String>,
    pub key: Option<String>,
    pub project_key: Option<String>,
    pub summary: String,
    pub description: String,
    pub due_date: String,
    pub assignee: Option<String>,
    pub issue_type_id: String,
    pub status_id: String,
    pub priority_id: String,
    pub sprint_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorklogRequest {
    pub id: Option<String>,
    pub time_spent_seconds: i64,
    pub comment: String,
    pub started: String,
    pub author_email: String,
}
