//! Contracts of the two remote systems
//!
//! Any implementation (HTTP, RPC, the snapshot-backed one in
//! [`crate::snapshot`]) reports a remote-side error, a transport error and an
//! empty payload alike as a [`ClientError`]; callers never see a partial success.

use crate::model::{
    CatalogEntry, Issue, IssueRequest, RapidView, SourceProject, SourceTask, Sprint, SprintUpdate,
    TargetProject, TargetUser, TimeEntry, Worklog, WorklogRequest,
};
use async_trait::async_trait;
use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("transport error during {operation}: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },

    #[error("{operation} rejected by remote: {message}")]
    Remote {
        operation: &'static str,
        message: String,
    },

    #[error("{operation} returned an empty payload")]
    Empty { operation: &'static str },

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("run deadline exceeded before {operation} completed")]
    DeadlineExceeded { operation: &'static str },
}

#[async_trait]
pub trait SourceClient: Send + Sync {
    async fn get_project_by_id(&self, workspace_id: &str) -> ClientResult<SourceProject>;

    /// Top-level tasks of a workspace, optionally restricted to an exact title
    async fn get_tasks_by_project_id(
        &self,
        workspace_id: &str,
        title: Option<&str>,
    ) -> ClientResult<Vec<SourceTask>>;

    async fn get_sub_tasks(&self, workspace_id: &str, parent_id: i64)
        -> ClientResult<Vec<SourceTask>>;

    async fn get_tasks_in_sub_task(
        &self,
        workspace_id: &str,
        sub_task_id: i64,
    ) -> ClientResult<Vec<SourceTask>>;

    async fn get_time_entries(&self, workspace_id: &str, task_id: &str)
        -> ClientResult<Vec<TimeEntry>>;
}

#[async_trait]
pub trait TargetClient: Send + Sync {
    async fn get_project(&self, project_id: i64) -> ClientResult<TargetProject>;

    async fn get_epic(&self, epic_key: &str) -> ClientResult<Issue>;

    async fn get_rapid_views(&self, project_key: &str) -> ClientResult<Vec<RapidView>>;

    async fn get_sprints(&self, project_key: &str) -> ClientResult<Vec<Sprint>>;

    async fn get_issues_by_sprint(
        &self,
        project_key: &str,
        sprint_name: &str,
    ) -> ClientResult<Vec<Issue>>;

    async fn get_issue_by_id(&self, project_key: &str, issue_id: &str) -> ClientResult<Issue>;

    async fn get_issue(&self, project_key: &str, issue_key: &str) -> ClientResult<Issue>;

    /// Creates an empty sprint on the board; details follow through `update_sprint`
    async fn create_sprint(&self, rapid_view_id: i64) -> ClientResult<Sprint>;

    async fn update_sprint(&self, sprint: &SprintUpdate) -> ClientResult<Sprint>;

    async fn create_issue(&self, request: &IssueRequest) -> ClientResult<Issue>;

    async fn update_issue(&self, request: &IssueRequest) -> ClientResult<()>;

    async fn create_worklog(&self, issue_key: &str, request: &WorklogRequest)
        -> ClientResult<Worklog>;

    async fn update_worklog(&self, issue_key: &str, request: &WorklogRequest)
        -> ClientResult<Worklog>;

    async fn get_issue_worklogs(&self, issue_key: &str) -> ClientResult<Vec<Worklog>>;

    async fn move_issue_to_sprint(&self, sprint_id: i64, issue_key: &str) -> ClientResult<()>;

    async fn add_issue_to_epic(&self, epic_key: &str, issue_key: &str) -> ClientResult<()>;

    async fn get_users(&self, project_key: &str) -> ClientResult<Vec<TargetUser>>;

    async fn get_issue_statuses(&self) -> ClientResult<Vec<CatalogEntry>>;

    async fn get_issue_priorities(&self) -> ClientResult<Vec<CatalogEntry>>;

    async fn get_issue_types(&self) -> ClientResult<Vec<CatalogEntry>>;
}
