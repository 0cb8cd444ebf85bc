//! Durable mapping between Source and Target identifiers
//!
//! Lookups answer `Ok(None)` on a miss; an `Err` means the store itself
//! failed. At most one active record exists per (Source id, kind): the
//! `create_*` writes are upserts keyed by Source ids.

mod memory_store;
mod migrations;
mod sql_store;

pub use memory_store::MemoryCorrelationStore;
pub use sql_store::SqlCorrelationStore;

use crate::model::{
    IssueLink, NewProjectPair, ProjectPair, SprintLink, TaskCorrelation, WorklogCorrelation,
    WorklogLink,
};
use async_trait::async_trait;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("run deadline exceeded during {operation}")]
    DeadlineExceeded { operation: &'static str },
}

#[async_trait]
pub trait CorrelationStore: Send + Sync {
    async fn list_projects(&self) -> StoreResult<Vec<ProjectPair>>;

    async fn get_project(&self, id: i64) -> StoreResult<Option<ProjectPair>>;

    async fn add_project(&self, project: NewProjectPair) -> StoreResult<ProjectPair>;

    /// Issue record matching both the Source task and the Target issue
    async fn get_task_and_issue(
        &self,
        source_task_id: i64,
        target_issue_id: i64,
    ) -> StoreResult<Option<TaskCorrelation>>;

    /// Sprint record matching both the Source sub-task and the Target sprint
    async fn get_task_and_sprint(
        &self,
        source_task_id: i64,
        target_sprint_id: i64,
    ) -> StoreResult<Option<TaskCorrelation>>;

    /// Sprint record of a Source sub-task
    async fn get_task_if_exists(&self, source_task_id: i64)
        -> StoreResult<Option<TaskCorrelation>>;

    /// Sprint record of a Target sprint
    async fn get_sprint_if_exists(
        &self,
        target_sprint_id: i64,
    ) -> StoreResult<Option<TaskCorrelation>>;

    /// Issue record of a Source leaf task
    async fn get_task_in_sub_task(
        &self,
        source_task_id: i64,
    ) -> StoreResult<Option<TaskCorrelation>>;

    async fn get_time_entry(
        &self,
        source_time_entry_id: i64,
    ) -> StoreResult<Option<WorklogCorrelation>>;

    async fn get_time_entry_and_worklog(
        &self,
        source_time_entry_id: i64,
        target_worklog_id: i64,
    ) -> StoreResult<Option<WorklogCorrelation>>;

    async fn create_task_and_sprint(
        &self,
        project_id: i64,
        link: SprintLink,
    ) -> StoreResult<TaskCorrelation>;

    async fn create_task_and_issue(
        &self,
        project_id: i64,
        link: IssueLink,
    ) -> StoreResult<TaskCorrelation>;

    /// Rewrites an existing issue record; `updated_at` is stamped by the store
    async fn update_task_and_issue(&self, record: TaskCorrelation) -> StoreResult<TaskCorrelation>;

    async fn create_time_entry_and_worklog(
        &self,
        link: WorklogLink,
    ) -> StoreResult<WorklogCorrelation>;

    /// Rewrites an existing worklog record; `updated_at` is stamped by the store
    async fn update_time_entry_and_worklog(
        &self,
        record: WorklogCorrelation,
    ) -> StoreResult<WorklogCorrelation>;
}
