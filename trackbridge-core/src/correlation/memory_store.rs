//! In-memory correlation store
//!
//! Used by tests and by dry runs that must not touch the database.

use super::{CorrelationStore, StoreError, StoreResult};
use crate::dates::persisted_now;
use crate::model::{
    CorrelationKind, IssueLink, NewProjectPair, ProjectPair, SprintLink, TaskCorrelation,
    WorklogCorrelation, WorklogLink,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    projects: BTreeMap<i64, ProjectPair>,
    tasks: BTreeMap<i64, TaskCorrelation>,
    worklogs: BTreeMap<i64, WorklogCorrelation>,
    next_id: i64,
}

impl Tables {
    fn allocate(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn active_task(&self, kind: CorrelationKind, source_task_id: i64) -> Option<&TaskCorrelation> {
        self.tasks
            .values()
            .find(|t| !t.deleted && t.kind == kind && t.source_task_id == source_task_id)
    }

    fn upsert_task(
        &mut self,
        project_id: i64,
        kind: CorrelationKind,
        source_task_id: i64,
        fill: impl FnOnce(&mut TaskCorrelation),
    ) -> TaskCorrelation {
        let now = persisted_now();
        let id = match self.active_task(kind, source_task_id) {
            Some(existing) => existing.id,
            None => self.allocate(),
        };
        let record = self.tasks.entry(id).or_insert_with(|| TaskCorrelation {
            id,
            project_id,
            kind,
            source_task_id,
            source_parent_id: 0,
            target_issue_id: None,
            target_sprint_id: 0,
            target_parent_id: None,
            created_at: now.clone(),
            updated_at: now.clone(),
            deleted: false,
        });
        record.project_id = project_id;
        record.updated_at = now;
        fill(record);
        record.clone()
    }
}

/// Correlation store backed by ordered maps
#[derive(Clone, Default)]
pub struct MemoryCorrelationStore {
    tables: Arc<RwLock<Tables>>,
    failing: Arc<Mutex<HashSet<&'static str>>>,
}

impl MemoryCorrelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn failing(&self) -> MutexGuard<'_, HashSet<&'static str>> {
        self.failing.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fail every later call of the write `operation` with a storage error
    pub fn fail_on(&self, operation: &'static str) {
        self.failing().insert(operation);
    }

    pub fn recover(&self, operation: &'static str) {
        self.failing().remove(operation);
    }

    fn enter(&self, operation: &'static str) -> StoreResult<()> {
        if self.failing().contains(operation) {
            return Err(StoreError::Storage(format!("injected failure in {}", operation)));
        }
        Ok(())
    }

    /// Every active task record, for assertions
    pub async fn task_records(&self) -> Vec<TaskCorrelation> {
        let tables = self.tables.read().await;
        tables.tasks.values().filter(|t| !t.deleted).cloned().collect()
    }
}

#[async_trait]
impl CorrelationStore for MemoryCorrelationStore {
    async fn list_projects(&self) -> StoreResult<Vec<ProjectPair>> {
        let tables = self.tables.read().await;
        Ok(tables.projects.values().cloned().collect())
    }

    async fn get_project(&self, id: i64) -> StoreResult<Option<ProjectPair>> {
        let tables = self.tables.read().await;
        Ok(tables.projects.get(&id).cloned())
    }

    async fn add_project(&self, project: NewProjectPair) -> StoreResult<ProjectPair> {
        let mut tables = self.tables.write().await;
        let id = tables.allocate();
        let pair = ProjectPair {
            id,
            name: project.name,
            source_workspace_id: project.source_workspace_id,
            target_project_id: project.target_project_id,
            target_project_key: project.target_project_key,
            target_epic_id: project.target_epic_id,
        };
        tables.projects.insert(id, pair.clone());
        Ok(pair)
    }

    async fn get_task_and_issue(
        &self,
        source_task_id: i64,
        target_issue_id: i64,
    ) -> StoreResult<Option<TaskCorrelation>> {
        let tables = self.tables.read().await;
        Ok(tables
            .active_task(CorrelationKind::Issue, source_task_id)
            .filter(|t| t.target_issue_id == Some(target_issue_id))
            .cloned())
    }

    async fn get_task_and_sprint(
        &self,
        source_task_id: i64,
        target_sprint_id: i64,
    ) -> StoreResult<Option<TaskCorrelation>> {
        let tables = self.tables.read().await;
        Ok(tables
            .active_task(CorrelationKind::Sprint, source_task_id)
            .filter(|t| t.target_sprint_id == target_sprint_id)
            .cloned())
    }

    async fn get_task_if_exists(
        &self,
        source_task_id: i64,
    ) -> StoreResult<Option<TaskCorrelation>> {
        let tables = self.tables.read().await;
        Ok(tables
            .active_task(CorrelationKind::Sprint, source_task_id)
            .cloned())
    }

    async fn get_sprint_if_exists(
        &self,
        target_sprint_id: i64,
    ) -> StoreResult<Option<TaskCorrelation>> {
        let tables = self.tables.read().await;
        Ok(tables
            .tasks
            .values()
            .find(|t| {
                !t.deleted && t.kind == CorrelationKind::Sprint && t.target_sprint_id == target_sprint_id
            })
            .cloned())
    }

    async fn get_task_in_sub_task(
        &self,
        source_task_id: i64,
    ) -> StoreResult<Option<TaskCorrelation>> {
        let tables = self.tables.read().await;
        Ok(tables
            .active_task(CorrelationKind::Issue, source_task_id)
            .cloned())
    }

    async fn get_time_entry(
        &self,
        source_time_entry_id: i64,
    ) -> StoreResult<Option<WorklogCorrelation>> {
        let tables = self.tables.read().await;
        Ok(tables
            .worklogs
            .values()
            .find(|w| !w.deleted && w.source_time_entry_id == source_time_entry_id)
            .cloned())
    }

    async fn get_time_entry_and_worklog(
        &self,
        source_time_entry_id: i64,
        target_worklog_id: i64,
    ) -> StoreResult<Option<WorklogCorrelation>> {
        Ok(self
            .get_time_entry(source_time_entry_id)
            .await?
            .filter(|w| w.target_worklog_id == target_worklog_id))
    }

    async fn create_task_and_sprint(
        &self,
        project_id: i64,
        link: SprintLink,
    ) -> StoreResult<TaskCorrelation> {
        self.enter("create_task_and_sprint")?;
        let mut tables = self.tables.write().await;
        Ok(tables.upsert_task(
            project_id,
            CorrelationKind::Sprint,
            link.source_task_id,
            |record| {
                record.source_parent_id = link.source_parent_id;
                record.target_sprint_id = link.target_sprint_id;
            },
        ))
    }

    async fn create_task_and_issue(
        &self,
        project_id: i64,
        link: IssueLink,
    ) -> StoreResult<TaskCorrelation> {
        self.enter("create_task_and_issue")?;
        let mut tables = self.tables.write().await;
        Ok(tables.upsert_task(
            project_id,
            CorrelationKind::Issue,
            link.source_task_id,
            |record| {
                record.source_parent_id = link.source_parent_id;
                record.target_issue_id = Some(link.target_issue_id);
                record.target_sprint_id = link.target_sprint_id;
                record.target_parent_id = Some(link.target_sprint_id);
            },
        ))
    }

    async fn update_task_and_issue(&self, record: TaskCorrelation) -> StoreResult<TaskCorrelation> {
        self.enter("update_task_and_issue")?;
        let mut tables = self.tables.write().await;
        let slot = tables
            .tasks
            .get_mut(&record.id)
            .filter(|t| !t.deleted)
            .ok_or_else(|| StoreError::NotFound(format!("task correlation {}", record.id)))?;
        *slot = TaskCorrelation {
            updated_at: persisted_now(),
            ..record
        };
        Ok(slot.clone())
    }

    async fn create_time_entry_and_worklog(
        &self,
        link: WorklogLink,
    ) -> StoreResult<WorklogCorrelation> {
        self.enter("create_time_entry_and_worklog")?;
        let mut tables = self.tables.write().await;
        let now = persisted_now();
        let existing = tables
            .worklogs
            .values()
            .find(|w| !w.deleted && w.source_time_entry_id == link.source_time_entry_id)
            .map(|w| (w.id, w.created_at.clone()));
        let (id, created_at) = match existing {
            Some(found) => found,
            None => (tables.allocate(), now.clone()),
        };
        let record = WorklogCorrelation {
            id,
            target_issue_id: link.target_issue_id,
            target_worklog_id: link.target_worklog_id,
            source_time_entry_id: link.source_time_entry_id,
            target_user: link.target_user,
            source_user_id: link.source_user_id,
            logged_seconds: link.logged_seconds,
            created_at,
            updated_at: now,
            deleted: false,
        };
        tables.worklogs.insert(id, record.clone());
        Ok(record)
    }

    async fn update_time_entry_and_worklog(
        &self,
        record: WorklogCorrelation,
    ) -> StoreResult<WorklogCorrelation> {
        self.enter("update_time_entry_and_worklog")?;
        let mut tables = self.tables.write().await;
        let slot = tables
            .worklogs
            .get_mut(&record.id)
            .filter(|w| !w.deleted)
            .ok_or_else(|| StoreError::NotFound(format!("worklog correlation {}", record.id)))?;
        *slot = WorklogCorrelation {
            updated_at: persisted_now(),
            ..record
        };
        Ok(slot.clone())
    }
}
