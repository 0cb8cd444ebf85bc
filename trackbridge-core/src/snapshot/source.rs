use super::{CallProbe, SourceData};
use crate::clients::{ClientError, ClientResult, SourceClient};
use crate::model::{SourceProject, SourceTask, TimeEntry};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Read-only Source backed by [`SourceData`]
#[derive(Clone)]
pub struct SnapshotSourceClient {
    data: Arc<RwLock<SourceData>>,
    probe: CallProbe,
}

impl SnapshotSourceClient {
    pub fn new(data: SourceData) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
            probe: CallProbe::default(),
        }
    }

    pub fn probe(&self) -> &CallProbe {
        &self.probe
    }

    pub fn calls(&self, operation: &str) -> usize {
        self.probe.calls(operation)
    }

    pub fn fail_on(&self, operation: &'static str) {
        self.probe.fail_on(operation)
    }

    async fn children(&self, workspace_id: &str, parent_id: i64) -> Vec<SourceTask> {
        let parent = parent_id.to_string();
        let data = self.data.read().await;
        data.tasks
            .iter()
            .filter(|t| t.workspace_id == workspace_id && t.parent_id == parent)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SourceClient for SnapshotSourceClient {
    async fn get_project_by_id(&self, workspace_id: &str) -> ClientResult<SourceProject> {
        self.probe.enter("get_project_by_id")?;
        let data = self.data.read().await;
        data.projects
            .iter()
            .find(|p| p.id == workspace_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound {
                what: format!("workspace {}", workspace_id),
            })
    }

    async fn get_tasks_by_project_id(
        &self,
        workspace_id: &str,
        title: Option<&str>,
    ) -> ClientResult<Vec<SourceTask>> {
        self.probe.enter("get_tasks_by_project_id")?;
        let data = self.data.read().await;
        Ok(data
            .tasks
            .iter()
            .filter(|t| t.workspace_id == workspace_id && t.parent_id.is_empty())
            .filter(|t| title.map_or(true, |wanted| t.title == wanted))
            .cloned()
            .collect())
    }

    async fn get_sub_tasks(
        &self,
        workspace_id: &str,
        parent_id: i64,
    ) -> ClientResult<Vec<SourceTask>> {
        self.probe.enter("get_sub_tasks")?;
        Ok(self.children(workspace_id, parent_id).await)
    }

    async fn get_tasks_in_sub_task(
        &self,
        workspace_id: &str,
        sub_task_id: i64,
    ) -> ClientResult<Vec<SourceTask>> {
        self.probe.enter("get_tasks_in_sub_task")?;
        Ok(self.children(workspace_id, sub_task_id).await)
    }

    async fn get_time_entries(
        &self,
        workspace_id: &str,
        task_id: &str,
    ) -> ClientResult<Vec<TimeEntry>> {
        self.probe.enter("get_time_entries")?;
        let data = self.data.read().await;
        Ok(data
            .time_entries
            .iter()
            .filter(|e| e.workspace_id == workspace_id && e.task_id == task_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_snapshot;

    #[tokio::test]
    async fn test_hierarchy_queries() {
        let client = SnapshotSourceClient::new(sample_snapshot().source);

        let milestones = client
            .get_tasks_by_project_id("900", Some("Construction"))
            .await
            .unwrap();
        assert_eq!(milestones.len(), 1);
        assert_eq!(milestones[0].id, "500");

        let sub_tasks = client.get_sub_tasks("900", 500).await.unwrap();
        assert_eq!(sub_tasks.len(), 2);

        let leaves = client.get_tasks_in_sub_task("900", 501).await.unwrap();
        assert!(leaves.iter().all(|t| t.parent_id == "501"));

        assert!(client
            .get_tasks_by_project_id("900", Some("Discovery"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_unknown_workspace() {
        let client = SnapshotSourceClient::new(sample_snapshot().source);
        assert!(matches!(
            client.get_project_by_id("404").await,
            Err(ClientError::NotFound { .. })
        ));
        assert_eq!(client.calls("get_project_by_id"), 1);
    }
}
