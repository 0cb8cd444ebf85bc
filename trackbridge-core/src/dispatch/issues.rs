use super::{JobOutcome, Phase, SyncPhase};
use crate::context::SyncContext;
use crate::dates::normalize_persisted;
use crate::engine::IssuesAndTasks;
use crate::matcher::{EntityMatcher, IssueMatcher};
use crate::model::{IssueLink, ProjectPair, TaskCorrelation};
use crate::payload::IssueDraft;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Leaf tasks of every sub-task become issues in the sub-task's sprint
pub struct IssuePhase {
    ctx: SyncContext,
    pair: ProjectPair,
    data: Arc<IssuesAndTasks>,
}

impl IssuePhase {
    pub fn new(ctx: SyncContext, pair: ProjectPair, data: Arc<IssuesAndTasks>) -> Self {
        Self { ctx, pair, data }
    }

    /// Sprint a sub-task was synced to
    async fn sprint_of(&self, sub_task_id: i64) -> Option<i64> {
        let ctx = &self.ctx;
        match ctx
            .call_store("get_task_if_exists", ctx.store.get_task_if_exists(sub_task_id))
            .await
        {
            Ok(record) => record.map(|r| r.target_sprint_id),
            Err(e) => {
                warn!(sub_task_id, error = %e, "Failed to look up sprint of sub-task");
                None
            }
        }
    }

    async fn issue_record(&self, task_id: i64) -> Option<TaskCorrelation> {
        let ctx = &self.ctx;
        match ctx
            .call_store("get_task_in_sub_task", ctx.store.get_task_in_sub_task(task_id))
            .await
        {
            Ok(record) => record,
            Err(e) => {
                warn!(task_id, error = %e, "Failed to look up issue record");
                None
            }
        }
    }

    /// Rewrite the issue record with the current parent and sprint
    async fn record_update(&self, draft: &IssueDraft, issue_key: &str, sprint_id: i64) -> Result<(), String> {
        let ctx = &self.ctx;
        let record = self
            .issue_record(draft.source_task_id)
            .await
            .ok_or_else(|| format!("no issue record for task {}", draft.source_task_id))?;
        let created_at = normalize_persisted(&record.created_at)
            .ok_or_else(|| format!("unparseable created_at '{}'", record.created_at))?;

        let issue = ctx
            .call_remote(
                "get_issue",
                ctx.target.get_issue(&self.data.project.key, issue_key),
            )
            .await
            .map_err(|e| e.to_string())?;
        let issue_id: i64 = issue
            .id
            .parse()
            .map_err(|_| format!("non-numeric issue id '{}'", issue.id))?;

        let updated = TaskCorrelation {
            project_id: self.pair.id,
            source_task_id: draft.source_task_id,
            source_parent_id: draft.source_parent_id,
            target_issue_id: Some(issue_id),
            target_sprint_id: sprint_id,
            target_parent_id: Some(sprint_id),
            created_at,
            ..record
        };
        ctx.call_store("update_task_and_issue", ctx.store.update_task_and_issue(updated))
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    /// Move the issue when its task changed sub-task; returns the sprint it is in now
    async fn follow_parent(&self, draft: &IssueDraft, issue_key: &str, current: Option<i64>) -> Option<i64> {
        let recorded_parent = self
            .issue_record(draft.source_task_id)
            .await
            .map(|r| r.source_parent_id)
            .unwrap_or(0);
        if recorded_parent == draft.source_parent_id {
            return current;
        }

        let Some(sprint_id) = self.sprint_of(draft.source_parent_id).await else {
            error!(issue = issue_key, sub_task_id = draft.source_parent_id, "New sub-task has no sprint");
            return current;
        };
        let ctx = &self.ctx;
        if let Err(e) = ctx
            .call_remote(
                "move_issue_to_sprint",
                ctx.target.move_issue_to_sprint(sprint_id, issue_key),
            )
            .await
        {
            error!(issue = issue_key, sprint_id, error = %e, "Failed to move issue to sprint");
            return current;
        }

        match self.record_update(draft, issue_key, sprint_id).await {
            Ok(()) => info!(issue = issue_key, sprint_id, "Moved issue to sprint and saved sync history"),
            Err(e) => warn!(issue = issue_key, sprint_id, error = %e, "Moved issue to sprint but failed to save sync history"),
        }
        Some(sprint_id)
    }
}

#[async_trait]
impl SyncPhase for IssuePhase {
    type Create = IssueDraft;
    type Update = IssueDraft;

    fn phase(&self) -> Phase {
        Phase::Issues
    }

    async fn prepare_creates(&self, tx: mpsc::Sender<IssueDraft>) {
        let matcher = IssueMatcher::new(self.ctx.clone());
        let outcome = matcher
            .match_entities(&self.data.tasks, &self.data.issues, true)
            .await;

        for task in &outcome.entities {
            let Some(draft) = IssueDraft::for_creation(task, &self.data.users, &self.ctx.resolver)
            else {
                warn!(task_id = %task.id, parent_id = %task.parent_id, "Cannot draft issue for task");
                continue;
            };
            if tx.send(draft).await.is_err() {
                return;
            }
        }
    }

    async fn prepare_updates(&self, tx: mpsc::Sender<IssueDraft>) {
        let matcher = IssueMatcher::new(self.ctx.clone());
        let outcome = matcher
            .match_entities(&self.data.tasks, &self.data.issues, false)
            .await;

        for task in &outcome.entities {
            let Some(existing) = outcome.counterparts.get(&task.id) else {
                continue;
            };
            let Some(draft) =
                IssueDraft::for_update(task, existing, &self.data.users, &self.ctx.resolver)
            else {
                continue;
            };
            if tx.send(draft).await.is_err() {
                return;
            }
        }
    }

    async fn create(&self, draft: IssueDraft) -> JobOutcome {
        let ctx = &self.ctx;
        let Some(sprint_id) = self.sprint_of(draft.source_parent_id).await else {
            error!(task_id = draft.source_task_id, sub_task_id = draft.source_parent_id, "Failed to retrieve sprint id for issue");
            return JobOutcome::Failed;
        };
        let Some(request) = draft.creation_request(&self.data.project.key, sprint_id) else {
            error!(task_id = draft.source_task_id, "Failed to generate issue for creation");
            return JobOutcome::Failed;
        };

        let created = match ctx
            .call_remote("create_issue", ctx.target.create_issue(&request))
            .await
        {
            Ok(issue) => issue,
            Err(e) => {
                error!(task_id = draft.source_task_id, error = %e, "Failed to create issue");
                return JobOutcome::Failed;
            }
        };

        let Ok(issue_id) = created.id.parse::<i64>() else {
            warn!(issue = %created.key, id = %created.id, "Created issue has a non-numeric id, sync history not saved");
            return JobOutcome::Synced;
        };
        let link = IssueLink {
            target_issue_id: issue_id,
            target_sprint_id: sprint_id,
            source_task_id: draft.source_task_id,
            source_parent_id: draft.source_parent_id,
        };
        if let Err(e) = ctx
            .call_store(
                "create_task_and_issue",
                ctx.store.create_task_and_issue(self.pair.id, link),
            )
            .await
        {
            warn!(issue = %created.key, error = %e, "Created issue but failed to save sync history");
            return JobOutcome::Synced;
        }
        info!(issue = %created.key, sprint_id, "Created issue in sprint and saved sync history");

        let epic_key = &self.data.epic.key;
        match ctx
            .call_remote(
                "add_issue_to_epic",
                ctx.target.add_issue_to_epic(epic_key, &created.key),
            )
            .await
        {
            Ok(()) => info!(issue = %created.key, epic = %epic_key, "Added issue to epic"),
            Err(e) => error!(issue = %created.key, epic = %epic_key, error = %e, "Failed to add issue to epic"),
        }
        JobOutcome::Synced
    }

    async fn update(&self, draft: IssueDraft) -> JobOutcome {
        let Some(existing) = draft.existing.clone() else {
            error!(task_id = draft.source_task_id, "Issue update draft without an existing issue");
            return JobOutcome::Failed;
        };
        let sprint_id = self
            .follow_parent(&draft, &existing.key, existing.sprint_id)
            .await;

        if !draft.to_be_updated {
            return JobOutcome::Unchanged;
        }

        let ctx = &self.ctx;
        let Some(request) = draft.update_request(&ctx.resolver) else {
            error!(issue = %existing.key, "Failed to generate an update object for the issue");
            return JobOutcome::Failed;
        };
        if let Err(e) = ctx
            .call_remote("update_issue", ctx.target.update_issue(&request))
            .await
        {
            error!(issue = %existing.key, error = %e, "Failed to update issue");
            return JobOutcome::Failed;
        }

        let Some(sprint_id) = sprint_id else {
            warn!(issue = %existing.key, "Updated issue but its sprint is unknown, sync history not saved");
            return JobOutcome::Synced;
        };
        match self.record_update(&draft, &existing.key, sprint_id).await {
            Ok(()) => info!(issue = %existing.key, sprint_id, "Updated issue and saved sync history"),
            Err(e) => warn!(issue = %existing.key, sprint_id, error = %e, "Updated issue but failed to save sync history"),
        }
        JobOutcome::Synced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::{CorrelationStore, MemoryCorrelationStore};
    use crate::dispatch::{run_phase, SprintPhase, WorklogPhase};
    use crate::engine::collect::collect;
    use crate::model::CorrelationKind;
    use crate::test_utils::{dispatch_context, sample_pair};

    /// Collect, sync the sprints and hand back the issue phase input
    async fn with_sprints(ctx: &SyncContext) -> IssuesAndTasks {
        let pair = sample_pair();
        let (sprints, issues) = collect(ctx, &pair).await.unwrap();
        let report = run_phase(Arc::new(SprintPhase::new(ctx.clone(), pair.id, Arc::new(sprints)))).await;
        assert_eq!(report.failed, 0);
        issues
    }

    fn issue_phase(ctx: &SyncContext, data: &Arc<IssuesAndTasks>) -> Arc<IssuePhase> {
        Arc::new(IssuePhase::new(ctx.clone(), sample_pair(), data.clone()))
    }

    async fn issue_records(store: &MemoryCorrelationStore) -> Vec<TaskCorrelation> {
        store
            .task_records()
            .await
            .into_iter()
            .filter(|r| r.kind == CorrelationKind::Issue)
            .collect()
    }

    #[tokio::test]
    async fn test_epic_link_failure_is_only_logged() {
        let (ctx, target, store) = dispatch_context();
        let data = Arc::new(with_sprints(&ctx).await);
        target.fail_on("add_issue_to_epic");

        let report = run_phase(issue_phase(&ctx, &data)).await;
        assert_eq!((report.spawned, report.succeeded, report.failed), (3, 3, 0));
        assert_eq!(target.calls("add_issue_to_epic"), 3);
        assert_eq!(issue_records(&store).await.len(), 3);

        let worklogs = run_phase(Arc::new(WorklogPhase::new(ctx.clone(), data))).await;
        assert_eq!((worklogs.succeeded, worklogs.failed), (2, 0));
    }

    #[tokio::test]
    async fn test_history_write_failure_after_create_counts_synced() {
        let (ctx, target, store) = dispatch_context();
        let data = Arc::new(with_sprints(&ctx).await);
        store.fail_on("create_task_and_issue");

        let report = run_phase(issue_phase(&ctx, &data)).await;
        assert_eq!((report.spawned, report.succeeded, report.failed), (3, 3, 0));
        assert!(issue_records(&store).await.is_empty());
        // without a record the issue is not linked to the epic either
        assert_eq!(target.calls("add_issue_to_epic"), 0);
        assert_eq!(target.data().await.issues["SHOP"].len(), 4);
    }

    #[tokio::test]
    async fn test_history_write_failure_after_update_counts_synced() {
        let (ctx, target, store) = dispatch_context();
        let data = Arc::new(with_sprints(&ctx).await);
        run_phase(issue_phase(&ctx, &data)).await;
        let before = store.get_task_in_sub_task(602).await.unwrap().unwrap();

        let (_, mut data) = collect(&ctx, &sample_pair()).await.unwrap();
        let task = data.tasks.iter_mut().find(|t| t.id == "602").unwrap();
        task.title = "Add checkout flow".to_string();
        store.fail_on("update_task_and_issue");

        let report = run_phase(issue_phase(&ctx, &Arc::new(data))).await;
        assert_eq!(
            (report.spawned, report.succeeded, report.unchanged, report.failed),
            (3, 1, 2, 0)
        );
        assert_eq!(target.calls("update_issue"), 1);
        assert!(target.data().await.issues["SHOP"]
            .iter()
            .any(|i| i.fields.summary == "Add checkout flow"));
        let after = store.get_task_in_sub_task(602).await.unwrap().unwrap();
        assert_eq!(after.updated_at, before.updated_at);
    }
}
