use super::{JobOutcome, Phase, SyncPhase};
use crate::context::SyncContext;
use crate::engine::SprintsAndTasks;
use crate::matcher::{EntityMatcher, SprintMatcher};
use crate::model::SprintLink;
use crate::payload::sprint::{drifted, SprintDraft};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Sub-tasks of the milestone become sprints on the first rapid view
pub struct SprintPhase {
    ctx: SyncContext,
    project_id: i64,
    data: Arc<SprintsAndTasks>,
}

impl SprintPhase {
    pub fn new(ctx: SyncContext, project_id: i64, data: Arc<SprintsAndTasks>) -> Self {
        Self {
            ctx,
            project_id,
            data,
        }
    }

    fn rapid_view_id(&self) -> Option<i64> {
        self.data.rapid_views.first().map(|view| view.id)
    }
}

#[async_trait]
impl SyncPhase for SprintPhase {
    type Create = SprintDraft;
    type Update = SprintDraft;

    fn phase(&self) -> Phase {
        Phase::Sprints
    }

    async fn prepare_creates(&self, tx: mpsc::Sender<SprintDraft>) {
        let Some(rapid_view_id) = self.rapid_view_id() else {
            warn!(project_id = self.project_id, "No rapid views, skipping sprint creation");
            return;
        };
        let matcher = SprintMatcher::new(self.ctx.clone());
        let outcome = matcher
            .match_entities(&self.data.sub_tasks, &self.data.sprints, true)
            .await;

        for task in &outcome.entities {
            let Some(draft) = SprintDraft::from_task(task, rapid_view_id, None) else {
                continue;
            };
            if tx.send(draft).await.is_err() {
                return;
            }
        }
    }

    async fn prepare_updates(&self, tx: mpsc::Sender<SprintDraft>) {
        let Some(rapid_view_id) = self.rapid_view_id() else {
            return;
        };
        let matcher = SprintMatcher::new(self.ctx.clone());
        let outcome = matcher
            .match_entities(&self.data.sub_tasks, &self.data.sprints, false)
            .await;

        for task in &outcome.entities {
            let Some(sprint) = outcome.counterparts.get(&task.id) else {
                continue;
            };
            if !drifted(task, sprint) {
                continue;
            }
            let Some(draft) = SprintDraft::from_task(task, rapid_view_id, Some(sprint.id)) else {
                continue;
            };
            if tx.send(draft).await.is_err() {
                return;
            }
        }
    }

    async fn create(&self, draft: SprintDraft) -> JobOutcome {
        let ctx = &self.ctx;
        let created = match ctx
            .call_remote("create_sprint", ctx.target.create_sprint(draft.rapid_view_id))
            .await
        {
            Ok(sprint) => sprint,
            Err(e) => {
                error!(name = %draft.name, error = %e, "Failed to create sprint");
                return JobOutcome::Failed;
            }
        };

        // a fresh sprint has no name or dates until updated
        let update = draft.to_update(created.id);
        if let Err(e) = ctx
            .call_remote("update_sprint", ctx.target.update_sprint(&update))
            .await
        {
            error!(sprint_id = created.id, name = %draft.name, error = %e, "Created sprint but failed to fill it in");
            return JobOutcome::Failed;
        }

        let link = SprintLink {
            target_sprint_id: created.id,
            source_task_id: draft.source_task_id,
            source_parent_id: draft.source_parent_id,
        };
        match ctx
            .call_store(
                "create_task_and_sprint",
                ctx.store.create_task_and_sprint(self.project_id, link),
            )
            .await
        {
            Ok(_) => info!(sprint_id = created.id, name = %draft.name, "Created sprint and saved sync history"),
            Err(e) => warn!(sprint_id = created.id, name = %draft.name, error = %e, "Created sprint but failed to save sync history"),
        }
        JobOutcome::Synced
    }

    async fn update(&self, draft: SprintDraft) -> JobOutcome {
        let Some(sprint_id) = draft.id else {
            error!(name = %draft.name, "Sprint update draft without an id");
            return JobOutcome::Failed;
        };
        let ctx = &self.ctx;
        match ctx
            .call_remote("update_sprint", ctx.target.update_sprint(&draft.to_update(sprint_id)))
            .await
        {
            Ok(_) => {
                info!(sprint_id, name = %draft.name, "Updated sprint");
                JobOutcome::Synced
            }
            Err(e) => {
                error!(sprint_id, name = %draft.name, error = %e, "Failed to update sprint");
                JobOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::CorrelationStore;
    use crate::dispatch::run_phase;
    use crate::engine::collect::collect;
    use crate::test_utils::{dispatch_context, sample_pair};

    async fn sprint_phase(ctx: &SyncContext) -> Arc<SprintPhase> {
        let pair = sample_pair();
        let (sprints, _) = collect(ctx, &pair).await.unwrap();
        Arc::new(SprintPhase::new(ctx.clone(), pair.id, Arc::new(sprints)))
    }

    #[tokio::test]
    async fn test_sub_tasks_become_sprints() {
        let (ctx, target, store) = dispatch_context();
        let report = run_phase(sprint_phase(&ctx).await).await;

        assert_eq!((report.spawned, report.succeeded, report.failed), (2, 2, 0));
        assert_eq!(target.calls("update_sprint"), 2);
        let record = store.get_task_if_exists(501).await.unwrap().unwrap();
        let data = target.data().await;
        let sprint = data.sprints["SHOP"]
            .iter()
            .find(|s| s.id == record.target_sprint_id)
            .unwrap();
        assert_eq!(sprint.name, "Sprint 1");
    }

    #[tokio::test]
    async fn test_failed_fill_in_after_create_counts_failed() {
        let (ctx, target, store) = dispatch_context();
        target.fail_on("update_sprint");
        let report = run_phase(sprint_phase(&ctx).await).await;

        assert_eq!((report.spawned, report.succeeded, report.failed), (2, 0, 2));
        assert!(store.task_records().await.is_empty());
        // the created sprints stay behind unnamed and uncorrelated
        let data = target.data().await;
        assert_eq!(data.sprints["SHOP"].len(), 4);
        assert_eq!(data.sprints["SHOP"].iter().filter(|s| s.name.is_empty()).count(), 2);
    }

    #[tokio::test]
    async fn test_history_write_failure_still_counts_synced() {
        let (ctx, target, store) = dispatch_context();
        store.fail_on("create_task_and_sprint");
        let report = run_phase(sprint_phase(&ctx).await).await;

        assert_eq!((report.spawned, report.succeeded, report.failed), (2, 2, 0));
        assert_eq!(target.calls("update_sprint"), 2);
        assert!(store.task_records().await.is_empty());
    }
}
