//! Project-level orchestration
//!
//! A project sync collects both systems' state once, then runs the sprint,
//! issue and worklog phases strictly one after another. Issues need the
//! sprint correlations written by the first phase, worklogs need the issue
//! correlations written by the second.

pub(crate) mod collect;
mod report;

pub use collect::{IssuesAndTasks, SprintsAndTasks};
pub use report::{progress_bar, OutcomeSummary, ProjectOutcome, ProjectReport, RunReport};

use crate::context::SyncContext;
use crate::dispatch::{run_phase, IssuePhase, SprintPhase, WorklogPhase};
use crate::errors::SyncResult;
use crate::metrics::{record_project, Timer};
use crate::model::ProjectPair;
use crate::validator::{ConfigurationValidator, RemoteValidator};
use std::sync::Arc;
use tracing::{error, info, warn};

const PROGRESS_WIDTH: usize = 20;

pub struct Reconciler {
    ctx: SyncContext,
    validator: Arc<dyn ConfigurationValidator>,
}

impl Reconciler {
    pub fn new(ctx: SyncContext) -> Self {
        let validator = Arc::new(RemoteValidator::new(ctx.clone()));
        Self { ctx, validator }
    }

    pub fn with_validator(ctx: SyncContext, validator: Arc<dyn ConfigurationValidator>) -> Self {
        Self { ctx, validator }
    }

    /// Collect the project's data and run the three phases in order
    pub async fn run_project(&self, pair: &ProjectPair) -> SyncResult<ProjectReport> {
        let timer = Timer::new("sync.project.duration_ms");
        info!(project = %pair.name, workspace = %pair.source_workspace_id, target = %pair.target_project_key, "Starting project sync");

        let (sprint_data, issue_data) = collect::collect(&self.ctx, pair).await?;
        let issue_data = Arc::new(issue_data);

        let sprints = run_phase(Arc::new(SprintPhase::new(
            self.ctx.clone(),
            pair.id,
            Arc::new(sprint_data),
        )))
        .await;
        let issues = run_phase(Arc::new(IssuePhase::new(
            self.ctx.clone(),
            pair.clone(),
            issue_data.clone(),
        )))
        .await;
        let worklogs = run_phase(Arc::new(WorklogPhase::new(self.ctx.clone(), issue_data))).await;

        let report = ProjectReport {
            project: pair.name.clone(),
            phases: vec![sprints, issues, worklogs],
        };
        timer.stop();
        info!(
            project = %pair.name,
            jobs = report.spawned(),
            failed = report.failed(),
            "Finished project sync"
        );
        Ok(report)
    }

    /// Validate and sync every stored project pair, one after another
    pub async fn run_all(&self) -> SyncResult<RunReport> {
        let ctx = &self.ctx;
        let pairs = ctx
            .call_store("list_projects", ctx.store.list_projects())
            .await?;
        let total = pairs.len();
        info!(projects = total, "Loaded sync configurations");

        let mut report = RunReport::default();
        for (done, pair) in pairs.iter().enumerate() {
            let outcome = if !self.validator.is_valid(pair).await {
                warn!(project = %pair.name, "Invalid sync configuration, skipping");
                ProjectOutcome::Skipped {
                    project: pair.name.clone(),
                }
            } else {
                match self.run_project(pair).await {
                    Ok(project) => ProjectOutcome::Synced(project),
                    Err(e) => {
                        error!(project = %pair.name, error = %e, "Project sync failed");
                        ProjectOutcome::Failed {
                            project: pair.name.clone(),
                            error: e.to_string(),
                        }
                    }
                }
            };
            record_project(outcome.label());
            info!(
                project = %pair.name,
                outcome = outcome.label(),
                progress = %progress_bar(done + 1, total, PROGRESS_WIDTH),
                "Sync configuration processed"
            );
            report.outcomes.push(outcome);
        }

        info!(
            started = report.started(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Sync run complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::correlation::{CorrelationStore, MemoryCorrelationStore};
    use crate::dispatch::Phase;
    use crate::equivalence::EquivalenceResolver;
    use crate::model::NewProjectPair;
    use crate::snapshot::{SnapshotSourceClient, SnapshotTargetClient};
    use crate::test_utils::{sample_pair, sample_snapshot, snapshot_context, standard_catalog};

    fn pair_request(name: &str, workspace: &str) -> NewProjectPair {
        NewProjectPair {
            name: name.to_string(),
            source_workspace_id: workspace.to_string(),
            target_project_id: 10100,
            target_project_key: "SHOP".to_string(),
            target_epic_id: 42,
        }
    }

    #[tokio::test]
    async fn test_first_run_creates_everything() {
        let (ctx, _source, target) = snapshot_context();
        let report = Reconciler::new(ctx).run_project(&sample_pair()).await.unwrap();

        let phases: Vec<_> = report.phases.iter().map(|r| r.phase).collect();
        assert_eq!(phases, vec![Phase::Sprints, Phase::Issues, Phase::Worklogs]);
        assert_eq!(report.phase(Phase::Sprints).unwrap().succeeded, 2);
        assert_eq!(report.phase(Phase::Issues).unwrap().succeeded, 3);
        assert_eq!(report.phase(Phase::Worklogs).unwrap().succeeded, 2);
        assert_eq!(report.failed(), 0);

        let data = target.data().await;
        let issues = &data.issues["SHOP"];
        assert_eq!(issues.len(), 4);
        let cart = issues.iter().find(|i| i.fields.summary == "Build cart").unwrap();
        assert_eq!(cart.fields.epic_link.as_deref(), Some("SHOP-42"));
        assert_eq!(cart.fields.assignee.as_ref().unwrap().name, "dana");
        assert_eq!(data.worklogs[&cart.key][0].time_spent_seconds, 5400);
    }

    #[tokio::test]
    async fn test_missing_rapid_views_fail_the_project() {
        let mut snapshot = sample_snapshot();
        snapshot.target.rapid_views.clear();
        let ctx = SyncContext::new(
            Arc::new(SnapshotSourceClient::new(snapshot.source)),
            Arc::new(SnapshotTargetClient::new(snapshot.target)),
            Arc::new(MemoryCorrelationStore::new()),
            EquivalenceResolver::new(standard_catalog()),
            SyncConfig::default(),
        );
        assert!(Reconciler::new(ctx).run_project(&sample_pair()).await.is_err());
    }

    #[tokio::test]
    async fn test_run_all_skips_invalid_pairs() {
        let snapshot = sample_snapshot();
        let store = MemoryCorrelationStore::new();
        store.add_project(pair_request("Storefront", "900")).await.unwrap();
        store.add_project(pair_request("Ghost", "404")).await.unwrap();
        let target = SnapshotTargetClient::new(snapshot.target);
        let ctx = SyncContext::new(
            Arc::new(SnapshotSourceClient::new(snapshot.source)),
            Arc::new(target.clone()),
            Arc::new(store),
            EquivalenceResolver::new(standard_catalog()),
            SyncConfig::default(),
        );

        let report = Reconciler::new(ctx).run_all().await.unwrap();
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.started(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.outcomes[1].project(), "Ghost");
        assert_eq!(target.calls("create_issue"), 3);
    }

    #[tokio::test]
    async fn test_rejected_pairs_are_never_fetched() {
        struct RejectAll;

        #[async_trait::async_trait]
        impl ConfigurationValidator for RejectAll {
            async fn is_valid(&self, _pair: &ProjectPair) -> bool {
                false
            }
        }

        let (ctx, source, target) = snapshot_context();
        ctx.store
            .add_project(pair_request("Storefront", "900"))
            .await
            .unwrap();
        let report = Reconciler::with_validator(ctx, Arc::new(RejectAll))
            .run_all()
            .await
            .unwrap();
        assert_eq!(report.skipped(), 1);
        assert!(source.probe().call_log().is_empty());
        assert!(target.probe().call_log().is_empty());
    }
}
