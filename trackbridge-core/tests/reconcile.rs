//! Full project syncs against the sample snapshot
//!
//! Each run gets a fresh context (and so a fresh deadline) over a shared
//! Target and correlation store, the way consecutive scheduled runs would.

use std::sync::Arc;
use trackbridge_core::config::SyncConfig;
use trackbridge_core::correlation::{CorrelationStore, MemoryCorrelationStore};
use trackbridge_core::dispatch::Phase;
use trackbridge_core::engine::{ProjectReport, Reconciler};
use trackbridge_core::model::SourceTask;
use trackbridge_core::reference_tag;
use trackbridge_core::snapshot::{SnapshotSourceClient, SnapshotTargetClient, SourceData};
use trackbridge_core::test_utils::{leaf_task, sample_pair, sample_snapshot};
use trackbridge_core::SyncContext;

struct Harness {
    target: SnapshotTargetClient,
    store: MemoryCorrelationStore,
}

impl Harness {
    fn new() -> (Self, SourceData) {
        let snapshot = sample_snapshot();
        let harness = Self {
            target: SnapshotTargetClient::new(snapshot.target),
            store: MemoryCorrelationStore::new(),
        };
        (harness, snapshot.source)
    }

    async fn run(&self, source: &SourceData) -> ProjectReport {
        self.target.probe().reset();
        let ctx = SyncContext::establish(
            Arc::new(SnapshotSourceClient::new(source.clone())),
            Arc::new(self.target.clone()),
            Arc::new(self.store.clone()),
            SyncConfig::default(),
        )
        .await
        .unwrap();
        Reconciler::new(ctx).run_project(&sample_pair()).await.unwrap()
    }

    fn creations(&self) -> usize {
        ["create_sprint", "create_issue", "create_worklog"]
            .iter()
            .map(|op| self.target.calls(op))
            .sum()
    }
}

fn task_mut<'a>(source: &'a mut SourceData, id: &str) -> &'a mut SourceTask {
    source
        .tasks
        .iter_mut()
        .find(|t| t.id == id)
        .unwrap()
}

fn first_of(log: &[&str], ops: &[&str]) -> usize {
    log.iter().position(|op| ops.contains(op)).unwrap()
}

fn last_of(log: &[&str], ops: &[&str]) -> usize {
    log.iter().rposition(|op| ops.contains(op)).unwrap()
}

#[tokio::test]
async fn test_second_run_creates_nothing() {
    let (harness, source) = Harness::new();

    let first = harness.run(&source).await;
    assert_eq!(first.failed(), 0);
    assert_eq!(harness.creations(), 7);

    let second = harness.run(&source).await;
    assert_eq!(harness.creations(), 0);
    assert_eq!(harness.target.calls("update_issue"), 0);
    assert_eq!(harness.target.calls("update_worklog"), 0);
    assert_eq!(harness.target.calls("move_issue_to_sprint"), 0);
    // correlated issues are visited and found unchanged
    assert_eq!(second.phase(Phase::Issues).unwrap().unchanged, 3);
    assert_eq!(second.phase(Phase::Sprints).unwrap().spawned, 0);
    assert_eq!(second.phase(Phase::Worklogs).unwrap().spawned, 0);
}

#[tokio::test]
async fn test_phases_run_in_order() {
    let (harness, source) = Harness::new();
    harness.run(&source).await;

    let log = harness.target.probe().call_log();
    assert!(last_of(&log, &["create_sprint", "update_sprint"]) < first_of(&log, &["create_issue"]));
    assert!(
        last_of(&log, &["create_issue", "add_issue_to_epic"]) < first_of(&log, &["create_worklog"])
    );
}

#[tokio::test]
async fn test_new_task_gets_default_fields() {
    let (harness, mut source) = Harness::new();
    source.tasks.push(SourceTask {
        state: "not started".to_string(),
        priority: "high".to_string(),
        story_type: String::new(),
        ..leaf_task("5", "501", "Fix login")
    });

    harness.run(&source).await;

    let data = harness.target.data().await;
    let issue = data.issues["SHOP"]
        .iter()
        .find(|i| i.fields.summary == "Fix login")
        .unwrap();
    assert_eq!(issue.fields.issue_type.as_ref().unwrap().name, "Task");
    assert_eq!(issue.fields.status.as_ref().unwrap().name, "Open");
    assert_eq!(issue.fields.priority.as_ref().unwrap().name, "Major");
    assert_eq!(issue.fields.epic_link.as_deref(), Some("SHOP-42"));

    let record = harness.store.get_task_in_sub_task(5).await.unwrap().unwrap();
    assert_eq!(record.target_issue_id, issue.id.parse().ok());
    assert_eq!(record.source_parent_id, 501);
}

#[tokio::test]
async fn test_drift_is_pushed_to_target() {
    let (harness, mut source) = Harness::new();
    harness.run(&source).await;

    task_mut(&mut source, "602").title = "Add checkout flow".to_string();
    source
        .time_entries
        .iter_mut()
        .find(|e| e.id == "3001")
        .unwrap()
        .minutes = 120;
    let report = harness.run(&source).await;

    assert_eq!(harness.creations(), 0);
    assert_eq!(harness.target.calls("update_issue"), 1);
    assert_eq!(harness.target.calls("update_worklog"), 1);
    assert_eq!(report.phase(Phase::Issues).unwrap().succeeded, 1);

    let data = harness.target.data().await;
    assert!(data.issues["SHOP"]
        .iter()
        .any(|i| i.fields.summary == "Add checkout flow"));
    let record = harness.store.get_time_entry(3001).await.unwrap().unwrap();
    assert_eq!(record.logged_seconds, 7200);
}

#[tokio::test]
async fn test_task_moved_between_sub_tasks_follows_sprint() {
    let (harness, mut source) = Harness::new();
    harness.run(&source).await;
    let second_sprint = harness
        .store
        .get_task_if_exists(502)
        .await
        .unwrap()
        .unwrap()
        .target_sprint_id;

    task_mut(&mut source, "602").parent_id = "502".to_string();
    let report = harness.run(&source).await;

    assert_eq!(harness.target.calls("move_issue_to_sprint"), 1);
    assert_eq!(report.phase(Phase::Issues).unwrap().failed, 0);

    let record = harness.store.get_task_in_sub_task(602).await.unwrap().unwrap();
    assert_eq!(record.source_parent_id, 502);
    assert_eq!(record.target_sprint_id, second_sprint);

    let data = harness.target.data().await;
    let moved = data.issues["SHOP"]
        .iter()
        .find(|i| i.fields.summary == "Add checkout")
        .unwrap();
    assert_eq!(
        reference_tag::sprint_id(&moved.fields.sprint[0]),
        Some(second_sprint)
    );
}

#[tokio::test]
async fn test_failed_issue_creation_is_retried_next_run() {
    let (harness, source) = Harness::new();
    harness.target.fail_on("create_issue");
    let first = harness.run(&source).await;
    assert_eq!(first.phase(Phase::Issues).unwrap().failed, 3);
    // no issue, so no worklog either
    assert_eq!(first.phase(Phase::Worklogs).unwrap().failed, 2);

    harness.target.probe().recover("create_issue");
    let second = harness.run(&source).await;
    assert_eq!(second.phase(Phase::Issues).unwrap().succeeded, 3);
    assert_eq!(second.phase(Phase::Worklogs).unwrap().succeeded, 2);
    assert_eq!(second.phase(Phase::Sprints).unwrap().spawned, 0);
}
