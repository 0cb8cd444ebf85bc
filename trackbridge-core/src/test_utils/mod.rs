//! Fixtures shared by unit and integration tests
//!
//! [`sample_snapshot`] describes one project pair, "Storefront": Source
//! workspace `900` with a "Construction" milestone holding two sub-tasks and
//! three leaf tasks, and Target project `SHOP` with a board, a legacy sprint
//! and the epic `SHOP-42`. Nothing is correlated yet.

use crate::config::SyncConfig;
use crate::context::SyncContext;
use crate::correlation::MemoryCorrelationStore;
use crate::equivalence::{EquivalenceResolver, TargetCatalog};
use crate::model::{
    CatalogEntry, Issue, IssueFields, ProjectPair, RapidView, SourceProject, SourceTask,
    SourceUser, Sprint, TargetProject, TargetUser, TimeEntry, Worklog,
};
use crate::reference_tag;
use crate::snapshot::{Snapshot, SnapshotSourceClient, SnapshotTargetClient, SourceData, TargetData};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const WORKSPACE_ID: &str = "900";
pub const PROJECT_KEY: &str = "SHOP";

pub fn standard_catalog() -> TargetCatalog {
    TargetCatalog {
        issue_types: vec![
            CatalogEntry::new("1", "Bug"),
            CatalogEntry::new("2", "Task"),
            CatalogEntry::new("3", "Story"),
            CatalogEntry::new("5", "Sub-task"),
            CatalogEntry::new("6", "Epic"),
        ],
        statuses: vec![
            CatalogEntry::new("1", "Open"),
            CatalogEntry::new("3", "In Progress"),
            CatalogEntry::new("5", "Reopened"),
            CatalogEntry::new("4", "Review"),
            CatalogEntry::new("10001", "Internal QA"),
            CatalogEntry::new("10002", "Approved for Prod"),
            CatalogEntry::new("6", "Resolved"),
            CatalogEntry::new("7", "Closed"),
            CatalogEntry::new("10003", "Require Feedback"),
        ],
        priorities: vec![
            CatalogEntry::new("1", "Blocker"),
            CatalogEntry::new("2", "Critical"),
            CatalogEntry::new("3", "Major"),
            CatalogEntry::new("4", "Minor"),
            CatalogEntry::new("5", "Trivial"),
        ],
    }
}

pub fn users() -> Vec<TargetUser> {
    vec![
        TargetUser {
            name: "dana".to_string(),
            email: "dana@example.com".to_string(),
        },
        TargetUser {
            name: "lee".to_string(),
            email: "lee@example.com".to_string(),
        },
    ]
}

pub fn dana() -> SourceUser {
    SourceUser {
        id: "44".to_string(),
        email: "dana@example.com".to_string(),
    }
}

fn task(id: &str, parent_id: &str, title: &str) -> SourceTask {
    SourceTask {
        id: id.to_string(),
        workspace_id: WORKSPACE_ID.to_string(),
        title: title.to_string(),
        description: String::new(),
        start_date: String::new(),
        due_date: String::new(),
        story_type: String::new(),
        state: String::new(),
        priority: String::new(),
        assignee: None,
        parent_id: parent_id.to_string(),
    }
}

/// Task that becomes an issue
pub fn leaf_task(id: &str, parent_id: &str, title: &str) -> SourceTask {
    SourceTask {
        state: "not started".to_string(),
        priority: "normal".to_string(),
        story_type: "task".to_string(),
        due_date: "2021-06-10".to_string(),
        ..task(id, parent_id, title)
    }
}

/// Task that becomes a sprint
pub fn sub_task(id: &str, parent_id: &str, title: &str) -> SourceTask {
    SourceTask {
        start_date: "2021-06-01".to_string(),
        due_date: "2021-06-14".to_string(),
        ..task(id, parent_id, title)
    }
}

pub fn issue(id: &str, key: &str, summary: &str) -> Issue {
    Issue {
        id: id.to_string(),
        key: key.to_string(),
        fields: IssueFields {
            summary: summary.to_string(),
            issue_type: Some(CatalogEntry::new("2", "Task")),
            status: Some(CatalogEntry::new("1", "Open")),
            priority: Some(CatalogEntry::new("4", "Minor")),
            ..IssueFields::default()
        },
    }
}

pub fn sprint(id: i64, name: &str) -> Sprint {
    Sprint {
        id,
        name: name.to_string(),
        state: "future".to_string(),
        start_date: "01/Jun/21 12:00 AM".to_string(),
        end_date: "14/Jun/21 12:00 AM".to_string(),
    }
}

pub fn time_entry(id: &str, task_id: &str, minutes: i64, date_performed: &str) -> TimeEntry {
    TimeEntry {
        id: id.to_string(),
        workspace_id: WORKSPACE_ID.to_string(),
        task_id: task_id.to_string(),
        minutes,
        notes: "pairing".to_string(),
        date_performed: date_performed.to_string(),
        created_at: String::new(),
        updated_at: String::new(),
        user: dana(),
    }
}

pub fn worklog(id: &str, seconds: i64, started: &str) -> Worklog {
    Worklog {
        id: id.to_string(),
        time_spent_seconds: seconds,
        comment: String::new(),
        started: started.to_string(),
        author: None,
    }
}

/// The pair described by [`sample_snapshot`], as stored with id 1
pub fn sample_pair() -> ProjectPair {
    ProjectPair {
        id: 1,
        name: "Storefront".to_string(),
        source_workspace_id: WORKSPACE_ID.to_string(),
        target_project_id: 10100,
        target_project_key: PROJECT_KEY.to_string(),
        target_epic_id: 42,
    }
}

pub fn sample_snapshot() -> Snapshot {
    let milestone = SourceTask {
        start_date: "2021-06-01".to_string(),
        due_date: "2021-06-28".to_string(),
        ..task("500", "", "Construction")
    };
    let second_sprint = SourceTask {
        start_date: "2021-06-15".to_string(),
        due_date: "2021-06-28".to_string(),
        ..sub_task("502", "500", "Sprint 2")
    };
    let assigned = SourceTask {
        assignee: Some(dana()),
        description: "Persist the cart between sessions".to_string(),
        ..leaf_task("601", "501", "Build cart")
    };

    let source = SourceData {
        projects: vec![SourceProject {
            id: WORKSPACE_ID.to_string(),
            title: "Storefront".to_string(),
        }],
        tasks: vec![
            milestone,
            sub_task("501", "500", "Sprint 1"),
            second_sprint,
            assigned,
            leaf_task("602", "501", "Add checkout"),
            leaf_task("603", "502", "Ship catalog"),
        ],
        time_entries: vec![
            time_entry("3001", "601", 90, "2021-06-02"),
            time_entry("3002", "603", 30, "2021-06-16"),
        ],
    };

    let mut legacy = issue("7", "SHOP-7", "Legacy import");
    legacy.fields.sprint = vec![reference_tag::render(12, "Kickoff", "CLOSED")];
    let mut epic = issue("42", "SHOP-42", "Storefront rebuild");
    epic.fields.issue_type = Some(CatalogEntry::new("6", "Epic"));

    let catalog = standard_catalog();
    let target = TargetData {
        projects: vec![TargetProject {
            id: 10100,
            key: PROJECT_KEY.to_string(),
            name: "Storefront".to_string(),
        }],
        epics: vec![epic],
        rapid_views: BTreeMap::from([(
            PROJECT_KEY.to_string(),
            vec![RapidView {
                id: 3,
                name: "SHOP board".to_string(),
            }],
        )]),
        sprints: BTreeMap::from([(
            PROJECT_KEY.to_string(),
            vec![
                Sprint {
                    state: "closed".to_string(),
                    ..sprint(12, "Kickoff")
                },
                sprint(13, "Hardening"),
            ],
        )]),
        issues: BTreeMap::from([(PROJECT_KEY.to_string(), vec![legacy])]),
        worklogs: BTreeMap::new(),
        users: BTreeMap::from([(PROJECT_KEY.to_string(), users())]),
        issue_types: catalog.issue_types,
        statuses: catalog.statuses,
        priorities: catalog.priorities,
    };

    Snapshot { source, target }
}

/// Context over the sample snapshot and an empty in-memory store
pub fn memory_context() -> (SyncContext, MemoryCorrelationStore) {
    let snapshot = sample_snapshot();
    let store = MemoryCorrelationStore::new();
    let ctx = SyncContext::new(
        Arc::new(SnapshotSourceClient::new(snapshot.source)),
        Arc::new(SnapshotTargetClient::new(snapshot.target)),
        Arc::new(store.clone()),
        EquivalenceResolver::new(standard_catalog()),
        SyncConfig::default(),
    );
    (ctx, store)
}

/// Sample context keeping both the Target client and the store for inspection
pub fn dispatch_context() -> (SyncContext, SnapshotTargetClient, MemoryCorrelationStore) {
    let snapshot = sample_snapshot();
    let target = SnapshotTargetClient::new(snapshot.target);
    let store = MemoryCorrelationStore::new();
    let ctx = SyncContext::new(
        Arc::new(SnapshotSourceClient::new(snapshot.source)),
        Arc::new(target.clone()),
        Arc::new(store.clone()),
        EquivalenceResolver::new(standard_catalog()),
        SyncConfig::default(),
    );
    (ctx, target, store)
}

/// Like [`memory_context`], returning the clients for call inspection
pub fn snapshot_context() -> (SyncContext, SnapshotSourceClient, SnapshotTargetClient) {
    let snapshot = sample_snapshot();
    let source = SnapshotSourceClient::new(snapshot.source);
    let target = SnapshotTargetClient::new(snapshot.target);
    let ctx = SyncContext::new(
        Arc::new(source.clone()),
        Arc::new(target.clone()),
        Arc::new(MemoryCorrelationStore::new()),
        EquivalenceResolver::new(standard_catalog()),
        SyncConfig::default(),
    );
    (ctx, source, target)
}
