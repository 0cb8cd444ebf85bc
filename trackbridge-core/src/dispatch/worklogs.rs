use super::{JobOutcome, Phase, SyncPhase};
use crate::context::SyncContext;
use crate::dates::normalize_persisted;
use crate::engine::IssuesAndTasks;
use crate::matcher::{EntityMatcher, WorklogMatcher};
use crate::model::{Issue, Worklog, WorklogCorrelation, WorklogLink};
use crate::payload::worklog::draft_update;
use crate::payload::WorklogDraft;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Time entries of every leaf task become worklogs on the task's issue
pub struct WorklogPhase {
    ctx: SyncContext,
    data: Arc<IssuesAndTasks>,
}

fn parse_id(what: &str, raw: &str) -> Result<i64, String> {
    raw.parse()
        .map_err(|_| format!("non-numeric {} id '{}'", what, raw))
}

impl WorklogPhase {
    pub fn new(ctx: SyncContext, data: Arc<IssuesAndTasks>) -> Self {
        Self { ctx, data }
    }

    fn timezone(&self) -> &str {
        &self.ctx.settings.worklog_timezone
    }

    /// Issue the leaf task was synced to
    async fn issue_of(&self, draft: &WorklogDraft) -> Result<Issue, String> {
        let ctx = &self.ctx;
        let task_id = parse_id("task", &draft.source_task_id)?;
        let record = ctx
            .call_store("get_task_in_sub_task", ctx.store.get_task_in_sub_task(task_id))
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("task {} has no issue yet", task_id))?;
        let issue_id = record
            .target_issue_id
            .ok_or_else(|| format!("issue record {} carries no issue id", record.id))?;
        ctx.call_remote(
            "get_issue_by_id",
            ctx.target
                .get_issue_by_id(&self.data.project.key, &issue_id.to_string()),
        )
        .await
        .map_err(|e| e.to_string())
    }

    fn link(draft: &WorklogDraft, issue: &Issue, worklog: &Worklog) -> Result<WorklogLink, String> {
        Ok(WorklogLink {
            target_issue_id: parse_id("issue", &issue.id)?,
            target_worklog_id: parse_id("worklog", &worklog.id)?,
            source_time_entry_id: parse_id("time entry", &draft.source_time_entry_id)?,
            target_user: draft.author_email.clone(),
            source_user_id: parse_id("user", &draft.source_user_id)?,
            logged_seconds: draft.seconds,
        })
    }

    async fn record_creation(&self, draft: &WorklogDraft, issue: &Issue, worklog: &Worklog) -> Result<(), String> {
        let link = Self::link(draft, issue, worklog)?;
        let ctx = &self.ctx;
        ctx.call_store(
            "create_time_entry_and_worklog",
            ctx.store.create_time_entry_and_worklog(link),
        )
        .await
        .map(|_| ())
        .map_err(|e| e.to_string())
    }

    async fn record_update(&self, draft: &WorklogDraft, issue: &Issue, worklog: &Worklog) -> Result<(), String> {
        let link = Self::link(draft, issue, worklog)?;
        let ctx = &self.ctx;
        let record = ctx
            .call_store(
                "get_time_entry",
                ctx.store.get_time_entry(link.source_time_entry_id),
            )
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("no worklog record for time entry {}", link.source_time_entry_id))?;
        let created_at = normalize_persisted(&record.created_at)
            .ok_or_else(|| format!("unparseable created_at '{}'", record.created_at))?;

        let updated = WorklogCorrelation {
            target_issue_id: link.target_issue_id,
            target_worklog_id: link.target_worklog_id,
            source_time_entry_id: link.source_time_entry_id,
            target_user: link.target_user,
            source_user_id: link.source_user_id,
            logged_seconds: link.logged_seconds,
            created_at,
            ..record
        };
        ctx.call_store(
            "update_time_entry_and_worklog",
            ctx.store.update_time_entry_and_worklog(updated),
        )
        .await
        .map(|_| ())
        .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl SyncPhase for WorklogPhase {
    type Create = WorklogDraft;
    type Update = WorklogDraft;

    fn phase(&self) -> Phase {
        Phase::Worklogs
    }

    async fn prepare_creates(&self, tx: mpsc::Sender<WorklogDraft>) {
        let matcher = WorklogMatcher::new(self.ctx.clone());
        let outcome = matcher
            .match_entities(&self.data.time_entries, &self.data.worklogs, true)
            .await;

        for entry in &outcome.entities {
            let Some(draft) = WorklogDraft::from_entry(entry, self.timezone(), None) else {
                continue;
            };
            if tx.send(draft).await.is_err() {
                return;
            }
        }
    }

    async fn prepare_updates(&self, tx: mpsc::Sender<WorklogDraft>) {
        let matcher = WorklogMatcher::new(self.ctx.clone());
        let outcome = matcher
            .match_entities(&self.data.time_entries, &self.data.worklogs, false)
            .await;

        for entry in &outcome.entities {
            let Some(existing) = outcome.counterparts.get(&entry.id) else {
                continue;
            };
            let Some(draft) = draft_update(entry, existing, self.timezone()) else {
                continue;
            };
            if tx.send(draft).await.is_err() {
                return;
            }
        }
    }

    async fn create(&self, draft: WorklogDraft) -> JobOutcome {
        let issue = match self.issue_of(&draft).await {
            Ok(issue) => issue,
            Err(e) => {
                error!(time_entry = %draft.source_time_entry_id, error = %e, "Failed to retrieve issue for time entry");
                return JobOutcome::Failed;
            }
        };

        let ctx = &self.ctx;
        let created = match ctx
            .call_remote(
                "create_worklog",
                ctx.target.create_worklog(&issue.key, &draft.request()),
            )
            .await
        {
            Ok(worklog) => worklog,
            Err(e) => {
                error!(issue = %issue.key, time_entry = %draft.source_time_entry_id, error = %e, "Failed to create worklog");
                return JobOutcome::Failed;
            }
        };

        match self.record_creation(&draft, &issue, &created).await {
            Ok(()) => info!(worklog_id = %created.id, issue = %issue.key, "Created worklog and saved sync history"),
            Err(e) => warn!(worklog_id = %created.id, issue = %issue.key, error = %e, "Created worklog but failed to save sync history"),
        }
        JobOutcome::Synced
    }

    async fn update(&self, draft: WorklogDraft) -> JobOutcome {
        let issue = match self.issue_of(&draft).await {
            Ok(issue) => issue,
            Err(e) => {
                error!(time_entry = %draft.source_time_entry_id, error = %e, "Failed to retrieve issue for time entry");
                return JobOutcome::Failed;
            }
        };

        let ctx = &self.ctx;
        let updated = match ctx
            .call_remote(
                "update_worklog",
                ctx.target.update_worklog(&issue.key, &draft.request()),
            )
            .await
        {
            Ok(worklog) => worklog,
            Err(e) => {
                error!(issue = %issue.key, worklog_id = ?draft.id, error = %e, "Failed to update worklog");
                return JobOutcome::Failed;
            }
        };

        match self.record_update(&draft, &issue, &updated).await {
            Ok(()) => info!(worklog_id = %updated.id, issue = %issue.key, "Updated worklog and saved sync history"),
            Err(e) => warn!(worklog_id = %updated.id, issue = %issue.key, error = %e, "Updated worklog but failed to save sync history"),
        }
        JobOutcome::Synced
    }
}
