//! Everything a project sync reads before the first phase starts

use crate::clients::{ClientError, ClientResult};
use crate::context::SyncContext;
use crate::errors::{SyncError, SyncResult};
use crate::model::{
    Issue, ProjectPair, RapidView, SourceTask, Sprint, TargetProject, TargetUser, TimeEntry,
    Worklog,
};
use std::collections::HashSet;
use std::future::Future;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Input of the sprint phase
#[derive(Debug, Clone)]
pub struct SprintsAndTasks {
    pub milestone: SourceTask,
    pub sub_tasks: Vec<SourceTask>,
    pub rapid_views: Vec<RapidView>,
    pub sprints: Vec<Sprint>,
}

/// Input of the issue and worklog phases
#[derive(Debug, Clone)]
pub struct IssuesAndTasks {
    pub project: TargetProject,
    pub epic: Issue,
    pub users: Vec<TargetUser>,
    /// Leaf tasks of every sub-task
    pub tasks: Vec<SourceTask>,
    /// Issues of every sprint of the project
    pub issues: Vec<Issue>,
    pub time_entries: Vec<TimeEntry>,
    pub worklogs: Vec<Worklog>,
}

/// Run `fetch` for every item concurrently and concatenate the results in item order
///
/// Any failed fetch fails the whole collation.
async fn fan_out<I, T, F, Fut>(operation: &'static str, items: I, fetch: F) -> ClientResult<Vec<T>>
where
    I: IntoIterator,
    F: Fn(I::Item) -> Fut,
    Fut: Future<Output = ClientResult<Vec<T>>> + Send + 'static,
    T: Send + 'static,
{
    let mut jobs = JoinSet::new();
    let mut count = 0;
    for (idx, item) in items.into_iter().enumerate() {
        let fut = fetch(item);
        jobs.spawn(async move { (idx, fut.await) });
        count += 1;
    }

    let mut batches: Vec<Option<Vec<T>>> = (0..count).map(|_| None).collect();
    while let Some(joined) = jobs.join_next().await {
        let (idx, result) = joined.map_err(|e| ClientError::Transport {
            operation,
            message: e.to_string(),
        })?;
        batches[idx] = Some(result?);
    }
    Ok(batches.into_iter().flatten().flatten().collect())
}

fn numeric_ids(tasks: &[SourceTask], what: &'static str) -> Vec<i64> {
    tasks
        .iter()
        .filter_map(|task| match task.id.parse() {
            Ok(id) => Some(id),
            Err(_) => {
                warn!(task_id = %task.id, title = %task.title, what, "Skipping task with non-numeric id");
                None
            }
        })
        .collect()
}

/// Issues can sit in several sprints; keep the first occurrence of each key
fn dedup_issues(issues: Vec<Issue>) -> Vec<Issue> {
    let mut seen = HashSet::new();
    issues
        .into_iter()
        .filter(|issue| seen.insert(issue.key.clone()))
        .collect()
}

/// Fetch both systems' view of `pair`
pub(crate) async fn collect(
    ctx: &SyncContext,
    pair: &ProjectPair,
) -> SyncResult<(SprintsAndTasks, IssuesAndTasks)> {
    let workspace = pair.source_workspace_id.as_str();
    let epic_key = pair.epic_key();

    let (project, epic) = tokio::join!(
        ctx.call_remote("get_project", ctx.target.get_project(pair.target_project_id)),
        ctx.call_remote("get_epic", ctx.target.get_epic(&epic_key)),
    );
    let (project, epic) = (project?, epic?);
    let project_key = project.key.clone();

    let title = ctx.settings.milestone_title.as_str();
    let (milestones, rapid_views, sprints) = tokio::join!(
        ctx.call_remote(
            "get_tasks_by_project_id",
            ctx.source.get_tasks_by_project_id(workspace, Some(title))
        ),
        ctx.call_remote("get_rapid_views", ctx.target.get_rapid_views(&project_key)),
        ctx.call_remote("get_sprints", ctx.target.get_sprints(&project_key)),
    );
    let (milestones, rapid_views, sprints) = (milestones?, rapid_views?, sprints?);

    if rapid_views.is_empty() {
        return Err(SyncError::missing(format!("rapid views of project {}", project_key)));
    }
    let milestone = milestones
        .into_iter()
        .next()
        .ok_or_else(|| SyncError::missing(format!("milestone '{}' in workspace {}", title, workspace)))?;
    let milestone_id: i64 = milestone.id.parse().map_err(|_| {
        SyncError::missing(format!("numeric id for milestone '{}', got '{}'", title, milestone.id))
    })?;

    let sub_tasks = ctx
        .call_remote("get_sub_tasks", ctx.source.get_sub_tasks(workspace, milestone_id))
        .await?;
    debug!(milestone_id, sub_tasks = sub_tasks.len(), sprints = sprints.len(), "Fetched sprint inputs");

    let sub_task_ids = numeric_ids(&sub_tasks, "sub-task");
    let (tasks, issues, users) = tokio::join!(
        fan_out("get_tasks_in_sub_task", sub_task_ids, |sub_task_id| {
            let ctx = ctx.clone();
            let workspace = workspace.to_string();
            async move {
                ctx.call_remote(
                    "get_tasks_in_sub_task",
                    ctx.source.get_tasks_in_sub_task(&workspace, sub_task_id),
                )
                .await
            }
        }),
        fan_out("get_issues_by_sprint", sprints.iter(), |sprint| {
            let ctx = ctx.clone();
            let project_key = project_key.clone();
            let name = sprint.name.clone();
            async move {
                ctx.call_remote(
                    "get_issues_by_sprint",
                    ctx.target.get_issues_by_sprint(&project_key, &name),
                )
                .await
            }
        }),
        ctx.call_remote("get_users", ctx.target.get_users(&project_key)),
    );
    let (tasks, issues, users) = (tasks?, dedup_issues(issues?), users?);

    let (worklogs, time_entries) = tokio::join!(
        fan_out("get_issue_worklogs", issues.iter(), |issue| {
            let ctx = ctx.clone();
            let key = issue.key.clone();
            async move {
                ctx.call_remote("get_issue_worklogs", ctx.target.get_issue_worklogs(&key))
                    .await
            }
        }),
        fan_out("get_time_entries", tasks.iter(), |task| {
            let ctx = ctx.clone();
            let workspace = workspace.to_string();
            let task_id = task.id.clone();
            async move {
                ctx.call_remote(
                    "get_time_entries",
                    ctx.source.get_time_entries(&workspace, &task_id),
                )
                .await
            }
        }),
    );
    let (worklogs, time_entries) = (worklogs?, time_entries?);

    info!(
        project = %pair.name,
        sub_tasks = sub_tasks.len(),
        tasks = tasks.len(),
        issues = issues.len(),
        time_entries = time_entries.len(),
        worklogs = worklogs.len(),
        "Collected project data"
    );

    Ok((
        SprintsAndTasks {
            milestone,
            sub_tasks,
            rapid_views,
            sprints,
        },
        IssuesAndTasks {
            project,
            epic,
            users,
            tasks,
            issues,
            time_entries,
            worklogs,
        },
    ))
}
