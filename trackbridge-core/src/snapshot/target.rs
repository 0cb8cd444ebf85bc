use super::{CallProbe, TargetData};
use crate::clients::{ClientError, ClientResult, TargetClient};
use crate::model::{
    CatalogEntry, Issue, IssueFields, IssueRequest, RapidView, Sprint, SprintUpdate,
    TargetProject, TargetUser, Worklog, WorklogRequest,
};
use crate::reference_tag;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

const FIRST_ID: i64 = 10_000;

struct TargetState {
    data: TargetData,
    next_id: i64,
}

impl TargetState {
    fn new(data: TargetData) -> Self {
        let highest = data
            .sprints
            .values()
            .flatten()
            .map(|s| s.id)
            .chain(data.issues.values().flatten().filter_map(|i| i.id.parse().ok()))
            .chain(data.epics.iter().filter_map(|i| i.id.parse().ok()))
            .chain(data.worklogs.values().flatten().filter_map(|w| w.id.parse().ok()))
            .max()
            .unwrap_or(0);
        Self {
            data,
            next_id: (highest + 1).max(FIRST_ID),
        }
    }

    fn allocate(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn sprint(&self, sprint_id: i64) -> Option<&Sprint> {
        self.data.sprints.values().flatten().find(|s| s.id == sprint_id)
    }

    fn sprint_tag(&self, operation: &'static str, sprint_id: i64) -> ClientResult<String> {
        let sprint = self.sprint(sprint_id).ok_or_else(|| ClientError::Remote {
            operation,
            message: format!("unknown sprint {}", sprint_id),
        })?;
        Ok(reference_tag::render(sprint.id, &sprint.name, &sprint.state))
    }

    /// Project key and position of the issue matching `pred`
    fn locate(&self, pred: impl Fn(&Issue) -> bool) -> Option<(String, usize)> {
        self.data.issues.iter().find_map(|(key, issues)| {
            issues.iter().position(&pred).map(|idx| (key.clone(), idx))
        })
    }

    fn issue(&self, issue_key: &str) -> Option<&Issue> {
        self.data.issues.values().flatten().find(|i| i.key == issue_key)
    }

    fn issue_mut(&mut self, issue_key: &str) -> Option<&mut Issue> {
        self.data
            .issues
            .values_mut()
            .flatten()
            .find(|i| i.key == issue_key)
    }

    fn assignee(&self, project_key: &str, name: Option<&str>) -> Option<TargetUser> {
        let name = name?;
        self.data
            .users
            .get(project_key)?
            .iter()
            .find(|u| u.name == name)
            .cloned()
    }

    fn author(&self, email: &str) -> TargetUser {
        self.data
            .users
            .values()
            .flatten()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned()
            .unwrap_or_else(|| TargetUser {
                name: email.to_string(),
                email: email.to_string(),
            })
    }

    /// Catalog values of a request, resolved from their ids
    fn catalog_fields(
        &self,
        operation: &'static str,
        request: &IssueRequest,
    ) -> ClientResult<(CatalogEntry, CatalogEntry, CatalogEntry)> {
        let lookup = |entries: &[CatalogEntry], id: &str, what: &str| {
            entries
                .iter()
                .find(|e| e.id == id)
                .cloned()
                .ok_or_else(|| ClientError::Remote {
                    operation,
                    message: format!("unknown {} '{}'", what, id),
                })
        };
        Ok((
            lookup(&self.data.issue_types, &request.issue_type_id, "issue type")?,
            lookup(&self.data.statuses, &request.status_id, "status")?,
            lookup(&self.data.priorities, &request.priority_id, "priority")?,
        ))
    }
}

/// Target backed by [`TargetData`]; writes are applied in memory
#[derive(Clone)]
pub struct SnapshotTargetClient {
    state: Arc<RwLock<TargetState>>,
    probe: CallProbe,
}

impl SnapshotTargetClient {
    pub fn new(data: TargetData) -> Self {
        Self {
            state: Arc::new(RwLock::new(TargetState::new(data))),
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

    /// Current state, including every write applied so far
    pub async fn data(&self) -> TargetData {
        self.state.read().await.data.clone()
    }
}

fn not_found(what: impl Into<String>) -> ClientError {
    ClientError::NotFound { what: what.into() }
}

#[async_trait]
impl TargetClient for SnapshotTargetClient {
    async fn get_project(&self, project_id: i64) -> ClientResult<TargetProject> {
        self.probe.enter("get_project")?;
        let state = self.state.read().await;
        state
            .data
            .projects
            .iter()
            .find(|p| p.id == project_id)
            .cloned()
            .ok_or_else(|| not_found(format!("project {}", project_id)))
    }

    async fn get_epic(&self, epic_key: &str) -> ClientResult<Issue> {
        self.probe.enter("get_epic")?;
        let state = self.state.read().await;
        state
            .data
            .epics
            .iter()
            .find(|e| e.key == epic_key)
            .cloned()
            .ok_or_else(|| not_found(format!("epic {}", epic_key)))
    }

    async fn get_rapid_views(&self, project_key: &str) -> ClientResult<Vec<RapidView>> {
        self.probe.enter("get_rapid_views")?;
        let state = self.state.read().await;
        Ok(state
            .data
            .rapid_views
            .get(project_key)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_sprints(&self, project_key: &str) -> ClientResult<Vec<Sprint>> {
        self.probe.enter("get_sprints")?;
        let state = self.state.read().await;
        Ok(state.data.sprints.get(project_key).cloned().unwrap_or_default())
    }

    async fn get_issues_by_sprint(
        &self,
        project_key: &str,
        sprint_name: &str,
    ) -> ClientResult<Vec<Issue>> {
        self.probe.enter("get_issues_by_sprint")?;
        let state = self.state.read().await;
        let Some(sprint) = state
            .data
            .sprints
            .get(project_key)
            .and_then(|sprints| sprints.iter().find(|s| s.name == sprint_name))
        else {
            return Ok(Vec::new());
        };
        Ok(state
            .data
            .issues
            .get(project_key)
            .map(|issues| {
                issues
                    .iter()
                    .filter(|i| {
                        i.fields
                            .sprint
                            .iter()
                            .any(|tag| reference_tag::sprint_id(tag) == Some(sprint.id))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_issue_by_id(&self, project_key: &str, issue_id: &str) -> ClientResult<Issue> {
        self.probe.enter("get_issue_by_id")?;
        let state = self.state.read().await;
        state
            .data
            .issues
            .get(project_key)
            .and_then(|issues| issues.iter().find(|i| i.id == issue_id))
            .cloned()
            .ok_or_else(|| not_found(format!("issue {} in {}", issue_id, project_key)))
    }

    async fn get_issue(&self, project_key: &str, issue_key: &str) -> ClientResult<Issue> {
        self.probe.enter("get_issue")?;
        let state = self.state.read().await;
        state
            .data
            .issues
            .get(project_key)
            .and_then(|issues| issues.iter().find(|i| i.key == issue_key))
            .cloned()
            .ok_or_else(|| not_found(format!("issue {}", issue_key)))
    }

    async fn create_sprint(&self, rapid_view_id: i64) -> ClientResult<Sprint> {
        self.probe.enter("create_sprint")?;
        let mut state = self.state.write().await;
        let project_key = state
            .data
            .rapid_views
            .iter()
            .find(|(_, views)| views.iter().any(|v| v.id == rapid_view_id))
            .map(|(key, _)| key.clone())
            .ok_or_else(|| not_found(format!("rapid view {}", rapid_view_id)))?;

        let sprint = Sprint {
            id: state.allocate(),
            name: String::new(),
            state: "future".to_string(),
            start_date: String::new(),
            end_date: String::new(),
        };
        state
            .data
            .sprints
            .entry(project_key)
            .or_default()
            .push(sprint.clone());
        Ok(sprint)
    }

    async fn update_sprint(&self, update: &SprintUpdate) -> ClientResult<Sprint> {
        self.probe.enter("update_sprint")?;
        if update.name.trim().is_empty() {
            return Err(ClientError::Remote {
                operation: "update_sprint",
                message: "sprint name is required".to_string(),
            });
        }
        let mut state = self.state.write().await;
        let sprint = state
            .data
            .sprints
            .values_mut()
            .flatten()
            .find(|s| s.id == update.id)
            .ok_or_else(|| not_found(format!("sprint {}", update.id)))?;
        sprint.name = update.name.clone();
        sprint.start_date = update.start_date.clone();
        sprint.end_date = update.end_date.clone();
        Ok(sprint.clone())
    }

    async fn create_issue(&self, request: &IssueRequest) -> ClientResult<Issue> {
        const OP: &str = "create_issue";
        self.probe.enter(OP)?;
        let mut state = self.state.write().await;

        let project_key = request
            .project_key
            .clone()
            .ok_or_else(|| ClientError::Remote {
                operation: OP,
                message: "project key is required".to_string(),
            })?;
        if !state.data.projects.iter().any(|p| p.key == project_key) {
            return Err(not_found(format!("project {}", project_key)));
        }
        if request.summary.trim().is_empty() {
            return Err(ClientError::Remote {
                operation: OP,
                message: "summary is required".to_string(),
            });
        }

        let (issue_type, status, priority) = state.catalog_fields(OP, request)?;
        let sprint = match request.sprint_id {
            Some(sprint_id) => vec![state.sprint_tag(OP, sprint_id)?],
            None => Vec::new(),
        };
        let assignee = state.assignee(&project_key, request.assignee.as_deref());

        let id = state.allocate();
        let issue = Issue {
            id: id.to_string(),
            key: format!("{}-{}", project_key, id),
            fields: IssueFields {
                summary: request.summary.clone(),
                description: request.description.clone(),
                due_date: request.due_date.clone(),
                issue_type: Some(issue_type),
                status: Some(status),
                priority: Some(priority),
                assignee,
                sprint,
                epic_link: None,
            },
        };
        state
            .data
            .issues
            .entry(project_key)
            .or_default()
            .push(issue.clone());
        Ok(issue)
    }

    async fn update_issue(&self, request: &IssueRequest) -> ClientResult<()> {
        const OP: &str = "update_issue";
        self.probe.enter(OP)?;
        let mut state = self.state.write().await;

        let (project_key, idx) = state
            .locate(|i| {
                request.id.as_deref() == Some(i.id.as_str())
                    || request.key.as_deref() == Some(i.key.as_str())
            })
            .ok_or_else(|| not_found(format!("issue {:?}", request.key)))?;
        let (issue_type, status, priority) = state.catalog_fields(OP, request)?;
        let assignee = state.assignee(&project_key, request.assignee.as_deref());

        let Some(issue) = state
            .data
            .issues
            .get_mut(&project_key)
            .and_then(|issues| issues.get_mut(idx))
        else {
            return Err(not_found(format!("issue {:?}", request.key)));
        };
        let fields = &mut issue.fields;
        fields.summary = request.summary.clone();
        fields.description = request.description.clone();
        fields.due_date = request.due_date.clone();
        fields.issue_type = Some(issue_type);
        fields.status = Some(status);
        fields.priority = Some(priority);
        fields.assignee = assignee;
        Ok(())
    }

    async fn create_worklog(
        &self,
        issue_key: &str,
        request: &WorklogRequest,
    ) -> ClientResult<Worklog> {
        self.probe.enter("create_worklog")?;
        let mut state = self.state.write().await;
        if state.issue(issue_key).is_none() {
            return Err(not_found(format!("issue {}", issue_key)));
        }
        let worklog = Worklog {
            id: state.allocate().to_string(),
            time_spent_seconds: request.time_spent_seconds,
            comment: request.comment.clone(),
            started: request.started.clone(),
            author: Some(state.author(&request.author_email)),
        };
        state
            .data
            .worklogs
            .entry(issue_key.to_string())
            .or_default()
            .push(worklog.clone());
        Ok(worklog)
    }

    async fn update_worklog(
        &self,
        issue_key: &str,
        request: &WorklogRequest,
    ) -> ClientResult<Worklog> {
        self.probe.enter("update_worklog")?;
        let worklog_id = request.id.as_deref().ok_or_else(|| ClientError::Remote {
            operation: "update_worklog",
            message: "worklog id is required".to_string(),
        })?;
        let mut state = self.state.write().await;
        let author = state.author(&request.author_email);
        let worklog = state
            .data
            .worklogs
            .get_mut(issue_key)
            .and_then(|logs| logs.iter_mut().find(|w| w.id == worklog_id))
            .ok_or_else(|| not_found(format!("worklog {} on {}", worklog_id, issue_key)))?;
        worklog.time_spent_seconds = request.time_spent_seconds;
        worklog.comment = request.comment.clone();
        worklog.started = request.started.clone();
        worklog.author = Some(author);
        Ok(worklog.clone())
    }

    async fn get_issue_worklogs(&self, issue_key: &str) -> ClientResult<Vec<Worklog>> {
        self.probe.enter("get_issue_worklogs")?;
        let state = self.state.read().await;
        Ok(state.data.worklogs.get(issue_key).cloned().unwrap_or_default())
    }

    async fn move_issue_to_sprint(&self, sprint_id: i64, issue_key: &str) -> ClientResult<()> {
        self.probe.enter("move_issue_to_sprint")?;
        let mut state = self.state.write().await;
        let tag = state.sprint_tag("move_issue_to_sprint", sprint_id)?;
        let issue = state
            .issue_mut(issue_key)
            .ok_or_else(|| not_found(format!("issue {}", issue_key)))?;
        issue.fields.sprint = vec![tag];
        Ok(())
    }

    async fn add_issue_to_epic(&self, epic_key: &str, issue_key: &str) -> ClientResult<()> {
        self.probe.enter("add_issue_to_epic")?;
        let mut state = self.state.write().await;
        if !state.data.epics.iter().any(|e| e.key == epic_key) {
            return Err(not_found(format!("epic {}", epic_key)));
        }
        let issue = state
            .issue_mut(issue_key)
            .ok_or_else(|| not_found(format!("issue {}", issue_key)))?;
        issue.fields.epic_link = Some(epic_key.to_string());
        Ok(())
    }

    async fn get_users(&self, project_key: &str) -> ClientResult<Vec<TargetUser>> {
        self.probe.enter("get_users")?;
        let state = self.state.read().await;
        Ok(state.data.users.get(project_key).cloned().unwrap_or_default())
    }

    async fn get_issue_statuses(&self) -> ClientResult<Vec<CatalogEntry>> {
        self.probe.enter("get_issue_statuses")?;
        Ok(self.state.read().await.data.statuses.clone())
    }

    async fn get_issue_priorities(&self) -> ClientResult<Vec<CatalogEntry>> {
        self.probe.enter("get_issue_priorities")?;
        Ok(self.state.read().await.data.priorities.clone())
    }

    async fn get_issue_types(&self) -> ClientResult<Vec<CatalogEntry>> {
        self.probe.enter("get_issue_types")?;
        Ok(self.state.read().await.data.issue_types.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_snapshot;

    fn client() -> SnapshotTargetClient {
        SnapshotTargetClient::new(sample_snapshot().target)
    }

    fn request(sprint_id: Option<i64>) -> IssueRequest {
        IssueRequest {
            id: None,
            key: None,
            project_key: Some("SHOP".to_string()),
            summary: "Fix login".to_string(),
            description: String::new(),
            due_date: "2021-06-30".to_string(),
            assignee: Some("dana".to_string()),
            issue_type_id: "2".to_string(),
            status_id: "1".to_string(),
            priority_id: "3".to_string(),
            sprint_id,
        }
    }

    #[tokio::test]
    async fn test_sprint_lifecycle() {
        let target = client();
        let created = target.create_sprint(3).await.unwrap();
        assert!(created.id >= FIRST_ID);
        assert!(created.name.is_empty());

        let updated = target
            .update_sprint(&SprintUpdate {
                id: created.id,
                name: "Sprint 9".to_string(),
                start_date: "01/Jun/21 12:00 AM".to_string(),
                end_date: "14/Jun/21 12:00 AM".to_string(),
                rapid_view_id: 3,
            })
            .await
            .unwrap();
        assert_eq!(updated.name, "Sprint 9");
        let sprints = target.get_sprints("SHOP").await.unwrap();
        assert!(sprints.iter().any(|s| s.id == created.id && s.name == "Sprint 9"));

        assert!(matches!(
            target.create_sprint(404).await,
            Err(ClientError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_issue_lands_in_sprint() {
        let target = client();
        let issue = target.create_issue(&request(Some(12))).await.unwrap();
        assert_eq!(issue.fields.assignee.as_ref().unwrap().email, "dana@example.com");
        assert_eq!(issue.fields.status.as_ref().unwrap().name, "Open");

        let in_sprint = target.get_issues_by_sprint("SHOP", "Kickoff").await.unwrap();
        assert!(in_sprint.iter().any(|i| i.key == issue.key));

        target.add_issue_to_epic("SHOP-42", &issue.key).await.unwrap();
        let fetched = target.get_issue("SHOP", &issue.key).await.unwrap();
        assert_eq!(fetched.fields.epic_link.as_deref(), Some("SHOP-42"));
        assert_eq!(
            target.get_issue_by_id("SHOP", &issue.id).await.unwrap().key,
            issue.key
        );
    }

    #[tokio::test]
    async fn test_rejects_unknown_catalog_values() {
        let target = client();
        let mut bad = request(None);
        bad.priority_id = "99".to_string();
        assert!(matches!(
            target.create_issue(&bad).await,
            Err(ClientError::Remote { .. })
        ));
    }

    #[tokio::test]
    async fn test_move_and_update_issue() {
        let target = client();
        let issue = target.create_issue(&request(Some(12))).await.unwrap();
        target.move_issue_to_sprint(13, &issue.key).await.unwrap();
        assert!(target
            .get_issues_by_sprint("SHOP", "Kickoff")
            .await
            .unwrap()
            .iter()
            .all(|i| i.key != issue.key));

        let mut change = request(None);
        change.id = Some(issue.id.clone());
        change.key = Some(issue.key.clone());
        change.project_key = None;
        change.summary = "Fix login for real".to_string();
        target.update_issue(&change).await.unwrap();
        let fetched = target.get_issue("SHOP", &issue.key).await.unwrap();
        assert_eq!(fetched.fields.summary, "Fix login for real");
    }

    #[tokio::test]
    async fn test_worklogs() {
        let target = client();
        let issue = target.create_issue(&request(Some(12))).await.unwrap();
        let mut log = WorklogRequest {
            id: None,
            time_spent_seconds: 3600,
            comment: "pairing".to_string(),
            started: "2021-06-01T06:00:00.000+0530".to_string(),
            author_email: "DANA@example.com".to_string(),
        };
        let created = target.create_worklog(&issue.key, &log).await.unwrap();
        assert_eq!(created.author.as_ref().unwrap().name, "dana");

        log.id = Some(created.id.clone());
        log.time_spent_seconds = 1800;
        let updated = target.update_worklog(&issue.key, &log).await.unwrap();
        assert_eq!(updated.time_spent_seconds, 1800);
        assert_eq!(target.get_issue_worklogs(&issue.key).await.unwrap().len(), 1);

        assert!(target.create_worklog("SHOP-404", &log).await.is_err());
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let target = client();
        target.fail_on("get_sprints");
        assert!(matches!(
            target.get_sprints("SHOP").await,
            Err(ClientError::Remote { .. })
        ));
        assert_eq!(target.calls("get_sprints"), 1);
    }
}
