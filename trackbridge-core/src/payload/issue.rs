//! Leaf task → issue

use crate::equivalence::{EquivalenceKind, EquivalenceResolver};
use crate::model::{CatalogEntry, Issue, IssueRequest, SourceTask, TargetUser};
use crate::reference_tag;

/// What an update needs to know about the issue already in the Target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingIssue {
    pub id: String,
    pub key: String,
    /// Parsed from the first sprint tag of the issue
    pub sprint_id: Option<i64>,
    pub epic_key: Option<String>,
    pub issue_type: Option<String>,
}

impl ExistingIssue {
    pub fn from_issue(issue: &Issue) -> Self {
        Self {
            id: issue.id.clone(),
            key: issue.key.clone(),
            sprint_id: issue
                .fields
                .sprint
                .first()
                .and_then(|tag| reference_tag::sprint_id(tag)),
            epic_key: issue.fields.epic_link.clone().filter(|k| !k.is_empty()),
            issue_type: issue.fields.issue_type.as_ref().map(|t| t.name.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueDraft {
    pub source_task_id: i64,
    /// Sub-task the leaf task currently sits in
    pub source_parent_id: i64,
    pub summary: String,
    pub description: String,
    pub due_date: String,
    /// Source labels, kept for resolution when the payload is generated
    pub story_type: String,
    pub state: String,
    pub priority_label: String,
    pub issue_type: Option<CatalogEntry>,
    pub status: Option<CatalogEntry>,
    pub priority: Option<CatalogEntry>,
    pub assignee: Option<TargetUser>,
    pub existing: Option<ExistingIssue>,
    /// Summary, description or assignee drifted
    pub to_be_updated: bool,
}

fn assignee_for(task: &SourceTask, users: &[TargetUser]) -> Option<TargetUser> {
    let email = &task.assignee.as_ref()?.email;
    users
        .iter()
        .find(|u| u.email.eq_ignore_ascii_case(email))
        .cloned()
}

fn base_draft(task: &SourceTask, users: &[TargetUser]) -> Option<IssueDraft> {
    Some(IssueDraft {
        source_task_id: task.id.parse().ok()?,
        source_parent_id: task.parent_id.parse().ok()?,
        summary: task.title.clone(),
        description: task.description.clone(),
        due_date: task.due_date.clone(),
        story_type: task.story_type.clone(),
        state: task.state.clone(),
        priority_label: task.priority.clone(),
        issue_type: None,
        status: None,
        priority: None,
        assignee: assignee_for(task, users),
        existing: None,
        to_be_updated: false,
    })
}

fn needs_update(task: &SourceTask, existing: &Issue) -> bool {
    let fields = &existing.fields;
    if !fields.summary.eq_ignore_ascii_case(&task.title)
        || !fields.description.eq_ignore_ascii_case(&task.description)
    {
        return true;
    }
    match (&fields.assignee, &task.assignee) {
        (Some(current), Some(wanted)) => !current.email.eq_ignore_ascii_case(&wanted.email),
        (None, Some(_)) => true,
        _ => false,
    }
}

impl IssueDraft {
    /// Draft for a task with no issue yet; `None` when its ids are not numeric
    pub fn for_creation(
        task: &SourceTask,
        users: &[TargetUser],
        resolver: &EquivalenceResolver,
    ) -> Option<Self> {
        let mut draft = base_draft(task, users)?;
        draft.issue_type =
            resolver.resolve_or_default(EquivalenceKind::IssueType, &task.story_type, None);
        draft.status = resolver.resolve_or_default(EquivalenceKind::Status, &task.state, None);
        draft.priority =
            resolver.resolve_or_default(EquivalenceKind::Priority, &task.priority, None);
        Some(draft)
    }

    /// Draft against the issue the task is correlated with
    ///
    /// Status and priority are resolved against the issue's current values;
    /// the issue type is left for [`IssueDraft::update_request`].
    pub fn for_update(
        task: &SourceTask,
        existing: &Issue,
        users: &[TargetUser],
        resolver: &EquivalenceResolver,
    ) -> Option<Self> {
        let mut draft = base_draft(task, users)?;
        let current_status = existing.fields.status.as_ref().map(|s| s.name.as_str());
        let current_priority = existing.fields.priority.as_ref().map(|p| p.name.as_str());
        draft.status = resolver
            .resolve(EquivalenceKind::Status, &task.state, current_status)
            .map(|r| r.entry);
        draft.priority = resolver
            .resolve(EquivalenceKind::Priority, &task.priority, current_priority)
            .map(|r| r.entry);
        draft.to_be_updated = needs_update(task, existing);
        draft.existing = Some(ExistingIssue::from_issue(existing));
        Some(draft)
    }

    /// Create payload; `None` unless type, status and priority all resolved
    pub fn creation_request(&self, project_key: &str, sprint_id: i64) -> Option<IssueRequest> {
        Some(IssueRequest {
            id: None,
            key: None,
            project_key: Some(project_key.to_string()),
            summary: self.summary.clone(),
            description: self.description.clone(),
            due_date: self.due_date.clone(),
            assignee: self.assignee.as_ref().map(|u| u.name.clone()),
            issue_type_id: self.issue_type.as_ref()?.id.clone(),
            status_id: self.status.as_ref()?.id.clone(),
            priority_id: self.priority.as_ref()?.id.clone(),
            sprint_id: Some(sprint_id),
        })
    }

    /// Update payload addressed by the existing issue's id and key
    pub fn update_request(&self, resolver: &EquivalenceResolver) -> Option<IssueRequest> {
        let existing = self.existing.as_ref()?;
        let issue_type = self.issue_type.clone().or_else(|| {
            resolver.resolve_or_default(
                EquivalenceKind::IssueType,
                &self.story_type,
                existing.issue_type.as_deref(),
            )
        })?;
        let status = self
            .status
            .clone()
            .or_else(|| resolver.default_status())?;
        let priority = self
            .priority
            .clone()
            .or_else(|| resolver.default_priority())?;

        Some(IssueRequest {
            id: Some(existing.id.clone()),
            key: Some(existing.key.clone()),
            project_key: None,
            summary: self.summary.clone(),
            description: self.description.clone(),
            due_date: self.due_date.clone(),
            assignee: self.assignee.as_ref().map(|u| u.name.clone()),
            issue_type_id: issue_type.id,
            status_id: status.id,
            priority_id: priority.id,
            sprint_id: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equivalence::TargetCatalog;
    use crate::model::SourceUser;
    use crate::test_utils::{issue, leaf_task, standard_catalog, users};

    fn resolver() -> EquivalenceResolver {
        EquivalenceResolver::new(standard_catalog())
    }

    #[test]
    fn test_creation_defaults() {
        let task = SourceTask {
            state: "not started".to_string(),
            priority: "high".to_string(),
            story_type: String::new(),
            ..leaf_task("5", "501", "Fix login")
        };
        let draft = IssueDraft::for_creation(&task, &users(), &resolver()).unwrap();
        assert_eq!(draft.issue_type.as_ref().unwrap().name, "Task");
        assert_eq!(draft.status.as_ref().unwrap().name, "Open");
        assert_eq!(draft.priority.as_ref().unwrap().name, "Major");

        let request = draft.creation_request("SHOP", 12).unwrap();
        assert_eq!(request.project_key.as_deref(), Some("SHOP"));
        assert_eq!(request.sprint_id, Some(12));
        assert_eq!(request.summary, "Fix login");
    }

    #[test]
    fn test_assignee_matched_by_email() {
        let task = SourceTask {
            assignee: Some(SourceUser {
                id: "44".to_string(),
                email: "DANA@example.com".to_string(),
            }),
            ..leaf_task("5", "501", "Fix login")
        };
        let draft = IssueDraft::for_creation(&task, &users(), &resolver()).unwrap();
        assert_eq!(draft.assignee.unwrap().name, "dana");

        let stranger = SourceTask {
            assignee: Some(SourceUser {
                id: "45".to_string(),
                email: "nobody@example.com".to_string(),
            }),
            ..leaf_task("5", "501", "Fix login")
        };
        let draft = IssueDraft::for_creation(&stranger, &users(), &resolver()).unwrap();
        assert_eq!(draft.assignee, None);
    }

    #[test]
    fn test_non_numeric_parent_drops_draft() {
        let task = leaf_task("5", "milestone", "Fix login");
        assert_eq!(IssueDraft::for_creation(&task, &users(), &resolver()), None);
    }

    #[test]
    fn test_creation_requires_resolved_catalog() {
        let task = leaf_task("5", "501", "Fix login");
        let empty = EquivalenceResolver::new(TargetCatalog::default());
        let draft = IssueDraft::for_creation(&task, &users(), &empty).unwrap();
        assert_eq!(draft.creation_request("SHOP", 12), None);
    }

    #[test]
    fn test_update_detects_text_drift_only() {
        let task = SourceTask {
            state: "started".to_string(),
            ..leaf_task("601", "501", "Fix login")
        };
        let mut current = issue("7001", "SHOP-1", "FIX LOGIN");
        current.fields.status = Some(CatalogEntry::new("4", "Review"));
        current.fields.sprint = vec![crate::reference_tag::render(12, "Sprint 1", "ACTIVE")];

        let draft = IssueDraft::for_update(&task, &current, &users(), &resolver()).unwrap();
        assert!(!draft.to_be_updated);
        // an equivalent status is kept
        assert_eq!(draft.status.as_ref().unwrap().name, "Review");
        assert_eq!(draft.issue_type, None);
        let existing = draft.existing.as_ref().unwrap();
        assert_eq!(existing.sprint_id, Some(12));
        assert_eq!(existing.key, "SHOP-1");

        current.fields.description = "Now with details".to_string();
        let draft = IssueDraft::for_update(&task, &current, &users(), &resolver()).unwrap();
        assert!(draft.to_be_updated);
    }

    #[test]
    fn test_update_assignee_rules() {
        let dana = SourceUser {
            id: "44".to_string(),
            email: "dana@example.com".to_string(),
        };
        let task = SourceTask {
            assignee: Some(dana),
            ..leaf_task("601", "501", "Fix login")
        };
        let mut current = issue("7001", "SHOP-1", "Fix login");
        let draft = IssueDraft::for_update(&task, &current, &users(), &resolver()).unwrap();
        assert!(draft.to_be_updated, "unassigned issue gets the assignee");

        current.fields.assignee = Some(users()[0].clone());
        let draft = IssueDraft::for_update(&task, &current, &users(), &resolver()).unwrap();
        assert!(!draft.to_be_updated);

        current.fields.assignee = Some(users()[1].clone());
        let draft = IssueDraft::for_update(&task, &current, &users(), &resolver()).unwrap();
        assert!(draft.to_be_updated);
    }

    #[test]
    fn test_update_request_keeps_acceptable_type() {
        let task = SourceTask {
            story_type: "task".to_string(),
            ..leaf_task("601", "501", "Fix login")
        };
        let mut current = issue("7001", "SHOP-1", "Fix login");
        current.fields.issue_type = Some(CatalogEntry::new("3", "Story"));
        let r = resolver();
        let request = IssueDraft::for_update(&task, &current, &users(), &r)
            .unwrap()
            .update_request(&r)
            .unwrap();
        assert_eq!(request.id.as_deref(), Some("7001"));
        assert_eq!(request.key.as_deref(), Some("SHOP-1"));
        assert_eq!(request.issue_type_id, "3");
        assert_eq!(request.sprint_id, None);
    }
}
