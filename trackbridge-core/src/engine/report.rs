use crate::dispatch::{DispatchReport, Phase};
use serde::Serialize;

/// Phase reports of one project, in execution order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectReport {
    pub project: String,
    pub phases: Vec<DispatchReport>,
}

impl ProjectReport {
    pub fn phase(&self, phase: Phase) -> Option<&DispatchReport> {
        self.phases.iter().find(|r| r.phase == phase)
    }

    pub fn spawned(&self) -> usize {
        self.phases.iter().map(|r| r.spawned).sum()
    }

    pub fn failed(&self) -> usize {
        self.phases.iter().map(|r| r.failed).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectOutcome {
    Synced(ProjectReport),
    /// Failed validation; nothing was fetched or written
    Skipped { project: String },
    /// The sync started but could not collect its data
    Failed { project: String, error: String },
}

impl ProjectOutcome {
    pub fn project(&self) -> &str {
        match self {
            ProjectOutcome::Synced(report) => &report.project,
            ProjectOutcome::Skipped { project } | ProjectOutcome::Failed { project, .. } => project,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProjectOutcome::Synced(_) => "synced",
            ProjectOutcome::Skipped { .. } => "skipped",
            ProjectOutcome::Failed { .. } => "failed",
        }
    }
}

/// Flat per-project line, for printing
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeSummary {
    pub project: String,
    pub outcome: &'static str,
    pub spawned: usize,
    pub succeeded: usize,
    pub unchanged: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub outcomes: Vec<ProjectOutcome>,
}

impl RunReport {
    /// Projects whose sync started, whatever its result
    pub fn started(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| !matches!(o, ProjectOutcome::Skipped { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.len() - self.started()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ProjectOutcome::Failed { .. }))
            .count()
    }

    pub fn summaries(&self) -> Vec<OutcomeSummary> {
        self.outcomes
            .iter()
            .map(|outcome| {
                let mut summary = OutcomeSummary {
                    project: outcome.project().to_string(),
                    outcome: outcome.label(),
                    spawned: 0,
                    succeeded: 0,
                    unchanged: 0,
                    failed: 0,
                    error: None,
                };
                match outcome {
                    ProjectOutcome::Synced(report) => {
                        for phase in &report.phases {
                            summary.spawned += phase.spawned;
                            summary.succeeded += phase.succeeded;
                            summary.unchanged += phase.unchanged;
                            summary.failed += phase.failed;
                        }
                    }
                    ProjectOutcome::Failed { error, .. } => summary.error = Some(error.clone()),
                    ProjectOutcome::Skipped { .. } => {}
                }
                summary
            })
            .collect()
    }
}

/// `[####------] 2/5`
pub fn progress_bar(done: usize, total: usize, width: usize) -> String {
    let filled = if total == 0 {
        width
    } else {
        (done.min(total) * width) / total
    };
    format!(
        "[{}{}] {}/{}",
        "#".repeat(filled),
        "-".repeat(width - filled),
        done,
        total
    )
}
