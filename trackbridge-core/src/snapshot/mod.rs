//! Offline exports of both systems and the clients that serve them
//!
//! A [`Snapshot`] is a JSON document holding everything a run reads from the
//! Source and the Target. The snapshot clients answer every trait call from
//! that document and apply Target writes to it in memory, so a run can be
//! replayed, inspected and written back to disk.

mod probe;
mod source;
mod target;

pub use probe::CallProbe;
pub use source::SnapshotSourceClient;
pub use target::SnapshotTargetClient;

use crate::model::{
    CatalogEntry, Issue, RapidView, SourceProject, SourceTask, Sprint, TargetProject, TargetUser,
    TimeEntry, Worklog,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Failed to read snapshot: {0}")]
    Read(String),

    #[error("Failed to write snapshot: {0}")]
    Write(String),

    #[error("Malformed snapshot: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceData {
    pub projects: Vec<SourceProject>,
    /// Milestones, sub-tasks and leaf tasks of every workspace
    pub tasks: Vec<SourceTask>,
    pub time_entries: Vec<TimeEntry>,
}

/// Target state; per-project collections are keyed by project key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetData {
    pub projects: Vec<TargetProject>,
    pub epics: Vec<Issue>,
    pub rapid_views: BTreeMap<String, Vec<RapidView>>,
    pub sprints: BTreeMap<String, Vec<Sprint>>,
    pub issues: BTreeMap<String, Vec<Issue>>,
    /// Keyed by issue key
    pub worklogs: BTreeMap<String, Vec<Worklog>>,
    pub users: BTreeMap<String, Vec<TargetUser>>,
    pub issue_types: Vec<CatalogEntry>,
    pub statuses: Vec<CatalogEntry>,
    pub priorities: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub source: SourceData,
    pub target: TargetData,
}

impl Snapshot {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| SnapshotError::Read(format!("{}: {}", path.as_ref().display(), e)))?;
        serde_json::from_str(&content).map_err(|e| SnapshotError::Parse(e.to_string()))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| SnapshotError::Write(e.to_string()))?;
        fs::write(path.as_ref(), content)
            .map_err(|e| SnapshotError::Write(format!("{}: {}", path.as_ref().display(), e)))
    }
}
