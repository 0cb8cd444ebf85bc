//! Data model shared by the reconciler, the clients and the correlation store

pub mod correlation;
pub mod source;
pub mod target;

pub use correlation::{
    CorrelationKind, IssueLink, NewProjectPair, ProjectPair, SprintLink, TaskCorrelation,
    WorklogCorrelation, WorklogLink,
};
pub use source::{SourceProject, SourceTask, SourceUser, TimeEntry};
pub use target::{
    CatalogEntry, Issue, IssueFields, IssueRequest, RapidView, Sprint, SprintUpdate,
    TargetProject, TargetUser, Worklog, WorklogRequest,
};
