//! Drafts of Target writes, built from Source entities and their counterparts

pub mod issue;
pub mod sprint;
pub mod worklog;

pub use issue::{ExistingIssue, IssueDraft};
pub use sprint::SprintDraft;
pub use worklog::WorklogDraft;
