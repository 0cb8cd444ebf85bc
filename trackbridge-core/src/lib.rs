//! One-way reconciliation of a Source task system into a Target issue tracker
//!
//! Sub-tasks of a milestone become sprints, their leaf tasks become issues
//! and time entries on those tasks become worklogs. A correlation store
//! remembers which Target entity each Source entity was synced to.

pub mod clients;
pub mod config;
pub mod context;
pub mod correlation;
pub mod dates;
pub mod dispatch;
pub mod engine;
pub mod equivalence;
pub mod errors;
pub mod logging;
pub mod matcher;
pub mod metrics;
pub mod model;
pub mod payload;
pub mod reference_tag;
pub mod snapshot;
pub mod test_utils;
pub mod validator;

pub use config::Config;
pub use context::SyncContext;
pub use engine::{Reconciler, RunReport};
pub use errors::{SyncError, SyncResult};
pub use logging::{init_logging, LogLevel};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let _ = LogLevel::Info;
        let _ = Config::default();
    }
}
