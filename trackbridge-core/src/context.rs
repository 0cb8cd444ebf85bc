//! Collaborators and limits shared by every task of a run

use crate::clients::{ClientError, ClientResult, SourceClient, TargetClient};
use crate::config::SyncConfig;
use crate::correlation::{CorrelationStore, StoreError, StoreResult};
use crate::equivalence::{EquivalenceResolver, TargetCatalog};
use crate::errors::SyncResult;
use std::future::Future;
use std::sync::Arc;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info};

/// Handles to both systems and the store, plus the run deadline
///
/// Cloning is cheap; every spawned job carries its own copy.
#[derive(Clone)]
pub struct SyncContext {
    pub source: Arc<dyn SourceClient>,
    pub target: Arc<dyn TargetClient>,
    pub store: Arc<dyn CorrelationStore>,
    pub resolver: Arc<EquivalenceResolver>,
    pub settings: SyncConfig,
    deadline: Instant,
}

impl SyncContext {
    /// Build a context around an already loaded resolver; the deadline starts now
    pub fn new(
        source: Arc<dyn SourceClient>,
        target: Arc<dyn TargetClient>,
        store: Arc<dyn CorrelationStore>,
        resolver: EquivalenceResolver,
        settings: SyncConfig,
    ) -> Self {
        let deadline = Instant::now() + settings.remote_timeout;
        Self {
            source,
            target,
            store,
            resolver: Arc::new(resolver),
            settings,
            deadline,
        }
    }

    /// Fix the deadline and load the Target catalogs used for label equivalence
    pub async fn establish(
        source: Arc<dyn SourceClient>,
        target: Arc<dyn TargetClient>,
        store: Arc<dyn CorrelationStore>,
        settings: SyncConfig,
    ) -> SyncResult<Self> {
        let ctx = Self::new(
            source,
            target,
            store,
            EquivalenceResolver::new(TargetCatalog::default()),
            settings,
        );

        let (issue_types, statuses, priorities) = tokio::join!(
            ctx.call_remote("get_issue_types", ctx.target.get_issue_types()),
            ctx.call_remote("get_issue_statuses", ctx.target.get_issue_statuses()),
            ctx.call_remote("get_issue_priorities", ctx.target.get_issue_priorities()),
        );
        let catalog = TargetCatalog {
            issue_types: issue_types?,
            statuses: statuses?,
            priorities: priorities?,
        };
        info!(
            issue_types = catalog.issue_types.len(),
            statuses = catalog.statuses.len(),
            priorities = catalog.priorities.len(),
            "Loaded Target catalogs"
        );

        Ok(Self {
            resolver: Arc::new(EquivalenceResolver::new(catalog)),
            ..ctx
        })
    }

    /// Run a remote call under the run deadline
    pub async fn call_remote<T, F>(&self, operation: &'static str, call: F) -> ClientResult<T>
    where
        F: Future<Output = ClientResult<T>>,
    {
        match timeout_at(self.deadline, call).await {
            Ok(result) => result,
            Err(_) => {
                debug!(operation, "Remote call hit the run deadline");
                Err(ClientError::DeadlineExceeded { operation })
            }
        }
    }

    /// Run a correlation store call under the run deadline
    pub async fn call_store<T, F>(&self, operation: &'static str, call: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        timeout_at(self.deadline, call)
            .await
            .unwrap_or(Err(StoreError::DeadlineExceeded { operation }))
    }
}
