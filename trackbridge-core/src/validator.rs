//! Pre-flight check of a project pair against both systems

use crate::clients::ClientResult;
use crate::context::SyncContext;
use crate::model::ProjectPair;
use async_trait::async_trait;
use tracing::warn;

#[async_trait]
pub trait ConfigurationValidator: Send + Sync {
    /// True when the Source workspace, Target project and Target epic all exist
    async fn is_valid(&self, pair: &ProjectPair) -> bool;
}

/// Asks both systems directly; all three lookups are always issued
pub struct RemoteValidator {
    ctx: SyncContext,
}

impl RemoteValidator {
    pub fn new(ctx: SyncContext) -> Self {
        Self { ctx }
    }
}

fn exists<T>(pair: &ProjectPair, what: &'static str, result: ClientResult<T>) -> bool {
    match result {
        Ok(_) => true,
        Err(e) => {
            warn!(project = %pair.name, what, error = %e, "Sync configuration check failed");
            false
        }
    }
}

#[async_trait]
impl ConfigurationValidator for RemoteValidator {
    async fn is_valid(&self, pair: &ProjectPair) -> bool {
        let ctx = &self.ctx;
        let epic_key = pair.epic_key();
        let (workspace, project, epic) = tokio::join!(
            ctx.call_remote(
                "get_project_by_id",
                ctx.source.get_project_by_id(&pair.source_workspace_id)
            ),
            ctx.call_remote("get_project", ctx.target.get_project(pair.target_project_id)),
            ctx.call_remote("get_epic", ctx.target.get_epic(&epic_key)),
        );

        // evaluate all three so each failure is logged
        let checks = [
            exists(pair, "source workspace", workspace),
            exists(pair, "target project", project),
            exists(pair, "target epic", epic),
        ];
        checks.iter().all(|ok| *ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{sample_pair, snapshot_context};

    #[tokio::test]
    async fn test_valid_pair() {
        let (ctx, _source, target) = snapshot_context();
        assert!(RemoteValidator::new(ctx).is_valid(&sample_pair()).await);
        assert_eq!(target.calls("get_project"), 1);
        assert_eq!(target.calls("get_epic"), 1);
    }

    #[tokio::test]
    async fn test_every_check_runs_even_after_a_failure() {
        let (ctx, source, target) = snapshot_context();
        let pair = ProjectPair {
            source_workspace_id: "404".to_string(),
            ..sample_pair()
        };
        assert!(!RemoteValidator::new(ctx).is_valid(&pair).await);
        assert_eq!(source.calls("get_project_by_id"), 1);
        assert_eq!(target.calls("get_project"), 1);
        assert_eq!(target.calls("get_epic"), 1);
    }

    #[tokio::test]
    async fn test_missing_epic() {
        let (ctx, _source, _target) = snapshot_context();
        let pair = ProjectPair {
            target_epic_id: 999,
            ..sample_pair()
        };
        assert!(!RemoteValidator::new(ctx).is_valid(&pair).await);
    }

    #[tokio::test]
    async fn test_pairs_validate_concurrently() {
        let (ctx, _source, target) = snapshot_context();
        let validator = RemoteValidator::new(ctx);
        let pairs = vec![
            sample_pair(),
            ProjectPair {
                target_project_id: 1,
                ..sample_pair()
            },
        ];
        let results = futures::future::join_all(pairs.iter().map(|p| validator.is_valid(p))).await;
        assert_eq!(results, vec![true, false]);
        assert_eq!(target.calls("get_epic"), 2);
    }
}
