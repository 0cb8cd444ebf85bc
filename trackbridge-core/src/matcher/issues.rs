use super::{partition, CorrelationProbe, EntityMatcher, MatchOutcome};
use crate::context::SyncContext;
use crate::correlation::StoreResult;
use crate::model::{Issue, SourceTask};
use async_trait::async_trait;

/// Leaf task ↔ issue
#[derive(Clone)]
pub struct IssueMatcher {
    ctx: SyncContext,
}

impl IssueMatcher {
    pub fn new(ctx: SyncContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl CorrelationProbe for IssueMatcher {
    fn kind(&self) -> &'static str {
        "issue"
    }

    async fn correlated_target(&self, source_id: i64) -> StoreResult<Option<i64>> {
        let record = self
            .ctx
            .call_store(
                "get_task_in_sub_task",
                self.ctx.store.get_task_in_sub_task(source_id),
            )
            .await?;
        Ok(record.and_then(|r| r.target_issue_id))
    }

    async fn pair_exists(&self, source_id: i64, target_id: i64) -> StoreResult<bool> {
        let record = self
            .ctx
            .call_store(
                "get_task_and_issue",
                self.ctx.store.get_task_and_issue(source_id, target_id),
            )
            .await?;
        Ok(record.is_some())
    }
}

#[async_trait]
impl EntityMatcher for IssueMatcher {
    type Source = SourceTask;
    type Target = Issue;

    async fn match_entities(
        &self,
        sources: &[SourceTask],
        targets: &[Issue],
        to_be_created: bool,
    ) -> MatchOutcome<SourceTask, Issue> {
        partition(self, sources, targets, to_be_created).await
    }
}
