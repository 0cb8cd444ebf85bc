use super::{partition, CorrelationProbe, EntityMatcher, MatchOutcome};
use crate::context::SyncContext;
use crate::correlation::StoreResult;
use crate::model::{SourceTask, Sprint};
use async_trait::async_trait;

/// Sub-task ↔ sprint
#[derive(Clone)]
pub struct SprintMatcher {
    ctx: SyncContext,
}

impl SprintMatcher {
    pub fn new(ctx: SyncContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl CorrelationProbe for SprintMatcher {
    fn kind(&self) -> &'static str {
        "sprint"
    }

    async fn correlated_target(&self, source_id: i64) -> StoreResult<Option<i64>> {
        let record = self
            .ctx
            .call_store(
                "get_task_if_exists",
                self.ctx.store.get_task_if_exists(source_id),
            )
            .await?;
        Ok(record.map(|r| r.target_sprint_id))
    }

    async fn pair_exists(&self, source_id: i64, target_id: i64) -> StoreResult<bool> {
        let record = self
            .ctx
            .call_store(
                "get_task_and_sprint",
                self.ctx.store.get_task_and_sprint(source_id, target_id),
            )
            .await?;
        Ok(record.is_some())
    }
}

#[async_trait]
impl EntityMatcher for SprintMatcher {
    type Source = SourceTask;
    type Target = Sprint;

    async fn match_entities(
        &self,
        sources: &[SourceTask],
        targets: &[Sprint],
        to_be_created: bool,
    ) -> MatchOutcome<SourceTask, Sprint> {
        partition(self, sources, targets, to_be_created).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::CorrelationStore;
    use crate::model::SprintLink;
    use crate::test_utils::{memory_context, sprint, sub_task};

    #[tokio::test]
    async fn test_sprint_matching() {
        let (ctx, store) = memory_context();
        store
            .create_task_and_sprint(
                1,
                SprintLink {
                    target_sprint_id: 12,
                    source_task_id: 501,
                    source_parent_id: 500,
                },
            )
            .await
            .unwrap();

        let sub_tasks = vec![
            sub_task("501", "500", "Sprint 1"),
            sub_task("502", "500", "Sprint 2"),
            sub_task("n/a", "500", "Broken"),
        ];
        let sprints = vec![sprint(12, "Sprint 1"), sprint(13, "Sprint 2")];
        let matcher = SprintMatcher::new(ctx);

        let update = matcher.match_entities(&sub_tasks, &sprints, false).await;
        assert_eq!(update.entities.len(), 1);
        assert_eq!(update.counterparts["501"].id, 12);

        let create = matcher.match_entities(&sub_tasks, &sprints, true).await;
        let ids: Vec<_> = create.entities.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["502"]);
    }
}
