use super::{partition, CorrelationProbe, EntityMatcher, MatchOutcome};
use crate::context::SyncContext;
use crate::correlation::StoreResult;
use crate::model::{TimeEntry, Worklog};
use async_trait::async_trait;

/// Time entry ↔ worklog
#[derive(Clone)]
pub struct WorklogMatcher {
    ctx: SyncContext,
}

impl WorklogMatcher {
    pub fn new(ctx: SyncContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl CorrelationProbe for WorklogMatcher {
    fn kind(&self) -> &'static str {
        "worklog"
    }

    async fn correlated_target(&self, source_id: i64) -> StoreResult<Option<i64>> {
        let record = self
            .ctx
            .call_store("get_time_entry", self.ctx.store.get_time_entry(source_id))
            .await?;
        Ok(record.map(|r| r.target_worklog_id))
    }

    async fn pair_exists(&self, source_id: i64, target_id: i64) -> StoreResult<bool> {
        let record = self
            .ctx
            .call_store(
                "get_time_entry_and_worklog",
                self.ctx.store.get_time_entry_and_worklog(source_id, target_id),
            )
            .await?;
        Ok(record.is_some())
    }
}

#[async_trait]
impl EntityMatcher for WorklogMatcher {
    type Source = TimeEntry;
    type Target = Worklog;

    async fn match_entities(
        &self,
        sources: &[TimeEntry],
        targets: &[Worklog],
        to_be_created: bool,
    ) -> MatchOutcome<TimeEntry, Worklog> {
        partition(self, sources, targets, to_be_created).await
    }
}
