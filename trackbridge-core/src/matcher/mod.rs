//! Pairing Source entities with their Target counterparts
//!
//! An entity is matched only when the correlation store knows its Target id,
//! a Target entity with that id is present in the fetched list, and the store
//! confirms the exact pair. Anything less routes the entity to creation.

mod issues;
mod sprints;
mod worklogs;

pub use issues::IssueMatcher;
pub use sprints::SprintMatcher;
pub use worklogs::WorklogMatcher;

use crate::correlation::StoreResult;
use crate::model::{Issue, SourceTask, Sprint, TimeEntry, Worklog};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Source side of a pairing, identified by its raw id
pub trait SourceEntity: Clone + Send + Sync {
    fn source_id(&self) -> &str;
}

/// Target side of a pairing; `None` for ids that are not numeric
pub trait TargetEntity: Clone + Send + Sync {
    fn target_id(&self) -> Option<i64>;
}

impl SourceEntity for SourceTask {
    fn source_id(&self) -> &str {
        &self.id
    }
}

impl SourceEntity for TimeEntry {
    fn source_id(&self) -> &str {
        &self.id
    }
}

impl TargetEntity for Issue {
    fn target_id(&self) -> Option<i64> {
        self.id.parse().ok()
    }
}

impl TargetEntity for Worklog {
    fn target_id(&self) -> Option<i64> {
        self.id.parse().ok()
    }
}

impl TargetEntity for Sprint {
    fn target_id(&self) -> Option<i64> {
        Some(self.id)
    }
}

/// Result of [`EntityMatcher::match_entities`]
///
/// In creation mode `entities` holds the unmatched Source entities and
/// `counterparts` stays empty. In update mode it holds the matched ones and
/// `counterparts` maps each of their Source ids to the Target entity.
#[derive(Debug, Clone)]
pub struct MatchOutcome<S, T> {
    pub entities: Vec<S>,
    pub counterparts: HashMap<String, T>,
}

impl<S, T> MatchOutcome<S, T> {
    fn empty() -> Self {
        Self {
            entities: Vec::new(),
            counterparts: HashMap::new(),
        }
    }
}

#[async_trait]
pub trait EntityMatcher: Send + Sync {
    type Source: SourceEntity;
    type Target: TargetEntity;

    async fn match_entities(
        &self,
        sources: &[Self::Source],
        targets: &[Self::Target],
        to_be_created: bool,
    ) -> MatchOutcome<Self::Source, Self::Target>;
}

/// The two store lookups a matcher needs for one entity kind
#[async_trait]
pub(crate) trait CorrelationProbe: Send + Sync {
    /// Entity kind, for logs
    fn kind(&self) -> &'static str;

    /// Target id recorded for a Source id
    async fn correlated_target(&self, source_id: i64) -> StoreResult<Option<i64>>;

    async fn pair_exists(&self, source_id: i64, target_id: i64) -> StoreResult<bool>;
}

async fn find_counterpart<'t, P, T>(probe: &P, source_id: i64, targets: &'t [T]) -> Option<&'t T>
where
    P: CorrelationProbe + ?Sized,
    T: TargetEntity,
{
    let correlated = match probe.correlated_target(source_id).await {
        Ok(Some(target_id)) => target_id,
        Ok(None) => return None,
        Err(e) => {
            warn!(kind = probe.kind(), source_id, error = %e, "Correlation lookup failed, treating as unmatched");
            return None;
        }
    };

    for target in targets {
        let Some(target_id) = target.target_id() else {
            continue;
        };
        if target_id != correlated {
            continue;
        }
        match probe.pair_exists(source_id, target_id).await {
            Ok(true) => return Some(target),
            Ok(false) => {}
            Err(e) => {
                warn!(kind = probe.kind(), source_id, target_id, error = %e, "Pair lookup failed");
            }
        }
    }
    None
}

pub(crate) async fn partition<P, S, T>(
    probe: &P,
    sources: &[S],
    targets: &[T],
    to_be_created: bool,
) -> MatchOutcome<S, T>
where
    P: CorrelationProbe + ?Sized,
    S: SourceEntity,
    T: TargetEntity,
{
    let mut outcome = MatchOutcome::empty();
    for source in sources {
        let raw_id = source.source_id();
        let Ok(source_id) = raw_id.parse::<i64>() else {
            warn!(kind = probe.kind(), id = raw_id, "Dropping entity with a non-numeric id");
            continue;
        };

        match (to_be_created, find_counterpart(probe, source_id, targets).await) {
            (true, None) => outcome.entities.push(source.clone()),
            (false, Some(target)) => {
                outcome.entities.push(source.clone());
                outcome
                    .counterparts
                    .insert(raw_id.to_string(), target.clone());
            }
            _ => {}
        }
    }
    debug!(
        kind = probe.kind(),
        to_be_created,
        selected = outcome.entities.len(),
        of = sources.len(),
        "Matched entities"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::StoreError;
    use std::collections::HashSet;

    #[derive(Clone)]
    struct Raw(&'static str);

    impl SourceEntity for Raw {
        fn source_id(&self) -> &str {
            self.0
        }
    }

    #[derive(Clone, Debug, PartialEq)]
    struct Remote(&'static str);

    impl TargetEntity for Remote {
        fn target_id(&self) -> Option<i64> {
            self.0.parse().ok()
        }
    }

    /// Source n correlates to Target n * 10; pairs listed in `confirmed` exist
    struct FixedProbe {
        confirmed: HashSet<(i64, i64)>,
        broken: Option<i64>,
    }

    #[async_trait]
    impl CorrelationProbe for FixedProbe {
        fn kind(&self) -> &'static str {
            "test"
        }

        async fn correlated_target(&self, source_id: i64) -> StoreResult<Option<i64>> {
            if self.broken == Some(source_id) {
                return Err(StoreError::Storage("disk on fire".to_string()));
            }
            Ok(self
                .confirmed
                .iter()
                .find(|(s, _)| *s == source_id)
                .map(|(_, t)| *t))
        }

        async fn pair_exists(&self, source_id: i64, target_id: i64) -> StoreResult<bool> {
            Ok(self.confirmed.contains(&(source_id, target_id)))
        }
    }

    fn probe() -> FixedProbe {
        FixedProbe {
            confirmed: [(1, 10), (2, 20), (4, 40)].into_iter().collect(),
            broken: Some(4),
        }
    }

    fn sources() -> Vec<Raw> {
        vec![Raw("1"), Raw("2"), Raw("3"), Raw("4"), Raw("x9")]
    }

    fn targets() -> Vec<Remote> {
        // 20 is absent, "ABC" is skipped
        vec![Remote("ABC"), Remote("10"), Remote("40"), Remote("30")]
    }

    #[tokio::test]
    async fn test_update_mode_returns_correlated_with_counterparts() {
        let outcome = partition(&probe(), &sources(), &targets(), false).await;
        let ids: Vec<_> = outcome.entities.iter().map(|s| s.0).collect();
        assert_eq!(ids, vec!["1"]);
        assert_eq!(outcome.counterparts.len(), 1);
        assert_eq!(outcome.counterparts["1"], Remote("10"));
    }

    #[tokio::test]
    async fn test_creation_mode_returns_unmatched() {
        let outcome = partition(&probe(), &sources(), &targets(), true).await;
        let ids: Vec<_> = outcome.entities.iter().map(|s| s.0).collect();
        // 2: target missing, 3: never correlated, 4: store error; x9 is dropped
        assert_eq!(ids, vec!["2", "3", "4"]);
        assert!(outcome.counterparts.is_empty());
    }

    #[tokio::test]
    async fn test_unconfirmed_pair_is_unmatched() {
        struct Stale;

        #[async_trait]
        impl CorrelationProbe for Stale {
            fn kind(&self) -> &'static str {
                "stale"
            }
            async fn correlated_target(&self, _: i64) -> StoreResult<Option<i64>> {
                Ok(Some(10))
            }
            async fn pair_exists(&self, _: i64, _: i64) -> StoreResult<bool> {
                Ok(false)
            }
        }

        let outcome = partition(&Stale, &[Raw("1")], &targets(), false).await;
        assert!(outcome.entities.is_empty());
    }
}
