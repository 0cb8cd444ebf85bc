//! Translation of issue type, status and priority labels between the two systems
//!
//! Several Target labels are usually acceptable for one Source label. The
//! resolver picks a preferred one for new issues and leaves an existing value
//! alone as long as it is still acceptable, so reruns never flip a status
//! between two equivalent names.

mod tables;

pub use tables::{equivalents, match_rule, source_labels};

use crate::model::CatalogEntry;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EquivalenceKind {
    IssueType,
    Status,
    Priority,
}

impl EquivalenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EquivalenceKind::IssueType => "issue type",
            EquivalenceKind::Status => "status",
            EquivalenceKind::Priority => "priority",
        }
    }

    /// Source label whose equivalent is used when a task carries none
    pub fn default_label(&self) -> &'static str {
        match self {
            EquivalenceKind::IssueType => "task",
            EquivalenceKind::Status => "not started",
            EquivalenceKind::Priority => "high",
        }
    }
}

impl fmt::Display for EquivalenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of [`EquivalenceResolver::resolve`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub entry: CatalogEntry,
    /// The resolved value differs from the existing one, or there was none
    pub changed: bool,
}

/// Target catalogs, fetched once per process
#[derive(Debug, Clone, Default)]
pub struct TargetCatalog {
    pub issue_types: Vec<CatalogEntry>,
    pub statuses: Vec<CatalogEntry>,
    pub priorities: Vec<CatalogEntry>,
}

impl TargetCatalog {
    pub fn entries(&self, kind: EquivalenceKind) -> &[CatalogEntry] {
        match kind {
            EquivalenceKind::IssueType => &self.issue_types,
            EquivalenceKind::Status => &self.statuses,
            EquivalenceKind::Priority => &self.priorities,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EquivalenceResolver {
    catalog: TargetCatalog,
}

fn is_member(label: &str, members: &[&str]) -> bool {
    members.iter().any(|m| m.eq_ignore_ascii_case(label.trim()))
}

impl EquivalenceResolver {
    pub fn new(catalog: TargetCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &TargetCatalog {
        &self.catalog
    }

    /// Resolve `source_label` to a catalog entry
    ///
    /// With an `existing` Target label that is already acceptable for
    /// `source_label`, that label's entry comes back with `changed == false`.
    /// Otherwise the preferred candidate is returned. `None` when the label
    /// has no table entry or the catalog holds no acceptable value.
    pub fn resolve(
        &self,
        kind: EquivalenceKind,
        source_label: &str,
        existing: Option<&str>,
    ) -> Option<Resolution> {
        let members = equivalents(kind, source_label)?;
        let catalog = self.catalog.entries(kind);
        let existing = existing.map(str::trim).filter(|e| !e.is_empty());

        if let Some(current) = existing.filter(|e| is_member(e, members)) {
            if let Some(entry) = catalog.iter().find(|c| c.name.eq_ignore_ascii_case(current)) {
                return Some(Resolution {
                    entry: entry.clone(),
                    changed: false,
                });
            }
        }

        let proposal = self.preferred(kind, source_label, members)?;
        let changed = match existing {
            Some(current) => self.change_detected(current, &proposal.name, source_label, kind),
            None => true,
        };
        Some(Resolution {
            entry: proposal.clone(),
            changed,
        })
    }

    fn preferred(
        &self,
        kind: EquivalenceKind,
        source_label: &str,
        members: &[&str],
    ) -> Option<&CatalogEntry> {
        let catalog = self.catalog.entries(kind);
        let mut acceptable = catalog.iter().filter(|c| is_member(&c.name, members));
        let ruled = acceptable
            .clone()
            .find(|c| match_rule(source_label, &c.name));
        match kind {
            EquivalenceKind::IssueType => ruled,
            EquivalenceKind::Status | EquivalenceKind::Priority => ruled.or_else(|| acceptable.next()),
        }
    }

    /// True iff `existing` is neither `proposed` (ignoring case) nor acceptable for `source_label`
    pub fn change_detected(
        &self,
        existing: &str,
        proposed: &str,
        source_label: &str,
        kind: EquivalenceKind,
    ) -> bool {
        match equivalents(kind, source_label) {
            Some(members) => {
                !existing.trim().eq_ignore_ascii_case(proposed.trim()) && !is_member(existing, members)
            }
            None => false,
        }
    }

    /// Resolve `source_label`, falling back to the kind's default label
    pub fn resolve_or_default(
        &self,
        kind: EquivalenceKind,
        source_label: &str,
        existing: Option<&str>,
    ) -> Option<CatalogEntry> {
        self.resolve(kind, source_label, existing)
            .or_else(|| self.resolve(kind, kind.default_label(), None))
            .map(|resolution| resolution.entry)
    }

    pub fn default_issue_type(&self) -> Option<CatalogEntry> {
        self.default_for(EquivalenceKind::IssueType)
    }

    pub fn default_status(&self) -> Option<CatalogEntry> {
        self.default_for(EquivalenceKind::Status)
    }

    pub fn default_priority(&self) -> Option<CatalogEntry> {
        self.default_for(EquivalenceKind::Priority)
    }

    fn default_for(&self, kind: EquivalenceKind) -> Option<CatalogEntry> {
        self.resolve(kind, kind.default_label(), None)
            .map(|resolution| resolution.entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::standard_catalog;
    use proptest::prelude::*;

    fn resolver() -> EquivalenceResolver {
        EquivalenceResolver::new(standard_catalog())
    }

    #[test]
    fn test_defaults() {
        let r = resolver();
        assert_eq!(r.default_issue_type().unwrap().name, "Task");
        assert_eq!(r.default_status().unwrap().name, "Open");
        assert_eq!(r.default_priority().unwrap().name, "Major");
    }

    #[test]
    fn test_issue_type_requires_match_rule() {
        let r = resolver();
        let bug = r.resolve(EquivalenceKind::IssueType, "Issue", None).unwrap();
        assert_eq!(bug.entry.name, "Bug");
        assert!(bug.changed);

        let catalog = TargetCatalog {
            issue_types: vec![CatalogEntry::new("7", "Story")],
            ..standard_catalog()
        };
        let r = EquivalenceResolver::new(catalog);
        assert_eq!(r.resolve(EquivalenceKind::IssueType, "task", None), None);
        assert_eq!(r.default_issue_type(), None);
    }

    #[test]
    fn test_status_falls_back_to_first_member() {
        let r = resolver();
        // no rule for "fixed", catalog order decides
        let fixed = r.resolve(EquivalenceKind::Status, "fixed", None).unwrap();
        assert_eq!(fixed.entry.name, "Internal QA");
        let started = r.resolve(EquivalenceKind::Status, "started", None).unwrap();
        assert_eq!(started.entry.name, "In Progress");
    }

    #[test]
    fn test_existing_equivalent_is_kept() {
        let r = resolver();
        let kept = r
            .resolve(EquivalenceKind::Status, "started", Some("Review"))
            .unwrap();
        assert_eq!(kept.entry.name, "Review");
        assert!(!kept.changed);

        let moved = r
            .resolve(EquivalenceKind::Status, "started", Some("Closed"))
            .unwrap();
        assert_eq!(moved.entry.name, "In Progress");
        assert!(moved.changed);
    }

    #[test]
    fn test_unknown_label() {
        let r = resolver();
        assert_eq!(r.resolve(EquivalenceKind::Priority, "someday", None), None);
        assert_eq!(
            r.resolve_or_default(EquivalenceKind::Priority, "someday", None)
                .unwrap()
                .name,
            "Major"
        );
    }

    #[test]
    fn test_change_detected() {
        let r = resolver();
        let kind = EquivalenceKind::Priority;
        assert!(!r.change_detected("Critical", "Blocker", "critical", kind));
        assert!(!r.change_detected("blocker", "Blocker", "critical", kind));
        assert!(r.change_detected("Minor", "Blocker", "critical", kind));
        assert!(!r.change_detected("Minor", "Blocker", "whenever", kind));
    }

    fn kinds() -> impl Strategy<Value = EquivalenceKind> {
        prop_oneof![
            Just(EquivalenceKind::IssueType),
            Just(EquivalenceKind::Status),
            Just(EquivalenceKind::Priority),
        ]
    }

    proptest! {
        #[test]
        fn prop_resolution_is_member(kind in kinds(), pick in any::<prop::sample::Index>(), order in any::<u64>()) {
            let mut catalog = standard_catalog();
            let entries = match kind {
                EquivalenceKind::IssueType => &mut catalog.issue_types,
                EquivalenceKind::Status => &mut catalog.statuses,
                EquivalenceKind::Priority => &mut catalog.priorities,
            };
            let len = entries.len();
            entries.rotate_left((order as usize) % len);
            let r = EquivalenceResolver::new(catalog);

            let labels: Vec<_> = source_labels(kind).collect();
            let label = labels[pick.index(labels.len())];
            let members = equivalents(kind, label).unwrap();
            if let Some(resolution) = r.resolve(kind, label, None) {
                prop_assert!(is_member(&resolution.entry.name, members));
            }
        }

        #[test]
        fn prop_member_never_changes(kind in kinds(), pick in any::<prop::sample::Index>(), proposed in "[A-Za-z ]{0,12}") {
            let r = resolver();
            let labels: Vec<_> = source_labels(kind).collect();
            let label = labels[pick.index(labels.len())];
            for existing in equivalents(kind, label).unwrap() {
                prop_assert!(!r.change_detected(existing, &proposed, label, kind));
                prop_assert!(!r.change_detected(&existing.to_uppercase(), &proposed, label, kind));
            }
        }
    }
}
