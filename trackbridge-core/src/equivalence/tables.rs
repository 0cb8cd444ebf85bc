//! Source label → acceptable Target labels, per field
//!
//! Keys are lowercase. Values keep the spelling used by the deployed Target
//! instance; comparisons against them are case-insensitive.

use super::EquivalenceKind;

pub(crate) type Table = &'static [(&'static str, &'static [&'static str])];

const ISSUE_TYPES: Table = &[
    (
        "task",
        &[
            "new feature",
            "task",
            "improvement",
            "provisioining",
            "sub-task",
            "performance",
            "support",
            "epic",
            "story",
            "technical task",
            "fulfillment",
            "seo",
            "promotion",
            "test",
        ],
    ),
    ("issue", &["development bug", "bug", "defect"]),
];

const STATUSES: Table = &[
    ("not started", &["open"]),
    ("new", &["open"]),
    ("started", &["in progress", "reopened", "review"]),
    ("in progress", &["in progress", "reopened", "review"]),
    (
        "fixed",
        &[
            "internal production validation",
            "internal staging validation",
            "Internal qa",
            "approved for prod",
            "approved for stage",
        ],
    ),
    ("reopened", &["reopened"]),
    ("resolved", &["resolved"]),
    ("completed", &["closed"]),
    ("duplicate", &["closed"]),
    ("can't repro", &["closed"]),
    ("won't fix", &["closed"]),
    ("needs info", &["require feedback"]),
    ("blocked", &["require feedback"]),
];

const PRIORITIES: Table = &[
    ("high", &["major"]),
    ("critical", &["blocker", "critical", "roadBlocked"]),
    ("normal", &["minor"]),
    ("low", &["trivial"]),
];

pub(crate) fn table(kind: EquivalenceKind) -> Table {
    match kind {
        EquivalenceKind::IssueType => ISSUE_TYPES,
        EquivalenceKind::Status => STATUSES,
        EquivalenceKind::Priority => PRIORITIES,
    }
}

/// Acceptable Target labels for `source_label`, if the label has an entry
pub fn equivalents(kind: EquivalenceKind, source_label: &str) -> Option<&'static [&'static str]> {
    let wanted = source_label.trim();
    table(kind)
        .iter()
        .find(|(label, _)| label.eq_ignore_ascii_case(wanted))
        .map(|(_, targets)| *targets)
}

/// Preferred Target label per Source label
///
/// Issue types only accept a catalog entry that satisfies this rule. Statuses
/// and priorities use it to rank candidates and fall back to any member.
pub fn match_rule(source_label: &str, target_label: &str) -> bool {
    let source = source_label.trim();
    let is = |s: &str, t: &str| source.eq_ignore_ascii_case(s) && target_label.eq_ignore_ascii_case(t);

    if source.eq_ignore_ascii_case("task") {
        return target_label.eq_ignore_ascii_case(source);
    }
    is("issue", "bug")
        || is("not started", "open")
        || is("started", "in progress")
        || is("completed", "closed")
        || is("needs info", "require feedback")
        || is("high", "major")
        || is("critical", "blocker")
        || is("normal", "minor")
        || is("low", "trivial")
}

/// Source labels with an entry in the table
pub fn source_labels(kind: EquivalenceKind) -> impl Iterator<Item = &'static str> {
    table(kind).iter().map(|(label, _)| *label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(
            equivalents(EquivalenceKind::Status, "Not Started"),
            Some(&["open"][..])
        );
        assert_eq!(equivalents(EquivalenceKind::Priority, "CRITICAL").map(|s| s.len()), Some(3));
        assert_eq!(equivalents(EquivalenceKind::IssueType, "chore"), None);
    }

    #[test]
    fn test_match_rule() {
        assert!(match_rule("issue", "Bug"));
        assert!(!match_rule("issue", "Defect"));
        assert!(match_rule("task", "TASK"));
        assert!(!match_rule("task", "Story"));
        assert!(match_rule("needs info", "Require Feedback"));
        assert!(match_rule("critical", "Blocker"));
        assert!(!match_rule("critical", "Critical"));
        assert!(!match_rule("fixed", "Internal qa"));
    }

    #[test]
    fn test_every_rule_target_is_a_member() {
        for kind in [
            EquivalenceKind::IssueType,
            EquivalenceKind::Status,
            EquivalenceKind::Priority,
        ] {
            for (label, members) in table(kind) {
                let ruled: Vec<_> = members.iter().filter(|m| match_rule(label, m)).collect();
                assert!(ruled.len() <= 1, "{} has several preferred labels", label);
            }
        }
    }
}
