//! Pure selectors composing mirror snapshots into view shapes.
//!
//! No side effects, fully recomputed on every change note - membership
//! sizes are bounded to one workspace's issue count, so recomputation is
//! cheaper than bookkeeping.

use std::collections::HashSet;

use crate::core::{Issue, IssueId, SubKey};
use crate::sync::MirrorRegistry;

/// A mirror's records, verbatim, in membership order.
pub fn issues_for(registry: &MirrorRegistry, key: &SubKey) -> Vec<Issue> {
    registry.snapshot_for(key)
}

/// A board column's records, with ids present in any exclusion mirror
/// removed.
///
/// Mirrors are independent, so "Ready minus In Progress" is cross-mirror
/// set arithmetic no single store can compute alone.
pub fn board_column(registry: &MirrorRegistry, key: &SubKey, exclude: &[&SubKey]) -> Vec<Issue> {
    let mut excluded: HashSet<IssueId> = HashSet::new();
    for other in exclude {
        for issue in registry.snapshot_for(other) {
            excluded.insert(issue.id);
        }
    }
    registry
        .snapshot_for(key)
        .into_iter()
        .filter(|issue| !excluded.contains(&issue.id))
        .collect()
}

/// Children of an expanded epic, in the epic's own `dependents` order.
///
/// Membership comes from the epic record itself (populated server-side),
/// and the records come from the epic's `detail:<id>` mirror - there is no
/// separate children mirror.
pub fn epic_children(registry: &MirrorRegistry, epic_id: &IssueId) -> Vec<Issue> {
    let key = SubKey::detail(epic_id);
    let detail = registry.snapshot_for(&key);
    let Some(epic) = detail.iter().find(|issue| &issue.id == epic_id) else {
        return Vec::new();
    };

    let order = epic.dependents.clone();
    order
        .iter()
        .filter_map(|child_id| detail.iter().find(|issue| &issue.id == child_id).cloned())
        .collect()
}

/// Status-dependent view ordering.
///
/// Closed views read newest-closed first; everything else reads by priority,
/// oldest first within a priority.
pub fn sort_for_view(issues: &mut [Issue], viewing_closed: bool) {
    if viewing_closed {
        issues.sort_by(|a, b| b.closed_ms.unwrap_or(0).cmp(&a.closed_ms.unwrap_or(0)));
    } else {
        issues.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.created_ms.cmp(&b.created_ms))
        });
    }
}
