//! Client-side view filters.
//!
//! Filters live in UI state, not in the subscription spec: search text,
//! type and label filters are applied locally over the full mirrored
//! membership. Only the status filter can change what the server must
//! stream - viewing closed issues selects a different spec kind entirely,
//! and that spec change (detected by fingerprint) is what forces a
//! resubscribe.

use serde::{Deserialize, Serialize};

use crate::core::{Issue, IssueType, QuerySpec, Status};

/// Filter state for one list view.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewFilters {
    /// Filter by status. `None` shows every non-closed issue.
    pub status: Option<Status>,

    /// Case-insensitive substring match over title and id.
    pub search: Option<String>,

    /// Filter by issue type.
    pub issue_type: Option<IssueType>,

    /// Filter by labels (must have ALL).
    pub labels: Vec<String>,
}

impl ViewFilters {
    /// Check if an issue passes these filters.
    pub fn matches(&self, issue: &Issue) -> bool {
        match self.status {
            Some(status) => {
                if issue.status != status {
                    return false;
                }
            }
            None => {
                if issue.is_closed() {
                    return false;
                }
            }
        }

        if let Some(issue_type) = self.issue_type
            && issue.issue_type != issue_type
        {
            return false;
        }

        for label in &self.labels {
            if !issue.has_label(label) {
                return false;
            }
        }

        if let Some(search) = self.search.as_deref() {
            let needle = search.to_lowercase();
            if !needle.is_empty()
                && !issue.title.to_lowercase().contains(&needle)
                && !issue.id.as_str().to_lowercase().contains(&needle)
            {
                return false;
            }
        }

        true
    }

    /// The subscription spec this filter state requires.
    ///
    /// Purely local filters never appear here; resubscribing on a search
    /// keystroke would defeat the point of mirroring.
    pub fn query_spec(&self) -> QuerySpec {
        match self.status {
            Some(Status::Closed) => QuerySpec::new("closed-issues"),
            _ => QuerySpec::new("all-issues"),
        }
    }
}

/// Spec for a single-issue detail subscription.
pub fn detail_spec(id: &crate::core::IssueId) -> QuerySpec {
    QuerySpec::new("issue-detail").with_param("id", id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(json: serde_json::Value) -> Issue {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn default_filters_hide_closed() {
        let filters = ViewFilters::default();
        assert!(filters.matches(&issue(
            serde_json::json!({"id":"I-1","status":"open","title":"t"})
        )));
        assert!(!filters.matches(&issue(
            serde_json::json!({"id":"I-2","status":"closed","title":"t"})
        )));
    }

    #[test]
    fn search_matches_title_and_id_case_insensitively() {
        let filters = ViewFilters {
            search: Some("CRASH".into()),
            ..ViewFilters::default()
        };
        assert!(filters.matches(&issue(
            serde_json::json!({"id":"I-1","status":"open","title":"parser crash on empty input"})
        )));
        assert!(!filters.matches(&issue(
            serde_json::json!({"id":"I-2","status":"open","title":"slow query"})
        )));

        let by_id = ViewFilters {
            search: Some("i-2".into()),
            ..ViewFilters::default()
        };
        assert!(by_id.matches(&issue(
            serde_json::json!({"id":"I-2","status":"open","title":"slow query"})
        )));
    }

    #[test]
    fn label_filters_require_all() {
        let filters = ViewFilters {
            labels: vec!["backend".into(), "urgent".into()],
            ..ViewFilters::default()
        };
        assert!(filters.matches(&issue(serde_json::json!({
            "id":"I-1","status":"open","labels":["backend","urgent","misc"]
        }))));
        assert!(!filters.matches(&issue(serde_json::json!({
            "id":"I-2","status":"open","labels":["backend"]
        }))));
    }

    #[test]
    fn only_the_closed_status_changes_the_spec() {
        let open = ViewFilters::default();
        let searched = ViewFilters {
            search: Some("anything".into()),
            labels: vec!["backend".into()],
            ..ViewFilters::default()
        };
        assert_eq!(
            open.query_spec().fingerprint(),
            searched.query_spec().fingerprint()
        );

        let closed = ViewFilters {
            status: Some(Status::Closed),
            ..ViewFilters::default()
        };
        assert_ne!(
            open.query_spec().fingerprint(),
            closed.query_spec().fingerprint()
        );
    }
}
