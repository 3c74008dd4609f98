//! The issue record a mirror holds.
//!
//! Mirrors store the server's view of an issue verbatim: plain wire records,
//! not merge structures. Conflict resolution happened server-side before the
//! record was pushed.

use serde::{Deserialize, Serialize};

use super::domain::{IssueType, Priority, Status};
use super::identity::{ActorId, IssueId};

/// One issue as streamed by the server.
///
/// Only `id` and `status` are mandatory on the wire; everything else has a
/// neutral default so partial detail payloads decode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: IssueId,

    pub status: Status,

    #[serde(default)]
    pub title: String,

    #[serde(rename = "type", default)]
    pub issue_type: IssueType,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<ActorId>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,

    #[serde(default)]
    pub created_ms: u64,

    #[serde(default)]
    pub updated_ms: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_ms: Option<u64>,

    /// Children of an epic, in server order. Populated server-side; empty for
    /// non-epics.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependents: Vec<IssueId>,
}

impl Issue {
    pub fn is_closed(&self) -> bool {
        self.status == Status::Closed
    }

    pub fn is_epic(&self) -> bool {
        self.issue_type == IssueType::Epic
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_minimal_wire_record() {
        let issue: Issue = serde_json::from_str(r#"{"id":"I-1","status":"open"}"#).unwrap();
        assert_eq!(issue.id.as_str(), "I-1");
        assert_eq!(issue.status, Status::Open);
        assert_eq!(issue.issue_type, IssueType::Task);
        assert_eq!(issue.priority, Priority::MEDIUM);
        assert!(issue.title.is_empty());
        assert!(issue.dependents.is_empty());
    }

    #[test]
    fn decodes_epic_with_dependents() {
        let issue: Issue = serde_json::from_str(
            r#"{"id":"I-7","status":"open","type":"epic","dependents":["I-8","I-9"]}"#,
        )
        .unwrap();
        assert!(issue.is_epic());
        assert_eq!(issue.dependents.len(), 2);
    }
}
