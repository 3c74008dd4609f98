//! Identity atoms.
//!
//! IssueId: server-minted issue identifier (opaque to the client)
//! SubKey: caller-chosen key naming one live subscription
//! ActorId: assignee / actor name

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{CoreError, InvalidId};

/// Issue identifier.
///
/// The server mints ids; the client never parses structure out of them.
/// Non-empty is the only local requirement.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueId(String);

impl IssueId {
    pub fn new(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        if s.is_empty() {
            Err(InvalidId::Issue {
                raw: s,
                reason: "empty".into(),
            }
            .into())
        } else {
            Ok(Self(s))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IssueId({:?})", self.0)
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Subscription key - caller-chosen, unique among live subscriptions.
///
/// Opaque to the server; the client uses conventions like `tab:issues` or
/// `detail:<issue-id>` but nothing here depends on them.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubKey(String);

impl SubKey {
    pub fn new(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        if s.is_empty() {
            return Err(InvalidId::SubKey {
                raw: s,
                reason: "empty".into(),
            }
            .into());
        }
        if s.chars().any(char::is_whitespace) {
            return Err(InvalidId::SubKey {
                raw: s,
                reason: "contains whitespace".into(),
            }
            .into());
        }
        Ok(Self(s))
    }

    /// Conventional key for a detail subscription on one issue.
    pub fn detail(id: &IssueId) -> Self {
        Self(format!("detail:{}", id.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubKey({:?})", self.0)
    }
}

impl fmt::Display for SubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Actor identifier - non-empty string.
///
/// Actors name themselves. No validation beyond non-empty.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    pub fn new(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        if s.is_empty() {
            Err(InvalidId::Actor {
                raw: s,
                reason: "empty".into(),
            }
            .into())
        } else {
            Ok(Self(s))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorId({:?})", self.0)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_id_rejects_empty() {
        assert!(IssueId::new("").is_err());
        assert!(IssueId::new("I-1").is_ok());
    }

    #[test]
    fn sub_key_rejects_whitespace() {
        assert!(SubKey::new("tab issues").is_err());
        assert!(SubKey::new("").is_err());
        assert_eq!(SubKey::new("tab:issues").unwrap().as_str(), "tab:issues");
    }

    #[test]
    fn detail_key_convention() {
        let id = IssueId::new("I-42").unwrap();
        assert_eq!(SubKey::detail(&id).as_str(), "detail:I-42");
    }
}
