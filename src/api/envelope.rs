//! Push envelope schema.
//!
//! One envelope carries a full or incremental update for one subscription
//! key. Envelopes are applied strictly in arrival order per key, and a store
//! is only ever mutated from a fully valid envelope.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{Issue, IssueId, SubKey};

/// How an envelope changes the mirror.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeKind {
    /// Full authoritative membership + entity set; replaces prior state.
    Snapshot,
    /// Entities enter membership (appended) or are updated in place.
    Upsert,
    /// Ids leave membership; their records are dropped.
    Delete,
}

impl EnvelopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Snapshot => "snapshot",
            Self::Upsert => "upsert",
            Self::Delete => "delete",
        }
    }
}

/// Server-to-client mirror update for one key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PushEnvelope {
    pub key: SubKey,
    pub kind: EnvelopeKind,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Issue>,

    /// Single-item shorthand some server paths emit instead of `items`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<Issue>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<IssueId>,
}

impl PushEnvelope {
    pub fn snapshot(key: SubKey, items: Vec<Issue>) -> Self {
        Self {
            key,
            kind: EnvelopeKind::Snapshot,
            items,
            item: None,
            ids: Vec::new(),
        }
    }

    pub fn upsert(key: SubKey, items: Vec<Issue>) -> Self {
        Self {
            key,
            kind: EnvelopeKind::Upsert,
            items,
            item: None,
            ids: Vec::new(),
        }
    }

    pub fn delete(key: SubKey, ids: Vec<IssueId>) -> Self {
        Self {
            key,
            kind: EnvelopeKind::Delete,
            items: Vec::new(),
            item: None,
            ids,
        }
    }

    /// All carried records, folding the `item` shorthand into `items`.
    pub fn records(&self) -> impl Iterator<Item = &Issue> {
        self.items.iter().chain(self.item.iter())
    }

    /// Reject envelopes that cannot be applied in full.
    ///
    /// A snapshot with zero records is valid (it clears the mirror); an
    /// upsert or delete that carries nothing is malformed.
    pub fn validate(&self) -> Result<(), EnvelopeError> {
        match self.kind {
            EnvelopeKind::Snapshot => Ok(()),
            EnvelopeKind::Upsert => {
                if self.records().next().is_none() {
                    Err(EnvelopeError::EmptyUpsert {
                        key: self.key.clone(),
                    })
                } else {
                    Ok(())
                }
            }
            EnvelopeKind::Delete => {
                if self.ids.is_empty() {
                    Err(EnvelopeError::EmptyDelete {
                        key: self.key.clone(),
                    })
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Malformed envelope.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum EnvelopeError {
    #[error("upsert envelope for `{key}` carries no records")]
    EmptyUpsert { key: SubKey },
    #[error("delete envelope for `{key}` carries no ids")]
    EmptyDelete { key: SubKey },
}
