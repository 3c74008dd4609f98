//! Entity mirror store: the local authoritative copy of one subscription.
//!
//! Membership is an ordered, duplicate-free id sequence; `entities` holds
//! exactly the records those ids name. Every envelope is applied whole, in
//! arrival order, so the pair never disagrees.

use std::collections::HashMap;

use crate::api::envelope::{EnvelopeKind, PushEnvelope};
use crate::core::{Issue, IssueId, QuerySpec, SubKey};

pub struct MirrorStore {
    key: SubKey,
    spec: QuerySpec,
    membership: Vec<IssueId>,
    entities: HashMap<IssueId, Issue>,
}

impl MirrorStore {
    pub fn new(key: SubKey, spec: QuerySpec) -> Self {
        Self {
            key,
            spec,
            membership: Vec::new(),
            entities: HashMap::new(),
        }
    }

    pub fn key(&self) -> &SubKey {
        &self.key
    }

    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    pub(crate) fn set_spec(&mut self, spec: QuerySpec) {
        self.spec = spec;
    }

    pub fn len(&self) -> usize {
        self.membership.len()
    }

    pub fn is_empty(&self) -> bool {
        self.membership.is_empty()
    }

    pub fn contains(&self, id: &IssueId) -> bool {
        self.entities.contains_key(id)
    }

    pub fn get(&self, id: &IssueId) -> Option<&Issue> {
        self.entities.get(id)
    }

    pub fn member_ids(&self) -> &[IssueId] {
        &self.membership
    }

    /// Apply one validated envelope addressed to this store.
    pub fn apply(&mut self, envelope: &PushEnvelope) {
        match envelope.kind {
            EnvelopeKind::Snapshot => {
                self.membership.clear();
                self.entities.clear();
                for record in envelope.records() {
                    self.upsert_one(record.clone());
                }
            }
            EnvelopeKind::Upsert => {
                for record in envelope.records() {
                    self.upsert_one(record.clone());
                }
            }
            EnvelopeKind::Delete => {
                for id in &envelope.ids {
                    if self.entities.remove(id).is_some() {
                        self.membership.retain(|member| member != id);
                    }
                }
            }
        }
    }

    /// Current membership as records, in membership order.
    pub fn snapshot(&self) -> Vec<Issue> {
        self.membership
            .iter()
            .filter_map(|id| self.entities.get(id).cloned())
            .collect()
    }

    fn upsert_one(&mut self, issue: Issue) {
        // Present ids update in place; new ids append. Arrival order, not
        // sort order - ordering is a selector concern.
        if self.entities.insert(issue.id.clone(), issue.clone()).is_none() {
            self.membership.push(issue.id);
        }
    }
}
