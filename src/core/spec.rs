//! Query specifications and their change-detection fingerprints.
//!
//! A spec describes what a subscription should stream. Two specs are equal
//! iff their canonical serialization is equal; the fingerprint over those
//! bytes is the sole gate deciding whether an active subscription must be
//! replaced.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Scalar parameter value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// What the server should stream for one subscription.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub kind: String,

    /// BTreeMap keeps key order stable, which makes plain serde_json output
    /// canonical for fingerprinting.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, ParamValue>,
}

impl QuerySpec {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Canonical serialization: fixed field order, sorted params, no
    /// insignificant whitespace.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        // Scalar-only content: serialization cannot fail.
        serde_json::to_vec(self).expect("query spec serializes")
    }

    /// Change-detection fingerprint over the canonical bytes.
    pub fn fingerprint(&self) -> Fingerprint {
        use sha2::{Digest, Sha256};

        let mut h = Sha256::new();
        h.update(self.canonical_bytes());
        Fingerprint(h.finalize().into())
    }
}

/// SHA-256 over a spec's canonical serialization.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short prefix is enough for logs.
        for b in &self.0[..8] {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}
