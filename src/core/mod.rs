//! Core domain types for the sync client.
//!
//! Module hierarchy follows type dependency order:
//! - error: CoreError, InvalidId, RangeError
//! - identity: IssueId, SubKey, ActorId
//! - domain: Status, IssueType, Priority
//! - issue: the Issue wire record a mirror holds
//! - spec: QuerySpec and its change-detection fingerprint

pub mod domain;
pub mod error;
pub mod identity;
pub mod issue;
pub mod spec;

pub use domain::{IssueType, Priority, Status};
pub use error::{CoreError, InvalidId, RangeError};
pub use identity::{ActorId, IssueId, SubKey};
pub use issue::Issue;
pub use spec::{Fingerprint, ParamValue, QuerySpec};
