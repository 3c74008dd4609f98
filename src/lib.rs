#![forbid(unsafe_code)]

pub mod api;
pub mod client;
pub mod config;
pub mod conn;
pub mod core;
pub mod error;
pub mod paths;
pub mod prefs;
pub mod sync;
pub mod telemetry;
pub mod view;
pub mod workspace;

pub use error::{Effect, Error, Transience};
pub type Result<T> = std::result::Result<T, Error>;

// Re-export core types at crate root for convenience
pub use crate::core::{
    ActorId, Fingerprint, Issue, IssueId, IssueType, ParamValue, Priority, QuerySpec, Status,
    SubKey,
};

pub use crate::client::SyncClient;
pub use crate::conn::{ConnState, Connection};
pub use crate::sync::{MirrorRegistry, ReleaseHandle, SubscriptionManager};
