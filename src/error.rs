use thiserror::Error;

use crate::conn::ConnError;
use crate::core::CoreError;
use crate::sync::{RegistryError, SubError};
use crate::workspace::WorkspaceError;

/// Whether retrying this operation may succeed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Transience {
    /// Retry will never help without changing inputs/state.
    Permanent,
    /// Retry may help (transient disconnect/outage).
    Retryable,
    /// Unknown if retry will help.
    Unknown,
}

impl Transience {
    pub fn is_retryable(self) -> bool {
        matches!(self, Transience::Retryable)
    }
}

/// What we know about side effects when an error is returned.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Effect {
    /// Definitely no side effects occurred.
    None,
    /// Side effects definitely occurred (locally or remotely).
    Some,
    /// We don't know if side effects occurred.
    Unknown,
}

impl Effect {
    pub fn as_str(self) -> &'static str {
        match self {
            Effect::None => "none",
            Effect::Some => "some",
            Effect::Unknown => "unknown",
        }
    }
}

/// Crate-level convenience error.
///
/// Not a "god error": it is a thin wrapper over canonical capability errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Conn(#[from] ConnError),

    #[error(transparent)]
    Sub(#[from] SubError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}

impl Error {
    pub fn transience(&self) -> Transience {
        match self {
            Error::Core(e) => e.transience(),
            Error::Conn(e) => e.transience(),
            Error::Sub(e) => e.transience(),
            Error::Registry(e) => e.transience(),
            Error::Workspace(e) => e.transience(),
        }
    }

    pub fn effect(&self) -> Effect {
        match self {
            Error::Core(e) => e.effect(),
            Error::Conn(e) => e.effect(),
            Error::Sub(e) => e.effect(),
            Error::Registry(e) => e.effect(),
            Error::Workspace(e) => e.effect(),
        }
    }
}
