//! Crate-wide error taxonomy.
//!
//! Subprotocol-local anomalies (equivocation, malformed payloads, happiness-quorum
//! failure) are absorbed by the protocol itself and never reach this type — only
//! hard invariant breaks and explicit cancellation propagate to callers.

use thiserror::Error;

use crate::field::FieldError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Field(#[from] FieldError),

    /// A threshold invariant was violated (e.g. fewer than `n - f` responses
    /// arrived without additional faults, or ABA instances disagreed). Indicates
    /// the offending subprotocol instance is in an impossible state.
    #[error("protocol invariant violated: {0}")]
    ProtocolViolation(String),

    /// `ABA::propose` was called twice for the same instance.
    #[error("ABA instance {0} already has a proposal in flight")]
    AlreadyProposed(u32),

    /// The party was shut down while a caller was awaiting a subprotocol result.
    #[error("party was cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
