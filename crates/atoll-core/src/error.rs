//! Error taxonomy for client operations.
//!
//! Engines return these directly; there is exactly one conversion
//! boundary (`Transport`) where session and RPC failures enter, with the
//! original message preserved. Per-group errors inside multi-group loops
//! are not surfaced individually — a group is eliminated and the loop
//! continues until the candidate set empties or acceptance fails.

use std::time::Duration;

/// Failure vocabulary of the storage transport adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("no such key")]
    NotFound,

    #[error("backend: {0}")]
    Backend(String),

    #[error("network: {0}")]
    Network(String),
}

/// Terminal errors surfaced by the public API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The session reports fewer live transport states than the
    /// configured die limit. Not retried.
    #[error("too few live states: {live} < {need}")]
    TooFewStates { live: usize, need: usize },

    /// The group selector produced an empty candidate list.
    #[error("no groups to operate on")]
    NoGroups,

    /// Every candidate group failed to return the key.
    #[error("{key}: not found in any group")]
    NotFound { key: String },

    /// The acceptance predicate was not satisfied; compensation ran.
    #[error("{key}: write accepted by {acked} of {targets} groups, {need} required")]
    WriteRejected {
        key: String,
        acked: usize,
        need: usize,
        targets: usize,
    },

    /// At least one key in a bulk write missed its acceptance threshold;
    /// the whole batch was compensated.
    #[error("bulk write rejected: {failed} of {total} keys below the acceptance threshold")]
    BulkWriteRejected { failed: usize, total: usize },

    /// Embedded framing is inconsistent.
    #[error("embedded framing corrupt: {reason}")]
    Corrupt { reason: String },

    /// The metadata balancer transport failed. Fatal only when balancer
    /// usage is normal or mandatory.
    #[error("metadata balancer unavailable: {0}")]
    MetabaseUnavailable(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A session or RPC error that terminated the whole call.
    #[error("transport: {0}")]
    Transport(#[from] SessionError),
}

pub type Result<T> = std::result::Result<T, Error>;
