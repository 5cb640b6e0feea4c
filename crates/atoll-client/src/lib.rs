//! atoll-client — smart client for a replicated, group-organized object
//! store.
//!
//! The store keeps each object in several *groups* (independent replica
//! sets). This crate hides replica selection, quorum policy, chunked
//! streaming writes, partial-failure compensation and optional placement
//! advice from a metadata balancer behind one upload/download/lookup
//! surface. The wire transport itself lives behind the [`Session`]
//! trait; the balancer bus behind [`BalancerTransport`].

pub mod balancer;
pub mod bulk;
pub mod client;
pub mod lookup;
pub mod read;
pub mod selector;
pub mod session;
pub mod write;

pub use balancer::{Balancer, BalancerTransport, GroupInfo, GroupStatus};
pub use bulk::BulkWriteOptions;
pub use client::{Atoll, OpHandle, StatEntry};
pub use lookup::{EblobRef, LookupResult};
pub use read::{RangeOptions, ReadOptions};
pub use selector::GroupSelector;
pub use session::{
    ioflags, BlobLocation, BulkReadEntry, BulkWriteReply, GroupOutcome, IndexEntry, IoDescriptor,
    IoParams, NodeCounters, RawLookup, Session, SessionResult,
};
pub use write::WriteOptions;

pub use atoll_core::{
    AddrFamily, AtollConfig, BalancerConfig, BalancerUsage, DataContainer, Error, GroupId, Key,
    RawId, Remote, Result, SessionError, SuccessMode, Timestamp,
};
