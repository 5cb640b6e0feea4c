//! Session contract — the seam between the engines and the storage
//! transport.
//!
//! The transport object is shared across all calls, so every per-call
//! setting (groups, cflags, ioflags, timeout) travels in an owned
//! `IoParams`. Nothing is mutated on the shared session; concurrent
//! calls cannot observe each other's settings.
//!
//! Group-fanned operations reply per group. An error for one group is
//! data, not a call failure — engines use it to compute surviving sets
//! and to run elimination loops. A `SessionError` returned from the call
//! itself means the whole call died (no route, bus down, timeout).

use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;

use atoll_core::config::{AddrFamily, Remote};
use atoll_core::container::Timestamp;
use atoll_core::error::SessionError;
use atoll_core::key::{GroupId, Key, RawId};

pub type SessionResult<T> = Result<T, SessionError>;

/// IO flag bits understood by the write and range paths.
///
/// Any of PREPARE / COMMIT / PLAIN_WRITE selects that single low-level
/// write flavor and disables chunking. NODATA turns a range read into a
/// count query.
pub mod ioflags {
    pub const PREPARE: u32 = 1 << 0;
    pub const COMMIT: u32 = 1 << 1;
    pub const PLAIN_WRITE: u32 = 1 << 2;
    pub const NODATA: u32 = 1 << 3;
}

/// Per-call settings, owned by the call.
#[derive(Debug, Clone)]
pub struct IoParams {
    pub groups: Vec<GroupId>,
    pub cflags: u64,
    pub ioflags: u32,
    pub wait_timeout: Duration,
}

/// Where one group stored a replica: address plus backend location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLookup {
    pub group: GroupId,
    pub host: String,
    pub family: AddrFamily,
    /// Backend filesystem path of the replica.
    pub fs_path: String,
    /// Present when the backend packs objects into blob files.
    pub blob: Option<BlobLocation>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobLocation {
    pub file: String,
    pub offset: u64,
    pub size: u64,
}

/// One group's reply to a fanned call.
#[derive(Debug, Clone)]
pub struct GroupOutcome {
    pub group: GroupId,
    pub result: SessionResult<RawLookup>,
}

/// Group ids that replied without error.
pub fn ok_groups(outcomes: &[GroupOutcome]) -> Vec<GroupId> {
    outcomes
        .iter()
        .filter(|o| o.result.is_ok())
        .map(|o| o.group)
        .collect()
}

/// One entry of a bulk read request.
#[derive(Debug, Clone, Copy)]
pub struct IoDescriptor {
    pub id: RawId,
    pub offset: u64,
    pub size: u64,
}

/// One object returned by a bulk read.
#[derive(Debug, Clone)]
pub struct BulkReadEntry {
    pub id: RawId,
    pub data: Bytes,
}

/// One (object, group) reply of a bulk write.
#[derive(Debug, Clone)]
pub struct BulkWriteReply {
    pub id: RawId,
    pub group: GroupId,
    pub result: SessionResult<RawLookup>,
}

/// One object found through a secondary index.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub id: RawId,
    pub data: Bytes,
}

/// Raw per-node counters, as the transport reports them.
/// Load averages are stored ×100; `stat_log` converts on the way out.
#[derive(Debug, Clone)]
pub struct NodeCounters {
    pub addr: String,
    pub la: [u32; 3],
    pub mem_total: u64,
    pub mem_free: u64,
    pub storage_size_mb: u64,
    pub available_mb: u64,
    pub files: u64,
    pub fsid: u64,
}

/// The storage transport session.
///
/// Implementations must be safe for concurrent use; all call-scoped
/// state arrives through `IoParams`. Methods return boxed futures so the
/// trait stays object-safe behind `Arc<dyn Session>`.
pub trait Session: Send + Sync {
    /// Number of live transport states (connected nodes).
    fn live_states(&self) -> usize;

    /// Resolve a name key to its raw id.
    fn transform<'a>(&'a self, key: &'a Key) -> BoxFuture<'a, SessionResult<RawId>>;

    /// Plain replicated write of `data` at `offset`.
    fn write_data<'a>(
        &'a self,
        params: IoParams,
        key: &'a Key,
        data: Bytes,
        offset: u64,
    ) -> BoxFuture<'a, SessionResult<Vec<GroupOutcome>>>;

    /// First call of a staged upload; `reserve` is the full extent to
    /// allocate.
    fn write_prepare<'a>(
        &'a self,
        params: IoParams,
        key: &'a Key,
        data: Bytes,
        offset: u64,
        reserve: u64,
    ) -> BoxFuture<'a, SessionResult<Vec<GroupOutcome>>>;

    /// Middle call of a staged upload.
    fn write_plain<'a>(
        &'a self,
        params: IoParams,
        key: &'a Key,
        data: Bytes,
        offset: u64,
    ) -> BoxFuture<'a, SessionResult<Vec<GroupOutcome>>>;

    /// Final call of a staged upload; `total` is the committed extent.
    fn write_commit<'a>(
        &'a self,
        params: IoParams,
        key: &'a Key,
        data: Bytes,
        offset: u64,
        total: u64,
    ) -> BoxFuture<'a, SessionResult<Vec<GroupOutcome>>>;

    /// Metadata finalization for a completed body upload.
    fn write_metadata<'a>(
        &'a self,
        params: IoParams,
        key: &'a Key,
        ts: Timestamp,
    ) -> BoxFuture<'a, SessionResult<()>>;

    /// Read from one of the target groups (transport's choice).
    fn read<'a>(
        &'a self,
        params: IoParams,
        key: &'a Key,
        offset: u64,
        size: u64,
    ) -> BoxFuture<'a, SessionResult<Bytes>>;

    /// Read the replica with the newest embedded timestamp.
    fn read_latest<'a>(
        &'a self,
        params: IoParams,
        key: &'a Key,
        offset: u64,
        size: u64,
    ) -> BoxFuture<'a, SessionResult<Bytes>>;

    fn lookup<'a>(
        &'a self,
        params: IoParams,
        key: &'a Key,
    ) -> BoxFuture<'a, SessionResult<Vec<GroupOutcome>>>;

    /// Remove the key from every target group. `NotFound` when no group
    /// held the key.
    fn remove<'a>(&'a self, params: IoParams, key: &'a Key) -> BoxFuture<'a, SessionResult<()>>;

    /// Read the id range `[from, to]`. With NODATA in the ioflags the
    /// reply is a single element holding the ASCII match count.
    fn read_range<'a>(
        &'a self,
        params: IoParams,
        from: &'a Key,
        to: &'a Key,
        limit_start: u64,
        limit_num: u64,
    ) -> BoxFuture<'a, SessionResult<Vec<Bytes>>>;

    fn bulk_read(
        &self,
        params: IoParams,
        ios: Vec<IoDescriptor>,
    ) -> BoxFuture<'_, SessionResult<Vec<BulkReadEntry>>>;

    fn bulk_write(
        &self,
        params: IoParams,
        items: Vec<(RawId, Bytes)>,
    ) -> BoxFuture<'_, SessionResult<Vec<BulkWriteReply>>>;

    fn stat(&self) -> BoxFuture<'_, SessionResult<Vec<NodeCounters>>>;

    /// Addresses of the nodes that would serve this key.
    fn lookup_addr<'a>(
        &'a self,
        key: &'a Key,
        groups: &'a [GroupId],
    ) -> BoxFuture<'a, SessionResult<Vec<Remote>>>;

    /// Run a server-side script against the key.
    fn exec<'a>(
        &'a self,
        params: IoParams,
        key: &'a Key,
        script: &'a str,
        data: Bytes,
    ) -> BoxFuture<'a, SessionResult<String>>;

    fn update_indexes<'a>(
        &'a self,
        params: IoParams,
        key: &'a Key,
        indexes: Vec<String>,
        data: Vec<Bytes>,
    ) -> BoxFuture<'a, SessionResult<()>>;

    fn find_indexes(
        &self,
        params: IoParams,
        indexes: Vec<String>,
    ) -> BoxFuture<'_, SessionResult<Vec<IndexEntry>>>;

    fn check_indexes<'a>(
        &'a self,
        params: IoParams,
        key: &'a Key,
    ) -> BoxFuture<'a, SessionResult<Vec<String>>>;
}
