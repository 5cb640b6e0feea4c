//! The public facade.
//!
//! `Atoll` owns the implementation outright; the inner state is shared
//! only with the refresh worker and with tasks spawned for the `*_async`
//! handles. All public errors come out of the `atoll_core::error`
//! taxonomy — this is the single conversion boundary.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use atoll_core::config::{AtollConfig, BalancerUsage, Remote};
use atoll_core::container::DataContainer;
use atoll_core::error::{Error, Result, SessionError};
use atoll_core::key::{short_id_hex, GroupId, Key};

use crate::balancer::{Balancer, BalancerTransport, GroupInfo, RefreshWorker};
use crate::bulk::BulkWriteOptions;
use crate::lookup::LookupResult;
use crate::read::{RangeOptions, ReadOptions};
use crate::selector::GroupSelector;
use crate::session::{IndexEntry, IoParams, Session};
use crate::write::WriteOptions;

pub(crate) struct Inner {
    pub(crate) session: Arc<dyn Session>,
    pub(crate) config: AtollConfig,
    pub(crate) selector: GroupSelector,
    pub(crate) balancer: Option<Arc<Balancer>>,
}

impl Inner {
    pub(crate) fn ensure_states(&self) -> Result<()> {
        let live = self.session.live_states();
        if live < self.config.die_limit {
            return Err(Error::TooFewStates {
                live,
                need: self.config.die_limit,
            });
        }
        Ok(())
    }

    pub(crate) fn params(&self, groups: Vec<GroupId>, cflags: u64, ioflags: u32) -> IoParams {
        IoParams {
            groups,
            cflags,
            ioflags,
            wait_timeout: self.config.wait_timeout(),
        }
    }

    /// R for one call: the explicit list's size, else the configured
    /// replication count (0 ⇒ whole default list).
    pub(crate) fn resolve_replication(&self, explicit: &[GroupId]) -> usize {
        if explicit.is_empty() {
            self.config.replication()
        } else {
            explicit.len()
        }
    }

    /// Candidate groups for a write of replication `replicas`,
    /// consulting the weighted cache when balancer usage asks for it.
    pub(crate) async fn write_groups(
        &self,
        explicit: &[GroupId],
        replicas: usize,
    ) -> Result<Vec<GroupId>> {
        let usage = self.config.balancer.usage;
        if usage >= BalancerUsage::Optional {
            let wants_advice = explicit.len() != replicas || usage == BalancerUsage::Mandatory;
            if let Some(balancer) = &self.balancer {
                if wants_advice {
                    match balancer.choose(replicas).await {
                        Ok(groups) => return Ok(groups),
                        Err(e) if usage >= BalancerUsage::Normal => return Err(e),
                        Err(e) => {
                            tracing::debug!(
                                error = %e,
                                "weighted selection failed, falling back to static groups"
                            );
                        }
                    }
                }
            } else if usage >= BalancerUsage::Normal {
                return Err(Error::MetabaseUnavailable(
                    "no balancer transport configured".into(),
                ));
            }
        }
        self.selector.select(explicit, replicas)
    }

    pub(crate) fn require_balancer(&self) -> Result<&Arc<Balancer>> {
        self.balancer.as_ref().ok_or_else(|| {
            Error::MetabaseUnavailable("no balancer transport configured".into())
        })
    }

    pub(crate) async fn do_remove(&self, key: &Key, groups: &[GroupId]) -> Result<()> {
        self.ensure_states()?;
        let lgroups = self.selector.select(groups, 0)?;
        let params = self.params(lgroups, 0, 0);
        match self.session.remove(params, key).await {
            Ok(()) => Ok(()),
            Err(SessionError::NotFound) => Err(Error::NotFound {
                key: key.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

struct RefreshTask {
    shutdown: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

/// Client for a replicated, group-organized object store.
///
/// One instance per application. Cheap operations (`ping`) are
/// synchronous; everything that touches the wire is async. Call
/// [`Atoll::shutdown`] before dropping when a balancer transport is
/// configured — that joins the refresh worker deterministically.
pub struct Atoll {
    inner: Arc<Inner>,
    refresh: Option<RefreshTask>,
}

impl Atoll {
    /// A client without placement advice; the weighted path is never
    /// exercised.
    pub fn new(config: AtollConfig, session: Arc<dyn Session>) -> Self {
        let selector = GroupSelector::new(config.groups.clone());
        Self {
            inner: Arc::new(Inner {
                session,
                selector,
                config,
                balancer: None,
            }),
            refresh: None,
        }
    }

    /// A client with a metadata balancer. Starts the weight refresh
    /// worker; must be called within a tokio runtime.
    pub fn with_balancer(
        config: AtollConfig,
        session: Arc<dyn Session>,
        transport: Arc<dyn BalancerTransport>,
    ) -> Self {
        let balancer = Arc::new(Balancer::new(transport));
        let (shutdown, rx) = broadcast::channel(1);
        let worker = RefreshWorker::new(balancer.clone(), config.refresh_period(), rx);
        let handle = tokio::spawn(worker.run());

        let selector = GroupSelector::new(config.groups.clone());
        Self {
            inner: Arc::new(Inner {
                session,
                selector,
                config,
                balancer: Some(balancer),
            }),
            refresh: Some(RefreshTask { shutdown, handle }),
        }
    }

    /// Stop and join the refresh worker. In-flight operations on other
    /// tasks are not cancelled.
    pub async fn shutdown(mut self) {
        if let Some(task) = self.refresh.take() {
            let _ = task.shutdown.send(());
            if let Err(e) = task.handle.await {
                tracing::warn!(error = %e, "refresh worker join failed");
            }
        }
    }

    // ── Core operations ───────────────────────────────────────────────────────

    /// Replicated write. Returns one lookup entry per group that holds
    /// the object. A metadata-finalize failure surfaces as a write
    /// failure even though the body stayed durable; the body is not
    /// rolled back in that case.
    pub async fn write(
        &self,
        key: &Key,
        data: impl Into<Bytes>,
        opts: WriteOptions,
    ) -> Result<Vec<LookupResult>> {
        self.inner.do_write(key, data.into(), &opts).await
    }

    pub async fn read(&self, key: &Key, opts: ReadOptions) -> Result<DataContainer> {
        self.inner.do_read(key, &opts).await
    }

    pub async fn lookup(&self, key: &Key, groups: &[GroupId]) -> Result<LookupResult> {
        self.inner.do_lookup(key, groups).await
    }

    pub async fn remove(&self, key: &Key, groups: &[GroupId]) -> Result<()> {
        self.inner.do_remove(key, groups).await
    }

    /// Bodies in the id range `[from, to]`. With NODATA in the ioflags,
    /// a single element holding the ASCII match count.
    pub async fn range_get(
        &self,
        from: &Key,
        to: &Key,
        opts: RangeOptions,
    ) -> Result<Vec<Bytes>> {
        self.inner.do_range(from, to, &opts).await
    }

    pub async fn bulk_read(
        &self,
        keys: &[Key],
        cflags: u64,
        groups: &[GroupId],
    ) -> Result<HashMap<Key, DataContainer>> {
        self.inner.do_bulk_read(keys, cflags, groups).await
    }

    pub async fn bulk_write(
        &self,
        keys: &[Key],
        data: &[DataContainer],
        opts: BulkWriteOptions,
    ) -> Result<HashMap<Key, Vec<LookupResult>>> {
        self.inner.do_bulk_write(keys, data, &opts).await
    }

    // ── Async handles ─────────────────────────────────────────────────────────

    pub fn write_async(
        &self,
        key: Key,
        data: impl Into<Bytes>,
        opts: WriteOptions,
    ) -> OpHandle<Vec<LookupResult>> {
        let inner = self.inner.clone();
        let data = data.into();
        OpHandle::spawn(async move { inner.do_write(&key, data, &opts).await })
    }

    pub fn read_async(&self, key: Key, opts: ReadOptions) -> OpHandle<DataContainer> {
        let inner = self.inner.clone();
        OpHandle::spawn(async move { inner.do_read(&key, &opts).await })
    }

    pub fn lookup_async(&self, key: Key, groups: Vec<GroupId>) -> OpHandle<LookupResult> {
        let inner = self.inner.clone();
        OpHandle::spawn(async move { inner.do_lookup(&key, &groups).await })
    }

    pub fn remove_async(&self, key: Key, groups: Vec<GroupId>) -> OpHandle<()> {
        let inner = self.inner.clone();
        OpHandle::spawn(async move { inner.do_remove(&key, &groups).await })
    }

    // ── Auxiliary operations ──────────────────────────────────────────────────

    /// True when enough transport states are live to serve requests.
    pub fn ping(&self) -> bool {
        self.inner.session.live_states() >= self.inner.config.die_limit
    }

    pub async fn stat_log(&self) -> Result<Vec<StatEntry>> {
        let counters = self.inner.session.stat().await?;
        Ok(counters
            .into_iter()
            .map(|c| StatEntry {
                addr: c.addr,
                la: c.la.map(|v| v as f32 / 100.0),
                mem_total: c.mem_total,
                mem_free: c.mem_free,
                storage_size_mb: c.storage_size_mb,
                available_mb: c.available_mb,
                files: c.files,
                fsid: c.fsid,
            })
            .collect())
    }

    /// Debug form of the key's raw id: 40 hex characters.
    pub async fn id_str(&self, key: &Key) -> Result<String> {
        let id = self.inner.materialize(key).await?;
        Ok(short_id_hex(&id))
    }

    pub async fn lookup_addr(&self, key: &Key, groups: &[GroupId]) -> Result<Vec<Remote>> {
        self.inner.ensure_states()?;
        let lgroups = self.inner.selector.select(groups, 0)?;
        Ok(self.inner.session.lookup_addr(key, &lgroups).await?)
    }

    pub async fn exec_script(
        &self,
        key: &Key,
        script: &str,
        data: impl Into<Bytes>,
        groups: &[GroupId],
    ) -> Result<String> {
        self.inner.ensure_states()?;
        let lgroups = self.inner.selector.select(groups, 0)?;
        let params = self.inner.params(lgroups, 0, 0);
        Ok(self
            .inner
            .session
            .exec(params, key, script, data.into())
            .await?)
    }

    // Secondary indexes are forwarded to the session verbatim.

    pub async fn update_indexes(
        &self,
        key: &Key,
        indexes: Vec<String>,
        data: Vec<Bytes>,
    ) -> Result<()> {
        self.inner.ensure_states()?;
        let lgroups = self.inner.selector.select(&[], 0)?;
        let params = self.inner.params(lgroups, 0, 0);
        Ok(self
            .inner
            .session
            .update_indexes(params, key, indexes, data)
            .await?)
    }

    pub async fn find_indexes(&self, indexes: Vec<String>) -> Result<Vec<IndexEntry>> {
        self.inner.ensure_states()?;
        let lgroups = self.inner.selector.select(&[], 0)?;
        let params = self.inner.params(lgroups, 0, 0);
        Ok(self.inner.session.find_indexes(params, indexes).await?)
    }

    pub async fn check_indexes(&self, key: &Key) -> Result<Vec<String>> {
        self.inner.ensure_states()?;
        let lgroups = self.inner.selector.select(&[], 0)?;
        let params = self.inner.params(lgroups, 0, 0);
        Ok(self.inner.session.check_indexes(params, key).await?)
    }

    // ── Balancer queries ──────────────────────────────────────────────────────

    pub async fn get_symmetric_groups(&self) -> Result<Vec<Vec<GroupId>>> {
        self.inner.require_balancer()?.symmetric_groups().await
    }

    pub async fn get_bad_groups(&self) -> Result<Vec<Vec<GroupId>>> {
        self.inner.require_balancer()?.bad_groups().await
    }

    pub async fn get_all_groups(&self) -> Result<Vec<GroupId>> {
        self.inner.require_balancer()?.all_groups().await
    }

    pub async fn get_metabalancer_group_info(&self, group: GroupId) -> Result<GroupInfo> {
        self.inner.require_balancer()?.group_info(group).await
    }
}

impl Drop for Atoll {
    fn drop(&mut self) {
        // Graceful path is shutdown(); this is the backstop so a dropped
        // client cannot leak the worker.
        if let Some(task) = self.refresh.take() {
            let _ = task.shutdown.send(());
            task.handle.abort();
        }
    }
}

/// Awaitable handle of a spawned operation.
pub struct OpHandle<T> {
    handle: JoinHandle<Result<T>>,
}

impl<T: Send + 'static> OpHandle<T> {
    fn spawn(fut: impl std::future::Future<Output = Result<T>> + Send + 'static) -> Self {
        Self {
            handle: tokio::spawn(fut),
        }
    }

    /// Wait for the operation and take its full result.
    pub async fn get(self) -> Result<T> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(Error::Transport(SessionError::Backend(format!(
                "operation task failed: {e}"
            )))),
        }
    }
}

impl OpHandle<Vec<LookupResult>> {
    /// Wait for the operation and take the first lookup entry.
    pub async fn get_one(self) -> Result<LookupResult> {
        self.get()
            .await?
            .into_iter()
            .next()
            .ok_or(Error::NoGroups)
    }
}

/// Per-node statistics, converted for human consumption.
#[derive(Debug, Clone)]
pub struct StatEntry {
    pub addr: String,
    /// 1/5/15-minute load averages.
    pub la: [f32; 3],
    pub mem_total: u64,
    pub mem_free: u64,
    pub storage_size_mb: u64,
    pub available_mb: u64,
    pub files: u64,
    pub fsid: u64,
}
