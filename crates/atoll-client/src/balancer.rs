//! Metadata balancer — weighted group cache and out-of-band queries.
//!
//! The balancer speaks msgpack over a request/response bus; the bus
//! itself is behind the `BalancerTransport` trait so the library never
//! owns a socket. The weighted cache is refreshed by a background worker
//! and read under a short lock; a refresh installs a whole new snapshot
//! by pointer swap, so readers never see a half-applied table.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use rand::distributions::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

use atoll_core::error::{Error, Result, SessionError};
use atoll_core::key::GroupId;

/// Service name on the balancer bus.
pub const BALANCER_SERVICE: &str = "mastermind";

const METHOD_GROUP_WEIGHTS: &str = "get_group_weights";
const METHOD_GROUP_INFO: &str = "get_group_info";
const METHOD_SYMMETRIC_GROUPS: &str = "get_symmetric_groups";
const METHOD_BAD_GROUPS: &str = "get_bad_groups";

/// Request/response bus to the balancer. Bodies are msgpack.
pub trait BalancerTransport: Send + Sync {
    fn call<'a>(
        &'a self,
        service: &'a str,
        method: &'a str,
        body: Vec<u8>,
    ) -> BoxFuture<'a, std::result::Result<Vec<u8>, SessionError>>;
}

/// The balancer's view of one group's replication cohorts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInfo {
    pub couples: Vec<Vec<GroupId>>,
    pub status: GroupStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupStatus {
    Coupled,
    Bad,
    Unknown,
}

#[derive(Deserialize)]
struct GroupInfoWire {
    #[serde(default)]
    couples: Vec<Vec<GroupId>>,
    #[serde(default)]
    status: Option<String>,
}

impl From<GroupInfoWire> for GroupInfo {
    fn from(wire: GroupInfoWire) -> Self {
        let status = match wire.status.as_deref() {
            Some("coupled") => GroupStatus::Coupled,
            Some("bad") => GroupStatus::Bad,
            _ => GroupStatus::Unknown,
        };
        GroupInfo {
            couples: wire.couples,
            status,
        }
    }
}

#[derive(Serialize)]
struct WeightsRequest {
    stamp: u64,
}

/// `(groups, weight)` rows per group-set size.
type WeightRows = Vec<(Vec<GroupId>, u64)>;

#[derive(Debug, Default)]
struct Snapshot {
    by_size: HashMap<u32, WeightRows>,
}

/// Weighted group cache plus the balancer RPC surface.
pub struct Balancer {
    transport: Arc<dyn BalancerTransport>,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    /// Bumped once per weights request; the server uses it for freshness.
    stamp: AtomicU64,
}

impl Balancer {
    pub fn new(transport: Arc<dyn BalancerTransport>) -> Self {
        Self {
            transport,
            snapshot: RwLock::new(None),
            stamp: AtomicU64::new(0),
        }
    }

    async fn call(&self, method: &str, body: Vec<u8>) -> Result<Vec<u8>> {
        self.transport
            .call(BALANCER_SERVICE, method, body)
            .await
            .map_err(|e| Error::MetabaseUnavailable(e.to_string()))
    }

    /// Fetch a fresh weight table and swap it in.
    pub async fn refresh(&self) -> Result<()> {
        let stamp = self.stamp.fetch_add(1, Ordering::Relaxed) + 1;
        let body = rmp_serde::to_vec_named(&WeightsRequest { stamp })
            .map_err(|e| Error::MetabaseUnavailable(e.to_string()))?;
        let reply = self.call(METHOD_GROUP_WEIGHTS, body).await?;
        let by_size: HashMap<u32, WeightRows> = rmp_serde::from_slice(&reply)
            .map_err(|e| Error::MetabaseUnavailable(format!("bad weights reply: {e}")))?;

        let mut guard = self.snapshot.write().await;
        *guard = Some(Arc::new(Snapshot { by_size }));
        Ok(())
    }

    async fn current(&self) -> Result<Arc<Snapshot>> {
        if self.snapshot.read().await.is_none() {
            // Cold cache: one inline refresh before giving up.
            self.refresh().await?;
        }
        self.snapshot
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::MetabaseUnavailable("weight cache is empty".into()))
    }

    /// Weighted-random pick of a group set of the given size.
    pub async fn choose(&self, size: usize) -> Result<Vec<GroupId>> {
        let snapshot = self.current().await?;
        let rows = snapshot
            .by_size
            .get(&(size as u32))
            .filter(|rows| !rows.is_empty())
            .ok_or_else(|| {
                Error::MetabaseUnavailable(format!("no weighted group lists of size {size}"))
            })?;
        let dist = WeightedIndex::new(rows.iter().map(|(_, weight)| *weight))
            .map_err(|e| Error::MetabaseUnavailable(format!("bad weight table: {e}")))?;
        let pick = dist.sample(&mut rand::thread_rng());
        Ok(rows[pick].0.clone())
    }

    /// Every group the balancer currently advertises, across all sizes.
    pub async fn all_groups(&self) -> Result<Vec<GroupId>> {
        let snapshot = self.current().await?;
        let all: BTreeSet<GroupId> = snapshot
            .by_size
            .values()
            .flatten()
            .flat_map(|(groups, _)| groups.iter().copied())
            .collect();
        Ok(all.into_iter().collect())
    }

    pub async fn group_info(&self, group: GroupId) -> Result<GroupInfo> {
        let body = rmp_serde::to_vec(&group)
            .map_err(|e| Error::MetabaseUnavailable(e.to_string()))?;
        let reply = self.call(METHOD_GROUP_INFO, body).await?;
        let wire: GroupInfoWire = rmp_serde::from_slice(&reply)
            .map_err(|e| Error::MetabaseUnavailable(format!("bad group info reply: {e}")))?;
        Ok(wire.into())
    }

    pub async fn symmetric_groups(&self) -> Result<Vec<Vec<GroupId>>> {
        let reply = self.call(METHOD_SYMMETRIC_GROUPS, Vec::new()).await?;
        rmp_serde::from_slice(&reply)
            .map_err(|e| Error::MetabaseUnavailable(format!("bad symmetric groups reply: {e}")))
    }

    pub async fn bad_groups(&self) -> Result<Vec<Vec<GroupId>>> {
        let reply = self.call(METHOD_BAD_GROUPS, Vec::new()).await?;
        rmp_serde::from_slice(&reply)
            .map_err(|e| Error::MetabaseUnavailable(format!("bad bad-groups reply: {e}")))
    }
}

/// Periodic weight refresh. One per client; stopped by the shutdown
/// channel and joined in `Atoll::shutdown`.
pub struct RefreshWorker {
    balancer: Arc<Balancer>,
    period: Duration,
    shutdown: broadcast::Receiver<()>,
}

impl RefreshWorker {
    pub fn new(
        balancer: Arc<Balancer>,
        period: Duration,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            balancer,
            period,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.period);
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("group weight refresh worker shutting down");
                    return;
                }

                _ = interval.tick() => {
                    if let Err(e) = self.balancer.refresh().await {
                        tracing::warn!(error = %e, "group weight refresh failed");
                    }
                }
            }
        }
    }
}
