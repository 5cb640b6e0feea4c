//! Bulk read and bulk write engines.
//!
//! Both paths materialize every key's raw id up front and fan results
//! back through an id → key side table. A bulk write is all-or-nothing
//! at the batch level: one key missing its acceptance threshold rolls
//! back every key in the batch from the groups that took it.

use std::collections::HashMap;

use atoll_core::container::DataContainer;
use atoll_core::error::{Error, Result};
use atoll_core::key::{GroupId, Key, RawId};
use atoll_core::quorum::SuccessMode;

use crate::client::Inner;
use crate::lookup::{self, LookupResult};
use crate::session::IoDescriptor;

/// Optional bulk-write parameters.
#[derive(Debug, Clone, Default)]
pub struct BulkWriteOptions {
    pub cflags: u64,
    pub groups: Vec<GroupId>,
    pub success_mode: Option<SuccessMode>,
}

#[derive(Default)]
struct PerKey {
    lookups: Vec<LookupResult>,
    ok_groups: Vec<GroupId>,
}

impl Inner {
    pub(crate) async fn do_bulk_read(
        &self,
        keys: &[Key],
        cflags: u64,
        groups: &[GroupId],
    ) -> Result<HashMap<Key, DataContainer>> {
        self.ensure_states()?;
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        let lgroups = self.selector.select(groups, 0)?;

        let mut ios = Vec::with_capacity(keys.len());
        let mut by_id: HashMap<RawId, Key> = HashMap::with_capacity(keys.len());
        for key in keys {
            let id = self.materialize(key).await?;
            by_id.insert(id, key.clone());
            ios.push(IoDescriptor {
                id,
                offset: 0,
                size: 0,
            });
        }

        let params = self.params(lgroups, cflags, 0);
        let entries = self.session.bulk_read(params, ios).await?;

        // Keys absent from the reply are simply absent from the map.
        let mut out = HashMap::with_capacity(entries.len());
        for entry in entries {
            if let Some(key) = by_id.get(&entry.id) {
                out.insert(key.clone(), DataContainer::plain(entry.data));
            }
        }
        Ok(out)
    }

    pub(crate) async fn do_bulk_write(
        &self,
        keys: &[Key],
        data: &[DataContainer],
        opts: &BulkWriteOptions,
    ) -> Result<HashMap<Key, Vec<LookupResult>>> {
        if keys.len() != data.len() {
            return Err(Error::InvalidArgument(format!(
                "bulk write got {} keys and {} payloads",
                keys.len(),
                data.len()
            )));
        }
        self.ensure_states()?;
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let replicas = self.resolve_replication(&opts.groups);
        let mode = opts.success_mode.unwrap_or(self.config.success_mode);
        let lgroups = self.selector.select(&opts.groups, replicas)?;

        let mut items = Vec::with_capacity(keys.len());
        let mut by_id: HashMap<RawId, Key> = HashMap::with_capacity(keys.len());
        for (key, container) in keys.iter().zip(data) {
            let id = self.materialize(key).await?;
            by_id.insert(id, key.clone());
            items.push((id, container.pack()));
        }

        let params = self.params(lgroups, opts.cflags, 0);
        let replies = self.session.bulk_write(params, items).await?;

        // Partition per key; keys with no reply at all still count.
        let mut per_key: HashMap<RawId, PerKey> = by_id
            .keys()
            .map(|id| (*id, PerKey::default()))
            .collect();
        for reply in replies {
            let slot = per_key.entry(reply.id).or_default();
            match reply.result {
                Ok(raw) => {
                    slot.ok_groups.push(reply.group);
                    slot.lookups.push(lookup::derive(
                        raw,
                        self.config.base_port,
                        self.config.eblob_style_path,
                    ));
                }
                Err(e) => {
                    tracing::debug!(group = reply.group, error = %e, "bulk write entry failed");
                }
            }
        }

        let failed = per_key
            .values()
            .filter(|slot| !mode.accepted(replicas, slot.ok_groups.len()))
            .count();
        if failed > 0 {
            // One bad key poisons the batch: scrub everything we wrote.
            for (id, slot) in &per_key {
                if slot.ok_groups.is_empty() {
                    continue;
                }
                if let Some(key) = by_id.get(id) {
                    self.compensate(key, &slot.ok_groups, opts.cflags).await;
                }
            }
            return Err(Error::BulkWriteRejected {
                failed,
                total: keys.len(),
            });
        }

        let mut out = HashMap::with_capacity(per_key.len());
        for (id, slot) in per_key {
            if let Some(key) = by_id.remove(&id) {
                out.insert(key, slot.lookups);
            }
        }
        Ok(out)
    }

    /// The key's raw id, transforming name keys through the session.
    pub(crate) async fn materialize(&self, key: &Key) -> Result<RawId> {
        match key.raw() {
            Some(id) => Ok(*id),
            None => Ok(self.session.transform(key).await?),
        }
    }
}
