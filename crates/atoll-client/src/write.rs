//! Replicated write engine.
//!
//! A write fans out to the candidate groups and only returns once the
//! acceptance predicate holds for the groups that took it. Bodies larger
//! than the configured chunk size stream as prepare / plain… / commit;
//! each chunk is issued only to the groups that survived the previous
//! one. A rejected write is rolled back from every original target; an
//! accepted write still scrubs the groups that fell out along the way so
//! no half-written replica lingers.

use bytes::Bytes;

use atoll_core::container::Timestamp;
use atoll_core::error::{Error, Result};
use atoll_core::key::{GroupId, Key};
use atoll_core::quorum::SuccessMode;

use crate::client::Inner;
use crate::lookup::{self, LookupResult};
use crate::session::{ioflags, ok_groups, GroupOutcome};

/// Optional write parameters. `Default` gives a plain full-body write to
/// the configured groups under the configured success mode.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    pub offset: u64,
    /// Use only the first `size` payload bytes. 0 = whole payload.
    pub size: u64,
    pub cflags: u64,
    pub ioflags: u32,
    pub groups: Vec<GroupId>,
    pub success_mode: Option<SuccessMode>,
}

fn clip(data: Bytes, size: u64) -> Bytes {
    if size > 0 && (size as usize) < data.len() {
        data.slice(..size as usize)
    } else {
        data
    }
}

impl Inner {
    pub(crate) async fn do_write(
        &self,
        key: &Key,
        data: Bytes,
        opts: &WriteOptions,
    ) -> Result<Vec<LookupResult>> {
        self.ensure_states()?;

        let data = clip(data, opts.size);
        let replicas = self.resolve_replication(&opts.groups);
        let mode = opts.success_mode.unwrap_or(self.config.success_mode);
        let lgroups = self.write_groups(&opts.groups, replicas).await?;

        let staged =
            opts.ioflags & (ioflags::PREPARE | ioflags::COMMIT | ioflags::PLAIN_WRITE) != 0;
        let chunked = !staged
            && self.config.chunk_size > 0
            && data.len() as u64 > self.config.chunk_size
            && !key.by_id();

        let outcome = if staged {
            self.staged_write(key, data, opts, &lgroups).await
        } else if chunked {
            self.chunked_write(key, data, opts, &lgroups, mode, replicas)
                .await
        } else {
            self.oneshot_write(key, data, opts, &lgroups).await
        };

        let replies = match outcome {
            Ok(replies) => replies,
            Err(err) => {
                self.compensate(key, &lgroups, opts.cflags).await;
                return Err(err);
            }
        };

        let survivors = ok_groups(&replies);
        if !mode.accepted(replicas, survivors.len()) {
            self.compensate(key, &lgroups, opts.cflags).await;
            return Err(Error::WriteRejected {
                key: key.to_string(),
                acked: survivors.len(),
                need: mode.required(replicas),
                targets: lgroups.len(),
            });
        }

        // Groups that dropped out along the way hold an incomplete copy.
        let incomplete: Vec<GroupId> = lgroups
            .iter()
            .copied()
            .filter(|g| !survivors.contains(g))
            .collect();
        if !incomplete.is_empty() {
            tracing::warn!(
                key = %key,
                groups = ?incomplete,
                "scrubbing groups that missed part of the upload"
            );
            self.compensate(key, &incomplete, opts.cflags).await;
        }

        // Metadata finalize against the surviving set, cflags cleared and
        // a zero timestamp. Only a completed body upload is finalized: a
        // caller-driven PREPARE or PLAIN_WRITE stage leaves the object
        // open. A finalize failure fails the write but the body stays
        // durable — it is not rolled back.
        let completed = !staged || opts.ioflags & ioflags::COMMIT != 0;
        if completed {
            let meta_params = self.params(survivors, 0, opts.ioflags);
            self.session
                .write_metadata(meta_params, key, Timestamp::zero())
                .await?;
        }

        Ok(self.derive_lookups(replies))
    }

    async fn oneshot_write(
        &self,
        key: &Key,
        data: Bytes,
        opts: &WriteOptions,
        lgroups: &[GroupId],
    ) -> Result<Vec<GroupOutcome>> {
        let params = self.params(lgroups.to_vec(), opts.cflags, opts.ioflags);
        Ok(self
            .session
            .write_data(params, key, data, opts.offset)
            .await?)
    }

    /// A caller-driven PREPARE / PLAIN_WRITE / COMMIT stage. One
    /// low-level call of that flavor, never chunked.
    async fn staged_write(
        &self,
        key: &Key,
        data: Bytes,
        opts: &WriteOptions,
        lgroups: &[GroupId],
    ) -> Result<Vec<GroupOutcome>> {
        let params = self.params(lgroups.to_vec(), opts.cflags, opts.ioflags);
        let extent = opts.offset + data.len() as u64;
        let replies = if opts.ioflags & ioflags::PREPARE != 0 {
            self.session
                .write_prepare(params, key, data, opts.offset, extent)
                .await?
        } else if opts.ioflags & ioflags::COMMIT != 0 {
            self.session
                .write_commit(params, key, data, opts.offset, extent)
                .await?
        } else {
            self.session
                .write_plain(params, key, data, opts.offset)
                .await?
        };
        Ok(replies)
    }

    /// Streamed upload: prepare with the first chunk, plain-write the
    /// middle, commit the last. Only groups that survived the previous
    /// chunk see the next one; the upload is abandoned as soon as the
    /// surviving set can no longer satisfy acceptance.
    ///
    /// A chunked upload replaces the whole object: the prepare goes out
    /// at offset 0 and every chunk is addressed from there. The caller's
    /// offset only shifts one-shot and staged writes.
    async fn chunked_write(
        &self,
        key: &Key,
        data: Bytes,
        opts: &WriteOptions,
        lgroups: &[GroupId],
        mode: SuccessMode,
        replicas: usize,
    ) -> Result<Vec<GroupOutcome>> {
        let chunk = self.config.chunk_size;
        let total = data.len() as u64;
        let rejected = |acked: usize| Error::WriteRejected {
            key: key.to_string(),
            acked,
            need: mode.required(replicas),
            targets: lgroups.len(),
        };

        let first_len = chunk.min(total) as usize;
        let params = self.params(lgroups.to_vec(), opts.cflags, opts.ioflags);
        let mut replies = self
            .session
            .write_prepare(params, key, data.slice(..first_len), 0, total)
            .await?;
        let mut survivors = ok_groups(&replies);
        if !mode.accepted(replicas, survivors.len()) {
            return Err(rejected(survivors.len()));
        }

        let mut sent = first_len as u64;
        while sent < total {
            let len = chunk.min(total - sent) as usize;
            let body = data.slice(sent as usize..sent as usize + len);
            let last = sent + len as u64 == total;

            let params = self.params(survivors.clone(), opts.cflags, opts.ioflags);
            replies = if last {
                self.session
                    .write_commit(params, key, body, sent, total)
                    .await?
            } else {
                self.session.write_plain(params, key, body, sent).await?
            };

            survivors = ok_groups(&replies);
            if !mode.accepted(replicas, survivors.len()) {
                tracing::warn!(
                    key = %key,
                    acked = survivors.len(),
                    sent,
                    total,
                    "abandoning chunked upload, surviving set below acceptance"
                );
                return Err(rejected(survivors.len()));
            }
            sent += len as u64;
        }

        // The commit replies are the authoritative result.
        Ok(replies)
    }

    /// Best-effort removal; failures are logged and swallowed.
    pub(crate) async fn compensate(&self, key: &Key, groups: &[GroupId], cflags: u64) {
        if groups.is_empty() {
            return;
        }
        let params = self.params(groups.to_vec(), cflags, 0);
        if let Err(e) = self.session.remove(params, key).await {
            tracing::warn!(key = %key, groups = ?groups, error = %e, "post-write cleanup failed");
        }
    }

    pub(crate) fn derive_lookups(&self, replies: Vec<GroupOutcome>) -> Vec<LookupResult> {
        replies
            .into_iter()
            .filter_map(|o| o.result.ok())
            .map(|raw| lookup::derive(raw, self.config.base_port, self.config.eblob_style_path))
            .collect()
    }
}
