//! Read, lookup, and range engines.
//!
//! Reads try the candidate groups one at a time and eliminate a group on
//! error; only an empty candidate set is a terminal `NotFound`. The
//! "latest" variant hands the whole candidate list to the transport,
//! which picks the replica with the newest embedded timestamp.

use bytes::Bytes;

use atoll_core::container::DataContainer;
use atoll_core::error::{Error, Result, SessionError};
use atoll_core::key::{GroupId, Key};

use crate::client::Inner;
use crate::lookup::{self, LookupResult};

/// Optional read parameters. `size` of 0 reads the whole body.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    pub offset: u64,
    pub size: u64,
    pub cflags: u64,
    pub ioflags: u32,
    pub groups: Vec<GroupId>,
    /// Pick the replica with the newest embedded timestamp.
    pub latest: bool,
    /// Parse the body's embedded frames.
    pub embedded: bool,
}

/// Optional range parameters. `limit_num` of 0 means "no limit".
#[derive(Debug, Clone, Default)]
pub struct RangeOptions {
    pub limit_start: u64,
    pub limit_num: u64,
    pub cflags: u64,
    pub ioflags: u32,
    pub groups: Vec<GroupId>,
    /// Names the range in error messages; defaults to the from-key.
    pub reference_key: Option<Key>,
}

fn with_key(key: &Key, err: Error) -> Error {
    match err {
        Error::Corrupt { reason } => Error::Corrupt {
            reason: format!("{key}: {reason}"),
        },
        other => other,
    }
}

impl Inner {
    pub(crate) async fn do_read(&self, key: &Key, opts: &ReadOptions) -> Result<DataContainer> {
        self.ensure_states()?;
        let lgroups = self.selector.select(&opts.groups, 0)?;

        let body = if opts.latest {
            let params = self.params(lgroups, opts.cflags, opts.ioflags);
            match self
                .session
                .read_latest(params, key, opts.offset, opts.size)
                .await
            {
                Ok(bytes) => bytes,
                Err(SessionError::NotFound) => {
                    return Err(Error::NotFound {
                        key: key.to_string(),
                    })
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            self.read_with_fallback(key, &lgroups, opts).await?
        };

        if opts.embedded {
            DataContainer::unpack(body).map_err(|e| with_key(key, e))
        } else {
            Ok(DataContainer::plain(body))
        }
    }

    async fn read_with_fallback(
        &self,
        key: &Key,
        lgroups: &[GroupId],
        opts: &ReadOptions,
    ) -> Result<Bytes> {
        for group in lgroups {
            let params = self.params(vec![*group], opts.cflags, opts.ioflags);
            match self.session.read(params, key, opts.offset, opts.size).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) => {
                    tracing::debug!(key = %key, group, error = %e, "read failed, trying next group");
                }
            }
        }
        Err(Error::NotFound {
            key: key.to_string(),
        })
    }

    /// Group-elimination lookup: the first non-error entry wins; every
    /// error entry drops its group from the candidate set.
    pub(crate) async fn do_lookup(&self, key: &Key, groups: &[GroupId]) -> Result<LookupResult> {
        self.ensure_states()?;
        let mut lgroups = self.selector.select(groups, 0)?;

        while !lgroups.is_empty() {
            let params = self.params(lgroups.clone(), 0, 0);
            let outcomes = self.session.lookup(params, key).await?;

            let mut failed = Vec::new();
            for outcome in outcomes {
                match outcome.result {
                    Ok(raw) => {
                        return Ok(lookup::derive(
                            raw,
                            self.config.base_port,
                            self.config.eblob_style_path,
                        ))
                    }
                    Err(e) => {
                        tracing::debug!(
                            key = %key,
                            group = outcome.group,
                            error = %e,
                            "lookup failed, dropping group"
                        );
                        failed.push(outcome.group);
                    }
                }
            }

            if failed.is_empty() {
                // Empty reply: nothing succeeded, nothing to eliminate.
                break;
            }
            lgroups.retain(|g| !failed.contains(g));
        }

        Err(Error::NotFound {
            key: key.to_string(),
        })
    }

    pub(crate) async fn do_range(
        &self,
        from: &Key,
        to: &Key,
        opts: &RangeOptions,
    ) -> Result<Vec<Bytes>> {
        self.ensure_states()?;
        let lgroups = self.selector.select(&opts.groups, 0)?;

        for group in &lgroups {
            let params = self.params(vec![*group], opts.cflags, opts.ioflags);
            match self
                .session
                .read_range(params, from, to, opts.limit_start, opts.limit_num)
                .await
            {
                Ok(rows) => return Ok(rows),
                Err(e) => {
                    tracing::debug!(group, error = %e, "range read failed, trying next group");
                }
            }
        }

        let name = opts
            .reference_key
            .as_ref()
            .unwrap_or(from)
            .to_string();
        Err(Error::NotFound { key: name })
    }
}
