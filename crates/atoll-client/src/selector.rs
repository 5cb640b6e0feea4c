//! Group selector — produces the ordered candidate group list for an
//! operation.
//!
//! An explicit caller list is taken verbatim. The configured default
//! list keeps its head as an affinity anchor and shuffles the tail, so
//! load spreads across replicas without losing the preferred first hop.
//! The default list itself is immutable; the shuffle runs on a copy.

use rand::seq::SliceRandom;

use atoll_core::error::{Error, Result};
use atoll_core::key::GroupId;

#[derive(Debug, Clone)]
pub struct GroupSelector {
    defaults: Vec<GroupId>,
}

impl GroupSelector {
    pub fn new(defaults: Vec<GroupId>) -> Self {
        Self { defaults }
    }

    /// Candidate groups for one call. `count` of 0 means "all".
    pub fn select(&self, explicit: &[GroupId], count: usize) -> Result<Vec<GroupId>> {
        let mut picked = if !explicit.is_empty() {
            explicit.to_vec()
        } else {
            let mut groups = self.defaults.clone();
            if groups.len() >= 2 {
                groups[1..].shuffle(&mut rand::thread_rng());
            }
            groups
        };

        if count > 0 && count < picked.len() {
            picked.truncate(count);
        }
        if picked.is_empty() {
            return Err(Error::NoGroups);
        }
        Ok(picked)
    }
}
