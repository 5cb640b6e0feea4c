//! Write acceptance policy — maps a success mode and replication count
//! to the number of group-level successes a write must collect.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Acceptance policy for a replicated write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessMode {
    /// One non-error reply is enough.
    Any,
    /// A majority of the targets: ⌊R/2⌋ + 1.
    Quorum,
    /// Every target must reply without error.
    All,
    /// A fixed count of successes, independent of R.
    AtLeast(u32),
}

impl Default for SuccessMode {
    fn default() -> Self {
        SuccessMode::Quorum
    }
}

impl SuccessMode {
    /// Successes required out of `replicas` targets.
    pub fn required(&self, replicas: usize) -> usize {
        match self {
            SuccessMode::Any => 1,
            SuccessMode::Quorum => replicas / 2 + 1,
            SuccessMode::All => replicas,
            SuccessMode::AtLeast(n) => *n as usize,
        }
    }

    /// Acceptance predicate for `succeeded` non-error replies.
    pub fn accepted(&self, replicas: usize, succeeded: usize) -> bool {
        match self {
            SuccessMode::All => succeeded == replicas,
            _ => succeeded >= self.required(replicas),
        }
    }
}

// Config files spell the mode as "any" / "quorum" / "all" or a bare
// integer ≥ 1.

#[derive(Deserialize)]
#[serde(untagged)]
enum ModeRepr {
    Count(u32),
    Text(String),
}

impl<'de> Deserialize<'de> for SuccessMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match ModeRepr::deserialize(deserializer)? {
            ModeRepr::Count(0) => Err(D::Error::custom("success_mode count must be ≥ 1")),
            ModeRepr::Count(n) => Ok(SuccessMode::AtLeast(n)),
            ModeRepr::Text(s) => match s.to_ascii_lowercase().as_str() {
                "any" => Ok(SuccessMode::Any),
                "quorum" => Ok(SuccessMode::Quorum),
                "all" => Ok(SuccessMode::All),
                other => Err(D::Error::custom(format!(
                    "unknown success_mode {other:?}, want any/quorum/all or a count"
                ))),
            },
        }
    }
}

impl Serialize for SuccessMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SuccessMode::Any => serializer.serialize_str("any"),
            SuccessMode::Quorum => serializer.serialize_str("quorum"),
            SuccessMode::All => serializer.serialize_str("all"),
            SuccessMode::AtLeast(n) => serializer.serialize_u32(*n),
        }
    }
}
