//! atoll-core — shared types for the atoll client: keys, container framing,
//! quorum policy, configuration, and the error taxonomy.
//! The client crate and every embedding layer depend on this one.

pub mod config;
pub mod container;
pub mod error;
pub mod key;
pub mod quorum;

pub use config::{AddrFamily, AtollConfig, BalancerConfig, BalancerUsage, Remote};
pub use container::{DataContainer, Timestamp};
pub use error::{Error, Result, SessionError};
pub use key::{GroupId, Key, RawId};
pub use quorum::SuccessMode;
