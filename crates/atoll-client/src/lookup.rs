//! Lookup results — where a replica lives, as the caller sees it.
//!
//! The transport replies with a backend-specific location; this module
//! turns it into `host:port/path`. The port is synthesized from the
//! configured base port and the group id's low bits. When the backend
//! packs objects into blob files and eblob-style paths are enabled, the
//! path names the blob plus offset and size, and the triple is surfaced
//! separately as well.

use std::fmt;

use atoll_core::config::AddrFamily;
use atoll_core::key::GroupId;

use crate::session::RawLookup;

/// Location of a replica inside a packed blob file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EblobRef {
    pub file: String,
    pub offset: u64,
    pub size: u64,
}

/// One successful write or lookup reply in one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupResult {
    pub group: GroupId,
    pub host: String,
    pub port: u16,
    pub family: AddrFamily,
    pub path: String,
    pub blob: Option<EblobRef>,
}

impl fmt::Display for LookupResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.host, self.port, self.path)
    }
}

/// `base_port` plus the group id's low bits, kept inside u16 range.
pub(crate) fn synth_port(base_port: u16, group: GroupId) -> u16 {
    base_port.wrapping_add((group & 0x3ff) as u16)
}

pub(crate) fn derive(raw: RawLookup, base_port: u16, eblob_style: bool) -> LookupResult {
    let port = synth_port(base_port, raw.group);
    let blob = raw.blob.map(|b| EblobRef {
        file: b.file,
        offset: b.offset,
        size: b.size,
    });
    let path = match (&blob, eblob_style) {
        (Some(b), true) => format!("{}:{}:{}", b.file, b.offset, b.size),
        _ => raw.fs_path,
    };
    LookupResult {
        group: raw.group,
        host: raw.host,
        port,
        family: raw.family,
        path,
        blob,
    }
}
