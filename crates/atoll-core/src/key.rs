//! Object keys — a raw 256-bit identifier or a symbolic name.
//!
//! A name key is resolved to its raw id by the storage session
//! (`Session::transform`); the client never hashes names itself.
//! Two keys are the same object when their raw ids match.

use std::fmt;
use std::hash::{Hash, Hasher};

/// One replica universe of the object store.
pub type GroupId = u32;

/// Raw identifier size in bytes.
pub const ID_SIZE: usize = 32;

/// Raw 256-bit object identifier.
pub type RawId = [u8; ID_SIZE];

#[derive(Debug, Clone)]
enum KeyForm {
    Id(RawId),
    Name(String),
}

/// An object key: raw id plus group affinity, or symbolic name.
/// Both forms carry a `kind` type tag understood by the backend.
#[derive(Debug, Clone)]
pub struct Key {
    form: KeyForm,
    kind: u32,
    group: GroupId,
}

impl Key {
    /// A key from a raw identifier with a group affinity.
    pub fn from_id(id: RawId, group: GroupId, kind: u32) -> Self {
        Self {
            form: KeyForm::Id(id),
            kind,
            group,
        }
    }

    /// A key from a symbolic name. The raw id is produced by the session.
    pub fn from_name(name: impl Into<String>, kind: u32) -> Self {
        Self {
            form: KeyForm::Name(name.into()),
            kind,
            group: 0,
        }
    }

    /// True when this key carries its raw id directly.
    pub fn by_id(&self) -> bool {
        matches!(self.form, KeyForm::Id(_))
    }

    pub fn raw(&self) -> Option<&RawId> {
        match &self.form {
            KeyForm::Id(id) => Some(id),
            KeyForm::Name(_) => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match &self.form {
            KeyForm::Id(_) => None,
            KeyForm::Name(name) => Some(name),
        }
    }

    pub fn kind(&self) -> u32 {
        self.kind
    }

    pub fn group(&self) -> GroupId {
        self.group
    }
}

/// Equality is on the raw id when both sides have one; name keys that
/// were never transformed compare by (name, kind).
impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        match (&self.form, &other.form) {
            (KeyForm::Id(a), KeyForm::Id(b)) => a == b,
            (KeyForm::Name(a), KeyForm::Name(b)) => a == b && self.kind == other.kind,
            _ => false,
        }
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.form {
            KeyForm::Id(id) => id.hash(state),
            KeyForm::Name(name) => {
                name.hash(state);
                self.kind.hash(state);
            }
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.form {
            KeyForm::Id(id) => write!(f, "{}", short_id_hex(id)),
            KeyForm::Name(name) => write!(f, "{}", name),
        }
    }
}

/// Debug rendering of a raw id: 40 hex characters (first 20 bytes).
pub fn short_id_hex(id: &RawId) -> String {
    hex::encode(&id[..20])
}
