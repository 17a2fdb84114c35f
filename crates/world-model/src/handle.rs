//! Generation-tagged reference identity.
//!
//! The host recycles transient object identities rapidly, so a bare id is
//! never safe to remember across cycles. A [`RefHandle`] pairs the id with
//! a generation counter: a handle whose generation no longer matches the
//! live reference is treated as "gone". Handles are only ever compared,
//! never dereferenced.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric identity of a placed world reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RefId(pub u32);

impl RefId {
    /// The null identity, carried by malformed references.
    pub const NULL: RefId = RefId(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for RefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ref_{:08x}", self.0)
    }
}

/// Generation counter for a recycled identity slot.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Generation(pub u32);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0.wrapping_add(1))
    }
}

/// Whether an identity is stable for the whole session or recycled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    /// Fixed at world build time; safe to remember until reload.
    Stable,
    /// Spawned at runtime; the id slot is reused once the object despawns.
    Transient,
}

/// A generation-tagged handle to a placed world reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RefHandle {
    pub id: RefId,
    pub generation: Generation,
    pub kind: IdentityKind,
}

impl RefHandle {
    pub fn stable(id: u32) -> Self {
        Self {
            id: RefId(id),
            generation: Generation(0),
            kind: IdentityKind::Stable,
        }
    }

    pub fn transient(id: u32, generation: u32) -> Self {
        Self {
            id: RefId(id),
            generation: Generation(generation),
            kind: IdentityKind::Transient,
        }
    }

    pub fn is_stable(self) -> bool {
        self.kind == IdentityKind::Stable
    }

    /// True when `other` is the same live object this handle was taken from.
    ///
    /// Stable identities match on id alone; transient identities must also
    /// match on generation, otherwise the slot has been recycled.
    pub fn is_same_object(self, other: RefHandle) -> bool {
        if self.id != other.id {
            return false;
        }
        match self.kind {
            IdentityKind::Stable => true,
            IdentityKind::Transient => self.generation == other.generation,
        }
    }
}

impl fmt::Display for RefHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            IdentityKind::Stable => write!(f, "{}", self.id),
            IdentityKind::Transient => write!(f, "{}@g{}", self.id, self.generation.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_match_ignores_generation() {
        let a = RefHandle::stable(0x1234);
        let mut b = a;
        b.generation = Generation(7);
        assert!(a.is_same_object(b));
    }

    #[test]
    fn test_transient_match_requires_generation() {
        let a = RefHandle::transient(0xff001234, 1);
        let recycled = RefHandle::transient(0xff001234, 2);
        assert!(!a.is_same_object(recycled));
        assert!(a.is_same_object(RefHandle::transient(0xff001234, 1)));
    }

    #[test]
    fn test_null_id() {
        assert!(RefId::NULL.is_null());
        assert!(!RefId(1).is_null());
    }

    #[test]
    fn test_display() {
        assert_eq!(RefHandle::stable(0xab).to_string(), "ref_000000ab");
        assert_eq!(
            RefHandle::transient(0xab, 3).to_string(),
            "ref_000000ab@g3"
        );
    }
}
