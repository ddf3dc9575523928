//! Strongly-typed identifiers.

use std::fmt;

/// Stable identifier an allocator assigns to a chunk.
///
/// Handles survive process restarts for the same backing store. The value
/// `0` is reserved for "no entity" and is never issued by an allocator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityHandle(pub u64);

impl EntityHandle {
    /// The reserved null handle.
    pub const NULL: EntityHandle = EntityHandle(0);

    /// Whether this is the reserved null handle.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// The raw 64-bit value, as stored in a cell.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<u64> for EntityHandle {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

impl From<EntityHandle> for u64 {
    fn from(h: EntityHandle) -> Self {
        h.0
    }
}
