//! Allocator-issued memory chunk holders.

use std::fmt;

use crate::id::EntityHandle;

/// A contiguous region of allocator-managed memory.
///
/// `MemChunk` is a plain holder: it records where the chunk lives in this
/// process and the handle it is known by across processes. It owns nothing;
/// releasing the memory is always an explicit allocator call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub struct MemChunk {
    base: u64,
    size: u64,
    handle: EntityHandle,
}

impl MemChunk {
    /// Describe a chunk. Only allocators construct these.
    pub fn new(base: u64, size: u64, handle: EntityHandle) -> Self {
        Self { base, size, handle }
    }

    /// Absolute address of the first byte in this process.
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Size of the chunk in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The stable handle this chunk was issued under.
    pub fn handle(&self) -> EntityHandle {
        self.handle
    }

    /// Address of the byte at `offset`, or `None` past the end.
    pub fn addr_at(&self, offset: u64) -> Option<u64> {
        if offset >= self.size {
            return None;
        }
        self.base.checked_add(offset)
    }
}

impl fmt::Display for MemChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MemChunk(handle={}, base={:#x}, size={})",
            self.handle, self.base, self.size
        )
    }
}
