//! Direct access to chunk memory.
//!
//! This is the only module in the crate that may contain `unsafe` code.
//! Every access first asks the owning allocator whether the chunk is still
//! live; the [`RestorableAllocator`] safety contract then guarantees the
//! memory behind a live chunk is valid, aligned and spans its size. A chunk
//! released behind an entity's back (by `close`, or by destroying another
//! wrapper over the same handle) is never touched again.

#![allow(unsafe_code)]

use std::ptr;

use durable_core::{MemChunk, RestorableAllocator};

/// Width of one cell in bytes.
pub(crate) const CELL_BYTES: u64 = 8;

/// One aligned 8-byte cell inside a chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct CellPtr {
    chunk: MemChunk,
    addr: u64,
}

impl CellPtr {
    /// The cell at `index` of `chunk`.
    ///
    /// Returns `None` if the cell would extend past the chunk or its
    /// address is not 8-byte aligned.
    pub(crate) fn of(chunk: &MemChunk, index: u64) -> Option<Self> {
        let offset = index.checked_mul(CELL_BYTES)?;
        let end = offset.checked_add(CELL_BYTES)?;
        if end > chunk.size() {
            return None;
        }
        let addr = chunk.base().checked_add(offset)?;
        if addr % CELL_BYTES != 0 {
            return None;
        }
        Some(Self {
            chunk: *chunk,
            addr,
        })
    }

    /// Absolute address of the cell.
    pub(crate) fn addr(self) -> u64 {
        self.addr
    }

    /// Load the cell's 8 bytes, or `None` if the chunk was released.
    pub(crate) fn load<A: RestorableAllocator>(self, allocator: &A) -> Option<u64> {
        if !allocator.is_live(&self.chunk) {
            return None;
        }
        // SAFETY: the chunk is live, and `of` checked bounds and alignment
        // against it.
        Some(unsafe { ptr::read(self.addr as *const u64) })
    }

    /// Overwrite the cell's 8 bytes. Returns `false` if the chunk was
    /// released, in which case nothing is written.
    pub(crate) fn store<A: RestorableAllocator>(self, allocator: &A, value: u64) -> bool {
        if !allocator.is_live(&self.chunk) {
            return false;
        }
        // SAFETY: as for `load`; entities are single-threaded so no other
        // reference into the cell is active during the write.
        unsafe { ptr::write(self.addr as *mut u64, value) };
        true
    }
}

/// Fill the whole chunk with zero bytes. Returns `false` if the chunk was
/// released.
pub(crate) fn zero<A: RestorableAllocator>(allocator: &A, chunk: &MemChunk) -> bool {
    if !allocator.is_live(chunk) {
        return false;
    }
    let Ok(len) = usize::try_from(chunk.size()) else {
        return false;
    };
    if len > 0 {
        // SAFETY: the chunk is live and spans `len` bytes from its base.
        unsafe { ptr::write_bytes(chunk.base() as *mut u8, 0, len) }
    }
    true
}

/// Copy the chunk's bytes out, or `None` if the chunk was released.
pub(crate) fn read_bytes<A: RestorableAllocator>(
    allocator: &A,
    chunk: &MemChunk,
) -> Option<Vec<u8>> {
    if !allocator.is_live(chunk) {
        return None;
    }
    let len = usize::try_from(chunk.size()).ok()?;
    let mut out = vec![0u8; len];
    if len > 0 {
        // SAFETY: the chunk is live and spans `len` bytes; `out` is a
        // separate allocation of the same length.
        unsafe { ptr::copy_nonoverlapping(chunk.base() as *const u8, out.as_mut_ptr(), len) }
    }
    Some(out)
}

/// Copy `bytes` to the start of the chunk, truncated to the chunk size.
///
/// Returns the number of bytes written, or `None` if the chunk was released.
pub(crate) fn write_bytes<A: RestorableAllocator>(
    allocator: &A,
    chunk: &MemChunk,
    bytes: &[u8],
) -> Option<usize> {
    if !allocator.is_live(chunk) {
        return None;
    }
    let capacity = usize::try_from(chunk.size()).unwrap_or(usize::MAX);
    let len = bytes.len().min(capacity);
    if len > 0 {
        // SAFETY: the chunk is live and spans at least `len` bytes; `bytes`
        // is a borrowed slice that cannot alias allocator memory we own.
        unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), chunk.base() as *mut u8, len) }
    }
    Some(len)
}
