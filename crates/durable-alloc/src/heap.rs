//! The in-process restorable heap.
//!
//! [`HeapAllocator`] is a clonable handle onto a shared [`HeapState`]. Every
//! durable entity keeps a clone, so the heap lives as long as its longest
//! lived entity. The heap is single-threaded, like the entities on it.

use std::cell::RefCell;
use std::rc::Rc;

use durable_core::{EntityHandle, MemChunk, RestorableAllocator};
use indexmap::IndexMap;

use crate::config::AllocatorConfig;
use crate::handle;

/// One live chunk.
///
/// Storage is a boxed word slice: 8-byte aligned, zero-filled, and never
/// moved while the entry lives, even when the map around it reallocates.
pub(crate) struct ChunkEntry {
    /// Requested size in bytes.
    pub(crate) size: u64,
    /// Backing words; `size` rounded up to a multiple of 8 bytes.
    pub(crate) words: Box<[u64]>,
    /// Release on [`HeapAllocator::close`].
    pub(crate) auto_reclaim: bool,
}

impl ChunkEntry {
    /// A zero-filled chunk of `size` bytes, or `None` if it cannot be addressed.
    pub(crate) fn zeroed(size: u64) -> Option<Self> {
        let words = usize::try_from(size.div_ceil(8)).ok()?;
        Some(Self {
            size,
            words: vec![0u64; words].into_boxed_slice(),
            auto_reclaim: false,
        })
    }

    /// Address of the first word. Taken through a mutable borrow so that
    /// entities may write through it.
    pub(crate) fn base(&mut self) -> u64 {
        self.words.as_mut_ptr() as u64
    }

    pub(crate) fn reserved_bytes(&self) -> u64 {
        self.words.len() as u64 * 8
    }

    fn describe(&mut self, handle: EntityHandle) -> MemChunk {
        MemChunk::new(self.base(), self.size, handle)
    }
}

/// Bookkeeping behind a [`HeapAllocator`].
pub(crate) struct HeapState {
    pub(crate) config: AllocatorConfig,
    /// Live chunks by handle. Insertion order is kept so images are
    /// deterministic.
    pub(crate) chunks: IndexMap<EntityHandle, ChunkEntry>,
    /// Current generation of every handle slot ever issued.
    pub(crate) generations: Vec<u32>,
    /// Slots whose chunk was destroyed, available for reuse.
    pub(crate) free_list: Vec<u32>,
    /// Sum of reserved bytes over live chunks.
    pub(crate) used_bytes: u64,
}

impl HeapState {
    pub(crate) fn new(config: AllocatorConfig) -> Self {
        Self {
            config,
            chunks: IndexMap::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            used_bytes: 0,
        }
    }

    /// Take a handle slot, reusing a freed one first.
    fn mint_handle(&mut self) -> Option<EntityHandle> {
        if let Some(slot) = self.free_list.pop() {
            return Some(handle::encode(slot, self.generations[slot as usize]));
        }
        let slot = u32::try_from(self.generations.len()).ok()?;
        // slot + 1 must still fit in the low half of the handle.
        if slot == u32::MAX {
            return None;
        }
        self.generations.push(0);
        Some(handle::encode(slot, 0))
    }

    fn allocate(&mut self, bytes: u64, auto_reclaim: bool) -> Option<MemChunk> {
        let reserved = AllocatorConfig::reserved_bytes(bytes)?;
        let after = self.used_bytes.checked_add(reserved)?;
        if after > self.config.capacity_bytes {
            tracing::trace!(
                bytes,
                used = self.used_bytes,
                capacity = self.config.capacity_bytes,
                "chunk allocation exceeds capacity"
            );
            return None;
        }
        let mut entry = ChunkEntry::zeroed(bytes)?;
        entry.auto_reclaim = auto_reclaim;
        let handle = self.mint_handle()?;
        let chunk = entry.describe(handle);
        self.used_bytes = after;
        self.chunks.insert(handle, entry);
        tracing::trace!(%handle, bytes, auto_reclaim, "allocated chunk");
        Some(chunk)
    }

    fn retrieve(&mut self, handle: EntityHandle, auto_reclaim: bool) -> Option<MemChunk> {
        let entry = self.chunks.get_mut(&handle)?;
        entry.auto_reclaim = auto_reclaim;
        Some(entry.describe(handle))
    }

    pub(crate) fn destroy(&mut self, handle: EntityHandle) -> bool {
        let Some(entry) = self.chunks.shift_remove(&handle) else {
            tracing::trace!(%handle, "destroy of unknown chunk ignored");
            return false;
        };
        self.used_bytes -= entry.reserved_bytes();
        if let Some((slot, generation)) = handle::decode(handle) {
            if let Some(current) = self.generations.get_mut(slot as usize) {
                *current = generation.wrapping_add(1);
                self.free_list.push(slot);
            }
        }
        tracing::trace!(%handle, bytes = entry.size, "destroyed chunk");
        true
    }

    /// Whether `chunk` still matches the live entry for its handle.
    fn is_live(&self, chunk: &MemChunk) -> bool {
        self.chunks.get(&chunk.handle()).is_some_and(|entry| {
            entry.words.as_ptr() as u64 == chunk.base() && entry.size == chunk.size()
        })
    }

    fn set_auto_reclaim(&mut self, handle: EntityHandle, on: bool) {
        if let Some(entry) = self.chunks.get_mut(&handle) {
            entry.auto_reclaim = on;
        }
    }
}

/// A restorable allocator over process memory.
///
/// Cloning is cheap and every clone names the same heap. Handles are
/// generational: once a chunk is destroyed its handle never resolves again.
///
/// # Examples
///
/// ```
/// use durable_alloc::HeapAllocator;
/// use durable_core::RestorableAllocator;
///
/// let heap = HeapAllocator::default();
/// let chunk = heap.allocate_chunk(32, false).unwrap();
/// let handle = heap.chunk_handle(&chunk);
///
/// let again = heap.retrieve_chunk(handle, false).unwrap();
/// assert_eq!(again.base(), chunk.base());
/// assert_eq!(again.size(), 32);
///
/// heap.destroy_chunk(again);
/// assert!(heap.retrieve_chunk(handle, false).is_none());
/// ```
#[derive(Clone)]
pub struct HeapAllocator {
    pub(crate) inner: Rc<RefCell<HeapState>>,
}

impl HeapAllocator {
    /// Create an empty heap.
    pub fn new(config: AllocatorConfig) -> Self {
        Self::from_state(HeapState::new(config))
    }

    pub(crate) fn from_state(state: HeapState) -> Self {
        Self {
            inner: Rc::new(RefCell::new(state)),
        }
    }

    /// The configuration this heap was built with.
    pub fn config(&self) -> AllocatorConfig {
        self.inner.borrow().config.clone()
    }

    /// Number of live chunks.
    pub fn live_chunks(&self) -> usize {
        self.inner.borrow().chunks.len()
    }

    /// Bytes reserved by live chunks.
    pub fn used_bytes(&self) -> u64 {
        self.inner.borrow().used_bytes
    }

    /// Bytes still available for allocation.
    pub fn remaining_bytes(&self) -> u64 {
        let state = self.inner.borrow();
        state.config.capacity_bytes.saturating_sub(state.used_bytes)
    }

    /// Whether `handle` names a live chunk.
    pub fn contains(&self, handle: EntityHandle) -> bool {
        self.inner.borrow().chunks.contains_key(&handle)
    }

    /// The auto-reclaim flag of a live chunk.
    pub fn is_auto_reclaim(&self, handle: EntityHandle) -> Option<bool> {
        self.inner
            .borrow()
            .chunks
            .get(&handle)
            .map(|entry| entry.auto_reclaim)
    }

    /// A copy of a live chunk's bytes, in memory order.
    pub fn read_bytes(&self, handle: EntityHandle) -> Option<Vec<u8>> {
        let state = self.inner.borrow();
        let entry = state.chunks.get(&handle)?;
        let mut bytes: Vec<u8> = entry.words.iter().flat_map(|w| w.to_ne_bytes()).collect();
        bytes.truncate(entry.size as usize);
        Some(bytes)
    }

    /// Release every chunk still registered for auto-reclaim.
    ///
    /// This is what process exit does to a heap: owners that never got to
    /// cancel their reclaim policy lose their chunks, everything else
    /// survives into the next [`save`](Self::save). Returns the number of
    /// chunks released.
    pub fn close(&self) -> usize {
        let mut state = self.inner.borrow_mut();
        let doomed: Vec<EntityHandle> = state
            .chunks
            .iter()
            .filter(|(_, entry)| entry.auto_reclaim)
            .map(|(&handle, _)| handle)
            .collect();
        for &handle in &doomed {
            state.destroy(handle);
        }
        tracing::debug!(
            released = doomed.len(),
            surviving = state.chunks.len(),
            "closed heap"
        );
        doomed.len()
    }
}

impl Default for HeapAllocator {
    fn default() -> Self {
        Self::new(AllocatorConfig::default())
    }
}

// SAFETY: chunk words are `u64`s in a boxed slice, so the base is 8-byte
// aligned and spans `size` bytes; `ChunkEntry::zeroed` fills them with zero.
// The box is only freed by `HeapState::destroy`, which removes the entry
// first, and handles are generational, so `is_live` turns false for every
// copy of a destroyed chunk and destroy or reclaim calls on it are ignored.
#[allow(unsafe_code)]
unsafe impl RestorableAllocator for HeapAllocator {
    fn allocate_chunk(&self, bytes: u64, auto_reclaim: bool) -> Option<MemChunk> {
        self.inner.borrow_mut().allocate(bytes, auto_reclaim)
    }

    fn retrieve_chunk(&self, handle: EntityHandle, auto_reclaim: bool) -> Option<MemChunk> {
        self.inner.borrow_mut().retrieve(handle, auto_reclaim)
    }

    fn chunk_handle(&self, chunk: &MemChunk) -> EntityHandle {
        chunk.handle()
    }

    fn is_live(&self, chunk: &MemChunk) -> bool {
        self.inner.borrow().is_live(chunk)
    }

    fn destroy_chunk(&self, chunk: MemChunk) {
        self.inner.borrow_mut().destroy(chunk.handle());
    }

    fn register_auto_reclaim(&self, chunk: &MemChunk) {
        self.inner
            .borrow_mut()
            .set_auto_reclaim(chunk.handle(), true);
    }

    fn cancel_auto_reclaim(&self, chunk: &MemChunk) {
        self.inner
            .borrow_mut()
            .set_auto_reclaim(chunk.handle(), false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_heap() -> HeapAllocator {
        HeapAllocator::new(AllocatorConfig::new(256))
    }

    #[test]
    fn allocations_are_zeroed_and_aligned() {
        let heap = small_heap();
        let chunk = heap.allocate_chunk(24, false).unwrap();
        assert_eq!(chunk.base() % 8, 0);
        assert_eq!(heap.read_bytes(chunk.handle()).unwrap(), vec![0u8; 24]);
    }

    #[test]
    fn handles_are_nonzero_and_distinct() {
        let heap = small_heap();
        let a = heap.allocate_chunk(8, false).unwrap();
        let b = heap.allocate_chunk(8, false).unwrap();
        assert!(!a.handle().is_null());
        assert_ne!(a.handle(), b.handle());
        assert_eq!(heap.live_chunks(), 2);
    }

    #[test]
    fn zero_byte_chunk_has_a_handle() {
        let heap = small_heap();
        let chunk = heap.allocate_chunk(0, false).unwrap();
        assert!(!chunk.handle().is_null());
        assert_eq!(chunk.size(), 0);
        assert_eq!(heap.used_bytes(), 0);
        assert!(heap.retrieve_chunk(chunk.handle(), false).is_some());
    }

    #[test]
    fn capacity_exhaustion_returns_none() {
        let heap = small_heap();
        assert!(heap.allocate_chunk(200, false).is_some());
        assert!(heap.allocate_chunk(64, false).is_none());
        assert!(heap.allocate_chunk(56, false).is_some());
        assert_eq!(heap.remaining_bytes(), 0);
    }

    #[test]
    fn oversized_request_returns_none_not_panic() {
        let heap = small_heap();
        assert!(heap.allocate_chunk(u64::MAX, false).is_none());
        assert_eq!(heap.live_chunks(), 0);
    }

    #[test]
    fn destroyed_handle_is_stale_after_slot_reuse() {
        let heap = small_heap();
        let first = heap.allocate_chunk(8, false).unwrap();
        let stale = first.handle();
        heap.destroy_chunk(first);
        let second = heap.allocate_chunk(8, false).unwrap();
        assert_ne!(second.handle(), stale);
        assert!(heap.retrieve_chunk(stale, false).is_none());
        assert!(heap.retrieve_chunk(second.handle(), false).is_some());
    }

    #[test]
    fn destroy_returns_capacity() {
        let heap = small_heap();
        let chunk = heap.allocate_chunk(100, false).unwrap();
        assert_eq!(heap.used_bytes(), 104);
        heap.destroy_chunk(chunk);
        assert_eq!(heap.used_bytes(), 0);
        assert_eq!(heap.live_chunks(), 0);
    }

    #[test]
    fn double_destroy_is_ignored() {
        let heap = small_heap();
        let chunk = heap.allocate_chunk(8, false).unwrap();
        heap.destroy_chunk(chunk);
        heap.destroy_chunk(chunk);
        assert_eq!(heap.used_bytes(), 0);
    }

    #[test]
    fn retrieve_sets_reclaim_flag() {
        let heap = small_heap();
        let chunk = heap.allocate_chunk(8, false).unwrap();
        assert_eq!(heap.is_auto_reclaim(chunk.handle()), Some(false));
        heap.retrieve_chunk(chunk.handle(), true).unwrap();
        assert_eq!(heap.is_auto_reclaim(chunk.handle()), Some(true));
    }

    #[test]
    fn close_releases_only_registered_chunks() {
        let heap = small_heap();
        let kept = heap.allocate_chunk(8, true).unwrap();
        let reclaimed = heap.allocate_chunk(8, false).unwrap();
        heap.cancel_auto_reclaim(&kept);
        heap.register_auto_reclaim(&reclaimed);

        assert_eq!(heap.close(), 1);
        assert!(heap.contains(kept.handle()));
        assert!(!heap.contains(reclaimed.handle()));
    }

    #[test]
    fn chunk_stops_being_live_once_released() {
        let heap = small_heap();
        let chunk = heap.allocate_chunk(16, true).unwrap();
        let copy = heap.retrieve_chunk(chunk.handle(), true).unwrap();
        assert!(heap.is_live(&chunk));
        assert!(heap.is_live(&copy));

        heap.close();
        let reused = heap.allocate_chunk(16, false).unwrap();
        assert!(!heap.is_live(&chunk));
        assert!(!heap.is_live(&copy));
        assert!(heap.is_live(&reused));
    }

    #[test]
    fn forged_chunk_is_not_live() {
        let heap = small_heap();
        let chunk = heap.allocate_chunk(16, false).unwrap();
        let shifted = MemChunk::new(chunk.base() + 8, chunk.size(), chunk.handle());
        let grown = MemChunk::new(chunk.base(), 1 << 20, chunk.handle());
        assert!(!heap.is_live(&shifted));
        assert!(!heap.is_live(&grown));
    }

    #[test]
    fn clones_share_the_heap() {
        let heap = small_heap();
        let other = heap.clone();
        let chunk = heap.allocate_chunk(8, false).unwrap();
        assert!(other.contains(chunk.handle()));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn used_bytes_matches_live_reservations(
                sizes in proptest::collection::vec(0u64..64, 1..40),
                destroy_mask in proptest::collection::vec(any::<bool>(), 40),
            ) {
                let heap = HeapAllocator::new(AllocatorConfig::new(4096));
                let mut live = Vec::new();
                for (i, &size) in sizes.iter().enumerate() {
                    let chunk = heap.allocate_chunk(size, false).unwrap();
                    if destroy_mask[i] {
                        heap.destroy_chunk(chunk);
                    } else {
                        live.push(chunk);
                    }
                }
                let expected: u64 = live.iter().map(|c| c.size().div_ceil(8) * 8).sum();
                prop_assert_eq!(heap.used_bytes(), expected);
                prop_assert_eq!(heap.live_chunks(), live.len());

                let distinct: std::collections::HashSet<_> =
                    live.iter().map(|c| c.handle()).collect();
                prop_assert_eq!(distinct.len(), live.len());
            }
        }
    }
}
