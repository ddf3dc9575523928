//! Test utilities and mock types for durable collections.
//!
//! Provides a [`TrackingAllocator`] that counts every call a durable entity
//! makes into its allocator, a minimal [`MarkerEntity`] with its factory for
//! exercising generic element types, and helpers for simulating a process
//! restart through a heap image.

#![deny(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::cell::Cell;
use std::rc::Rc;

use durable_alloc::{AllocatorConfig, HeapAllocator};
use durable_core::{EntityHandle, MemChunk, RestorableAllocator};

pub use fixtures::{MarkerEntity, MarkerFactory};

/// Call counts recorded by a [`TrackingAllocator`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocStats {
    pub allocated: usize,
    pub retrieved: usize,
    pub destroyed: usize,
    pub registered: usize,
    pub cancelled: usize,
}

/// A [`HeapAllocator`] that records how it is called.
///
/// Clones share both the heap and the counters.
#[derive(Clone, Default)]
pub struct TrackingAllocator {
    heap: HeapAllocator,
    stats: Rc<Cell<AllocStats>>,
}

impl TrackingAllocator {
    pub fn new(config: AllocatorConfig) -> Self {
        Self::over(HeapAllocator::new(config))
    }

    /// Track calls into an existing heap.
    pub fn over(heap: HeapAllocator) -> Self {
        Self {
            heap,
            stats: Rc::default(),
        }
    }

    /// The heap underneath.
    pub fn heap(&self) -> &HeapAllocator {
        &self.heap
    }

    /// Counts so far.
    pub fn stats(&self) -> AllocStats {
        self.stats.get()
    }

    /// Zero the counters.
    pub fn reset_stats(&self) {
        self.stats.set(AllocStats::default());
    }

    fn bump(&self, f: impl FnOnce(&mut AllocStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }
}

// SAFETY: every call is forwarded to the wrapped `HeapAllocator`.
#[allow(unsafe_code)]
unsafe impl RestorableAllocator for TrackingAllocator {
    fn allocate_chunk(&self, bytes: u64, auto_reclaim: bool) -> Option<MemChunk> {
        self.bump(|s| s.allocated += 1);
        self.heap.allocate_chunk(bytes, auto_reclaim)
    }

    fn retrieve_chunk(&self, handle: EntityHandle, auto_reclaim: bool) -> Option<MemChunk> {
        self.bump(|s| s.retrieved += 1);
        self.heap.retrieve_chunk(handle, auto_reclaim)
    }

    fn chunk_handle(&self, chunk: &MemChunk) -> EntityHandle {
        self.heap.chunk_handle(chunk)
    }

    fn is_live(&self, chunk: &MemChunk) -> bool {
        self.heap.is_live(chunk)
    }

    fn destroy_chunk(&self, chunk: MemChunk) {
        self.bump(|s| s.destroyed += 1);
        self.heap.destroy_chunk(chunk);
    }

    fn register_auto_reclaim(&self, chunk: &MemChunk) {
        self.bump(|s| s.registered += 1);
        self.heap.register_auto_reclaim(chunk);
    }

    fn cancel_auto_reclaim(&self, chunk: &MemChunk) {
        self.bump(|s| s.cancelled += 1);
        self.heap.cancel_auto_reclaim(chunk);
    }
}

/// Simulate a process restart.
///
/// Runs exit-time reclamation on `heap`, writes its image and loads the
/// image into a new heap whose chunks live at different addresses.
pub fn restart(heap: &HeapAllocator) -> HeapAllocator {
    heap.close();
    let mut image = Vec::new();
    heap.save(&mut image).expect("in-memory save cannot fail");
    HeapAllocator::load(&mut image.as_slice()).expect("image just written must load")
}
