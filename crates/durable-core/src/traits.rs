//! Core abstraction traits shared by allocators, entities and factories.

use std::any::Any;

use crate::chunk::MemChunk;
use crate::error::{RestoreError, RetrieveError};
use crate::id::EntityHandle;
use crate::layout::NativeLayout;
use crate::params::GenericParams;

/// An allocator whose chunks can be found again through a stable handle.
///
/// Implementations are cheap clonable handles onto a shared backing store;
/// every durable entity keeps its own clone.
///
/// # Safety
///
/// Containers read and write chunk memory directly through the base address
/// of the [`MemChunk`]s this trait hands out. An implementation must
/// guarantee, for every chunk returned by
/// [`allocate_chunk`](Self::allocate_chunk) or
/// [`retrieve_chunk`](Self::retrieve_chunk):
///
/// - the base address is 8-byte aligned and `size` bytes from it are
///   readable and writable;
/// - a freshly allocated chunk is zero-filled;
/// - while [`is_live`](Self::is_live) returns `true` for the chunk, that
///   memory stays valid, stays at the same address and is not handed out
///   as part of any other chunk;
/// - once the chunk is destroyed or reclaimed, `is_live` returns `false`
///   for it (and for every stale copy of it) from then on;
/// - `destroy_chunk`, `register_auto_reclaim` and `cancel_auto_reclaim` on
///   a chunk that is no longer live do nothing.
#[allow(unsafe_code)]
pub unsafe trait RestorableAllocator: Clone + 'static {
    /// Allocate a zeroed chunk of `bytes` bytes.
    ///
    /// Returns `None` when the backing store is exhausted.
    fn allocate_chunk(&self, bytes: u64, auto_reclaim: bool) -> Option<MemChunk>;

    /// Find the chunk previously issued under `handle`.
    ///
    /// Returns `None` for handles that were never issued or whose chunk has
    /// been destroyed.
    fn retrieve_chunk(&self, handle: EntityHandle, auto_reclaim: bool) -> Option<MemChunk>;

    /// Base address of `chunk` in this process.
    fn chunk_base(&self, chunk: &MemChunk) -> u64 {
        chunk.base()
    }

    /// Size of `chunk` in bytes.
    fn chunk_size(&self, chunk: &MemChunk) -> u64 {
        chunk.size()
    }

    /// The stable handle for `chunk`; the inverse of [`retrieve_chunk`](Self::retrieve_chunk).
    fn chunk_handle(&self, chunk: &MemChunk) -> EntityHandle;

    /// Whether `chunk` still describes memory owned by this allocator.
    ///
    /// Must be checked before every access through the chunk's base address.
    fn is_live(&self, chunk: &MemChunk) -> bool;

    /// Release `chunk` back to the allocator.
    fn destroy_chunk(&self, chunk: MemChunk);

    /// Release `chunk` automatically when its owner goes away.
    fn register_auto_reclaim(&self, chunk: &MemChunk);

    /// Keep `chunk` alive past its owner.
    fn cancel_auto_reclaim(&self, chunk: &MemChunk);
}

/// An object whose state lives in allocator-managed memory.
///
/// The in-process value is only a wrapper; the chunk is the truth. Dropping
/// a wrapper whose [`auto_reclaim`](Self::auto_reclaim) is set releases the
/// entity, dropping one without it leaves the entity for a later restore.
pub trait DurableEntity<A: RestorableAllocator>: Any {
    /// The stable handle of this entity's root chunk.
    fn handle(&self) -> EntityHandle;

    /// Whether dropping this wrapper releases the entity.
    fn auto_reclaim(&self) -> bool;

    /// Stop releasing the entity on drop.
    fn cancel_auto_reclaim(&mut self);

    /// Release the entity on drop.
    fn register_auto_reclaim(&mut self);

    /// Set the reclaim policy to `on`.
    fn set_auto_reclaim(&mut self, on: bool) {
        if on {
            self.register_auto_reclaim();
        } else {
            self.cancel_auto_reclaim();
        }
    }

    /// Release the entity and everything it owns.
    fn destroy(self: Box<Self>) -> Result<(), RetrieveError>;

    /// Static description of the entity's chunk layout.
    fn native_field_info(&self) -> &'static NativeLayout;

    /// Upcast for downcasting to the concrete entity type.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete entity type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Materializes durable entities of one concrete type from their handles.
pub trait EntityFactoryProxy<A: RestorableAllocator> {
    /// Restore the entity stored under `handle`.
    ///
    /// `params` are the element descriptors for the restored entity itself,
    /// already shifted past the container's own position.
    fn restore(
        &self,
        allocator: &A,
        params: &GenericParams<A>,
        handle: EntityHandle,
        auto_reclaim: bool,
    ) -> Result<Box<dyn DurableEntity<A>>, RestoreError>;
}
