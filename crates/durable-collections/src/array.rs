//! Durable fixed-length arrays.
//!
//! A [`DurableArray`] is one chunk of `size` 8-byte cells and nothing else:
//! no header, no length word. The length is recovered from the chunk size
//! on restore, and the element type is supplied by the caller both times.
//!
//! Slots are materialized lazily. The cell stays authoritative; a slot only
//! caches the wrapper for whatever entity its cell references.

use std::any::Any;
use std::fmt;

use durable_core::{
    DurableEntity, EntityHandle, GenericParams, LengthEncoding, MemChunk, NativeLayout,
    OutOfMemory, RestorableAllocator, RestoreError, RetrieveError,
};

use crate::field::GenericField;
use crate::raw::{self, CellPtr, CELL_BYTES};
use crate::value::GenericValue;

/// Layout of an array chunk: `size` cells of 8 bytes, length implicit.
pub const ARRAY_LAYOUT: NativeLayout = NativeLayout {
    cell_width: CELL_BYTES as u32,
    header_bytes: 0,
    trailer_bytes: 0,
    length: LengthEncoding::ChunkSize,
};

/// A fixed-length array whose cells live in a restorable chunk.
///
/// Dropping the array with [`auto_reclaim`](Self::auto_reclaim) set
/// destroys it and every element it references. Without it, dropping only
/// discards the in-process wrapper and the array can be restored from
/// [`handle`](Self::handle).
pub struct DurableArray<A: RestorableAllocator> {
    allocator: A,
    params: GenericParams<A>,
    chunk: MemChunk,
    size: u32,
    slots: Vec<Option<GenericField<A>>>,
    auto_reclaim: bool,
    destroyed: bool,
}

impl<A: RestorableAllocator> DurableArray<A> {
    /// Allocate an array of `size` null cells.
    ///
    /// Position 0 of `params` is the element type; later positions are
    /// forwarded to the elements themselves.
    pub fn create(
        allocator: &A,
        params: GenericParams<A>,
        size: u32,
        auto_reclaim: bool,
    ) -> Result<Self, OutOfMemory> {
        let requested = u64::from(size) * CELL_BYTES;
        let chunk = allocator
            .allocate_chunk(requested, auto_reclaim)
            .ok_or(OutOfMemory { requested })?;
        if !raw::zero(allocator, &chunk) {
            return Err(OutOfMemory { requested });
        }
        tracing::debug!(handle = %chunk.handle(), size, auto_reclaim, "created durable array");
        Ok(Self::over(allocator, params, chunk, size, auto_reclaim))
    }

    /// Recover an array from its handle.
    ///
    /// `params` must describe the same element type the array was created
    /// with; a mismatch is not detectable from the cells. No cell is read
    /// until it is accessed.
    pub fn restore(
        allocator: &A,
        params: GenericParams<A>,
        handle: EntityHandle,
        auto_reclaim: bool,
    ) -> Result<Self, RestoreError> {
        if handle.is_null() {
            return Err(RestoreError::NullHandle);
        }
        let chunk = allocator
            .retrieve_chunk(handle, auto_reclaim)
            .ok_or(RestoreError::RetrieveFailure { handle })?;

        let bytes = allocator.chunk_size(&chunk);
        let size = u32::try_from(ARRAY_LAYOUT.cell_count(bytes)).map_err(|_| {
            RestoreError::Invalid {
                reason: format!("array {handle} spans {bytes} bytes, more cells than u32::MAX"),
            }
        })?;
        let remainder = bytes % CELL_BYTES;
        if remainder != 0 {
            tracing::warn!(%handle, bytes, remainder, "array chunk is not a whole number of cells");
        }

        tracing::debug!(%handle, size, auto_reclaim, "restored durable array");
        Ok(Self::over(allocator, params, chunk, size, auto_reclaim))
    }

    fn over(
        allocator: &A,
        params: GenericParams<A>,
        chunk: MemChunk,
        size: u32,
        auto_reclaim: bool,
    ) -> Self {
        Self {
            allocator: allocator.clone(),
            params,
            chunk,
            size,
            slots: Vec::new(),
            auto_reclaim,
            destroyed: false,
        }
    }

    /// The allocator's stable handle for this array's chunk.
    pub fn handle(&self) -> EntityHandle {
        self.allocator.chunk_handle(&self.chunk)
    }

    /// Number of cells.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Whether the array has no cells.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// The element descriptors this array was opened with.
    pub fn params(&self) -> &GenericParams<A> {
        &self.params
    }

    /// Read element `index`.
    ///
    /// Primitive element types always yield a value, zero for a fresh cell.
    /// Reference element types yield `None` for a null cell. Once the
    /// array's chunk has been released every index in range reports
    /// [`RetrieveError::SlotUnavailable`].
    pub fn get(&mut self, index: u32) -> Result<Option<&GenericValue<A>>, RetrieveError> {
        self.slot(index)?.read()
    }

    /// Read element `index` for in-place mutation.
    pub fn get_mut(&mut self, index: u32) -> Result<Option<&mut GenericValue<A>>, RetrieveError> {
        self.slot(index)?.read_mut()
    }

    /// Store `value` at `index`, destroying the element it replaces.
    pub fn set(&mut self, index: u32, value: Option<GenericValue<A>>) -> Result<(), RetrieveError> {
        self.set_with_destroy(index, value, true)
    }

    /// Store `value` at `index`.
    ///
    /// With `destroy_previous` unset, the replaced element stays allocated
    /// and this array stops reclaiming it.
    pub fn set_with_destroy(
        &mut self,
        index: u32,
        value: Option<GenericValue<A>>,
        destroy_previous: bool,
    ) -> Result<(), RetrieveError> {
        self.slot(index)?.write(value, destroy_previous)
    }

    /// Destroy every referenced element, then release the chunk.
    ///
    /// Elements that fail to resolve do not stop the teardown; the first
    /// such error is returned after the chunk has been released. If the
    /// chunk was already released through another wrapper or by the
    /// allocator, there is nothing left to walk and this succeeds.
    pub fn destroy(mut self) -> Result<(), RetrieveError> {
        self.teardown()
    }

    /// Whether dropping this array destroys it.
    pub fn auto_reclaim(&self) -> bool {
        self.auto_reclaim
    }

    /// Keep the array and its elements alive past this wrapper.
    pub fn cancel_auto_reclaim(&mut self) {
        self.allocator.cancel_auto_reclaim(&self.chunk);
        self.apply_auto_reclaim(false);
    }

    /// Destroy the array and its elements when this wrapper is dropped.
    pub fn register_auto_reclaim(&mut self) {
        self.allocator.register_auto_reclaim(&self.chunk);
        self.apply_auto_reclaim(true);
    }

    /// Static description of the chunk layout.
    pub fn native_field_info(&self) -> &'static NativeLayout {
        &ARRAY_LAYOUT
    }

    fn apply_auto_reclaim(&mut self, on: bool) {
        self.auto_reclaim = on;
        for slot in self.slots.iter_mut().flatten() {
            slot.set_auto_reclaim(on);
        }
    }

    /// The slot for `index`, built on first use.
    fn slot(&mut self, index: u32) -> Result<&mut GenericField<A>, RetrieveError> {
        if index >= self.size {
            return Err(RetrieveError::IndexOutOfRange {
                index,
                size: self.size,
            });
        }
        let i = index as usize;
        if self.slots.len() <= i {
            self.slots.resize_with(i + 1, || None);
        }
        let slot = &mut self.slots[i];
        if slot.is_none() {
            let cell = CellPtr::of(&self.chunk, u64::from(index))
                .ok_or(RetrieveError::SlotUnavailable { index })?;
            *slot = Some(GenericField::new(
                index,
                cell,
                &self.params,
                self.allocator.clone(),
                self.auto_reclaim,
            )?);
        }
        slot.as_mut().ok_or(RetrieveError::SlotUnavailable { index })
    }

    fn teardown(&mut self) -> Result<(), RetrieveError> {
        if self.destroyed {
            return Ok(());
        }
        self.destroyed = true;
        let handle = self.handle();

        if !self.allocator.is_live(&self.chunk) {
            // Released elsewhere; its cells can no longer be walked.
            self.slots.clear();
            tracing::debug!(%handle, "durable array chunk already released");
            return Ok(());
        }

        let mut first_err = None;
        let walk = self.params.element_type().is_some_and(|ty| ty.is_reference());
        if walk {
            for index in 0..self.size {
                let released = self.slot(index).and_then(GenericField::release);
                if let Err(e) = released {
                    tracing::debug!(%handle, index, error = %e, "element teardown failed");
                    first_err.get_or_insert(e);
                }
            }
        }
        // Cells must be gone before the chunk is.
        self.slots.clear();
        self.allocator.destroy_chunk(self.chunk);

        tracing::debug!(%handle, size = self.size, "destroyed durable array");
        first_err.map_or(Ok(()), Err)
    }
}

impl<A: RestorableAllocator> DurableEntity<A> for DurableArray<A> {
    fn handle(&self) -> EntityHandle {
        DurableArray::handle(self)
    }

    fn auto_reclaim(&self) -> bool {
        self.auto_reclaim
    }

    fn cancel_auto_reclaim(&mut self) {
        DurableArray::cancel_auto_reclaim(self);
    }

    fn register_auto_reclaim(&mut self) {
        DurableArray::register_auto_reclaim(self);
    }

    fn destroy(self: Box<Self>) -> Result<(), RetrieveError> {
        (*self).destroy()
    }

    fn native_field_info(&self) -> &'static NativeLayout {
        &ARRAY_LAYOUT
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<A: RestorableAllocator> Drop for DurableArray<A> {
    fn drop(&mut self) {
        if !self.auto_reclaim || self.destroyed {
            return;
        }
        if let Err(e) = self.teardown() {
            tracing::warn!(handle = %self.chunk.handle(), error = %e, "drop-time reclaim of durable array failed");
        }
    }
}

impl<A: RestorableAllocator> fmt::Debug for DurableArray<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DurableArray")
            .field("handle", &self.chunk.handle())
            .field("size", &self.size)
            .field("types", &self.params.types())
            .field("auto_reclaim", &self.auto_reclaim)
            .finish()
    }
}
