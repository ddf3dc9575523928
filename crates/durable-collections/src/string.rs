//! Durable UTF-8 strings.

use std::any::Any;
use std::fmt;

use durable_core::{
    DurableEntity, EntityHandle, LengthEncoding, MemChunk, NativeLayout, OutOfMemory,
    RestorableAllocator, RestoreError, RetrieveError,
};

use crate::raw;

/// Layout of a string chunk: raw UTF-8 bytes, length implicit in chunk size.
pub const STRING_LAYOUT: NativeLayout = NativeLayout {
    cell_width: 1,
    header_bytes: 0,
    trailer_bytes: 0,
    length: LengthEncoding::ChunkSize,
};

/// An immutable string stored in its own chunk.
///
/// The text is read once at create/restore time and kept alongside the
/// chunk, so borrowing it never touches durable memory.
pub struct DurableString<A: RestorableAllocator> {
    allocator: A,
    chunk: MemChunk,
    text: String,
    auto_reclaim: bool,
    destroyed: bool,
}

impl<A: RestorableAllocator> DurableString<A> {
    /// Allocate a chunk holding `text`.
    pub fn create(allocator: &A, text: &str, auto_reclaim: bool) -> Result<Self, OutOfMemory> {
        let requested = text.len() as u64;
        let chunk = allocator
            .allocate_chunk(requested, auto_reclaim)
            .ok_or(OutOfMemory { requested })?;
        if raw::write_bytes(allocator, &chunk, text.as_bytes()).is_none() {
            return Err(OutOfMemory { requested });
        }
        Ok(Self {
            allocator: allocator.clone(),
            chunk,
            text: text.to_owned(),
            auto_reclaim,
            destroyed: false,
        })
    }

    /// Recover a string from its handle.
    pub fn restore(
        allocator: &A,
        handle: EntityHandle,
        auto_reclaim: bool,
    ) -> Result<Self, RestoreError> {
        if handle.is_null() {
            return Err(RestoreError::NullHandle);
        }
        let chunk = allocator
            .retrieve_chunk(handle, auto_reclaim)
            .ok_or(RestoreError::RetrieveFailure { handle })?;
        let bytes =
            raw::read_bytes(allocator, &chunk).ok_or(RestoreError::RetrieveFailure { handle })?;
        let text = String::from_utf8(bytes).map_err(|e| {
            RestoreError::Invalid {
                reason: format!("string {handle} is not UTF-8: {e}"),
            }
        })?;
        Ok(Self {
            allocator: allocator.clone(),
            chunk,
            text,
            auto_reclaim,
            destroyed: false,
        })
    }

    /// The text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Whether the string is empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Release the chunk.
    pub fn destroy(mut self) {
        self.release();
    }

    fn release(&mut self) {
        self.destroyed = true;
        self.allocator.destroy_chunk(self.chunk);
    }
}

impl<A: RestorableAllocator> DurableEntity<A> for DurableString<A> {
    fn handle(&self) -> EntityHandle {
        self.allocator.chunk_handle(&self.chunk)
    }

    fn auto_reclaim(&self) -> bool {
        self.auto_reclaim
    }

    fn cancel_auto_reclaim(&mut self) {
        self.allocator.cancel_auto_reclaim(&self.chunk);
        self.auto_reclaim = false;
    }

    fn register_auto_reclaim(&mut self) {
        self.allocator.register_auto_reclaim(&self.chunk);
        self.auto_reclaim = true;
    }

    fn destroy(self: Box<Self>) -> Result<(), RetrieveError> {
        (*self).destroy();
        Ok(())
    }

    fn native_field_info(&self) -> &'static NativeLayout {
        &STRING_LAYOUT
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<A: RestorableAllocator> Drop for DurableString<A> {
    fn drop(&mut self) {
        if self.auto_reclaim && !self.destroyed {
            self.release();
        }
    }
}

impl<A: RestorableAllocator> fmt::Debug for DurableString<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DurableString")
            .field("handle", &self.chunk.handle())
            .field("text", &self.text)
            .field("auto_reclaim", &self.auto_reclaim)
            .finish()
    }
}
