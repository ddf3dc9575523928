//! Per-cell views over durable container memory.
//!
//! A [`GenericField`] interprets one 8-byte cell according to the
//! container's element type. It holds no durable state of its own: the cell
//! is the truth, and the cached value is only a wrapper reused while it
//! still matches the cell.

use std::fmt;

use durable_core::{
    DurableType, EntityHandle, FactoryRef, GenericParams, RestorableAllocator, RestoreError,
    RetrieveError,
};

use crate::raw::CellPtr;
use crate::string::DurableString;
use crate::value::GenericValue;

/// A typed view over one durable cell.
pub struct GenericField<A: RestorableAllocator> {
    index: u32,
    cell: CellPtr,
    ty: DurableType,
    factory: Option<FactoryRef<A>>,
    /// Descriptors for the materialized element itself.
    nested: GenericParams<A>,
    allocator: A,
    auto_reclaim: bool,
    cached: Option<GenericValue<A>>,
}

impl<A: RestorableAllocator> GenericField<A> {
    /// Bind a field to `cell`, slot `index` of its container, using
    /// position 0 of `params`.
    pub(crate) fn new(
        index: u32,
        cell: CellPtr,
        params: &GenericParams<A>,
        allocator: A,
        auto_reclaim: bool,
    ) -> Result<Self, RetrieveError> {
        let ty = params
            .element_type()
            .ok_or(RetrieveError::MissingElementType)?;
        Ok(Self {
            index,
            cell,
            ty,
            factory: params.element_factory().cloned(),
            nested: params.shifted(),
            allocator,
            auto_reclaim,
            cached: None,
        })
    }

    /// Absolute address of the cell.
    pub fn cell_addr(&self) -> u64 {
        self.cell.addr()
    }

    /// The element type this field interprets its cell as.
    pub fn durable_type(&self) -> DurableType {
        self.ty
    }

    /// Whether the cell holds all zero bytes.
    pub fn is_null(&self) -> Result<bool, RetrieveError> {
        Ok(self.load()? == 0)
    }

    /// Whether a materialized wrapper adopts auto-reclaim.
    pub fn auto_reclaim(&self) -> bool {
        self.auto_reclaim
    }

    /// Resolve the cell.
    ///
    /// Primitive cells always produce a value; reference cells produce
    /// `None` when null.
    pub fn read(&mut self) -> Result<Option<&GenericValue<A>>, RetrieveError> {
        self.refresh()?;
        Ok(self.cached.as_ref())
    }

    /// Resolve the cell for in-place mutation of the element.
    pub fn read_mut(&mut self) -> Result<Option<&mut GenericValue<A>>, RetrieveError> {
        self.refresh()?;
        Ok(self.cached.as_mut())
    }

    /// Store `value` in the cell.
    ///
    /// With `destroy_previous`, the element the cell referenced is released
    /// first. Without it the element is left allocated for whoever else owns
    /// it, and this field stops reclaiming it.
    pub fn write(
        &mut self,
        value: Option<GenericValue<A>>,
        destroy_previous: bool,
    ) -> Result<(), RetrieveError> {
        let new_handle = match &value {
            Some(v) if v.durable_type() != self.ty => {
                return Err(RetrieveError::TypeMismatch {
                    expected: self.ty,
                    found: v.durable_type(),
                });
            }
            Some(v) => v.handle(),
            None => None,
        };

        // Fails before anything changes if the container's chunk is gone.
        let old = self.load()?;
        if self.ty.is_reference() {
            // Rewriting the same entity must not destroy it.
            if old != 0 && destroy_previous && new_handle != Some(EntityHandle(old)) {
                self.release_current()?;
            } else {
                self.detach_cached();
            }
        }

        let mut value = value;
        self.store(value.as_ref().map_or(0, GenericValue::encode))?;
        if let Some(v) = value.as_mut() {
            v.set_auto_reclaim(self.auto_reclaim, &self.allocator);
        }
        self.cached = value;
        Ok(())
    }

    /// Release the referenced element and clear the cell.
    ///
    /// Returns whether an element was released. Primitive cells are left as
    /// they are.
    pub fn release(&mut self) -> Result<bool, RetrieveError> {
        let released = self.release_current()?;
        if released {
            self.store(0)?;
        }
        Ok(released)
    }

    /// Apply a reclaim policy to this field and its cached wrapper.
    pub fn set_auto_reclaim(&mut self, on: bool) {
        self.auto_reclaim = on;
        if let Some(v) = self.cached.as_mut() {
            v.set_auto_reclaim(on, &self.allocator);
        }
    }

    /// Bring the cache in line with the cell.
    fn refresh(&mut self) -> Result<(), RetrieveError> {
        let bits = self.load()?;
        if let Some(v) = GenericValue::decode_primitive(self.ty, bits)? {
            self.cached = Some(v);
            return Ok(());
        }
        if bits == 0 {
            self.detach_cached();
            return Ok(());
        }
        let handle = EntityHandle(bits);
        if self.cached.as_ref().and_then(GenericValue::handle) == Some(handle) {
            return Ok(());
        }
        self.detach_cached();
        self.cached = Some(self.materialize(handle)?);
        Ok(())
    }

    /// Build the wrapper for a non-null reference cell.
    fn materialize(&self, handle: EntityHandle) -> Result<GenericValue<A>, RetrieveError> {
        let value = match self.ty {
            DurableType::String => GenericValue::String(DurableString::restore(
                &self.allocator,
                handle,
                self.auto_reclaim,
            )?),
            DurableType::Chunk => GenericValue::Chunk(
                self.allocator
                    .retrieve_chunk(handle, self.auto_reclaim)
                    .ok_or(RestoreError::RetrieveFailure { handle })?,
            ),
            DurableType::Durable => {
                let factory = self.factory.as_ref().ok_or(RetrieveError::MissingFactory)?;
                GenericValue::Durable(factory.restore(
                    &self.allocator,
                    &self.nested,
                    handle,
                    self.auto_reclaim,
                )?)
            }
            primitive => {
                return Err(RetrieveError::TypeMismatch {
                    expected: DurableType::Durable,
                    found: primitive,
                })
            }
        };
        Ok(value)
    }

    /// Destroy the element the cell references, if any.
    fn release_current(&mut self) -> Result<bool, RetrieveError> {
        if self.ty.is_primitive() || self.load()? == 0 {
            self.detach_cached();
            return Ok(false);
        }
        self.refresh()?;
        match self.cached.take() {
            Some(v) => {
                v.destroy(&self.allocator)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn load(&self) -> Result<u64, RetrieveError> {
        self.cell
            .load(&self.allocator)
            .ok_or(RetrieveError::SlotUnavailable { index: self.index })
    }

    fn store(&self, bits: u64) -> Result<(), RetrieveError> {
        if self.cell.store(&self.allocator, bits) {
            Ok(())
        } else {
            Err(RetrieveError::SlotUnavailable { index: self.index })
        }
    }

    /// Drop the cached wrapper without reclaiming what it refers to.
    fn detach_cached(&mut self) {
        if let Some(mut v) = self.cached.take() {
            v.set_auto_reclaim(false, &self.allocator);
        }
    }
}

impl<A: RestorableAllocator> fmt::Debug for GenericField<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericField")
            .field("index", &self.index)
            .field("cell_addr", &format_args!("{:#x}", self.cell.addr()))
            .field("ty", &self.ty)
            .field("auto_reclaim", &self.auto_reclaim)
            .field("cached", &self.cached)
            .finish()
    }
}
