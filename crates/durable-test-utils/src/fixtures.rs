//! Reusable durable-entity fixtures.
//!
//! - [`MarkerEntity`]: a user-defined entity carrying one `i64` tag.
//! - [`MarkerFactory`]: restores markers and counts how often it was asked.

use std::any::Any;
use std::cell::Cell;
use std::rc::Rc;

use durable_collections::{DurableArray, GenericValue};
use durable_core::{
    DurableEntity, DurableType, EntityFactoryProxy, EntityHandle, FactoryRef, GenericParams,
    NativeLayout, OutOfMemory, RestorableAllocator, RestoreError, RetrieveError,
};

/// An entity defined outside the collections crate.
///
/// Stored as a one-cell array of `Long` so it needs no raw memory access.
pub struct MarkerEntity<A: RestorableAllocator> {
    body: DurableArray<A>,
}

impl<A: RestorableAllocator> MarkerEntity<A> {
    pub fn create(allocator: &A, tag: i64, auto_reclaim: bool) -> Result<Self, OutOfMemory> {
        let mut body = DurableArray::create(allocator, Self::params(), 1, auto_reclaim)?;
        body.set(0, Some(tag.into()))
            .expect("a fresh one-cell Long array accepts a Long at index 0");
        Ok(Self { body })
    }

    pub fn restore(
        allocator: &A,
        handle: EntityHandle,
        auto_reclaim: bool,
    ) -> Result<Self, RestoreError> {
        let body = DurableArray::restore(allocator, Self::params(), handle, auto_reclaim)?;
        if body.size() != 1 {
            return Err(RestoreError::Invalid {
                reason: format!("marker {handle} has {} cells", body.size()),
            });
        }
        Ok(Self { body })
    }

    /// The tag written at creation.
    pub fn tag(&mut self) -> i64 {
        self.body
            .get(0)
            .ok()
            .flatten()
            .and_then(GenericValue::as_long)
            .unwrap_or_default()
    }

    fn params() -> GenericParams<A> {
        GenericParams::of(DurableType::Long)
    }
}

impl<A: RestorableAllocator> DurableEntity<A> for MarkerEntity<A> {
    fn handle(&self) -> EntityHandle {
        self.body.handle()
    }

    fn auto_reclaim(&self) -> bool {
        self.body.auto_reclaim()
    }

    fn cancel_auto_reclaim(&mut self) {
        self.body.cancel_auto_reclaim();
    }

    fn register_auto_reclaim(&mut self) {
        self.body.register_auto_reclaim();
    }

    fn destroy(self: Box<Self>) -> Result<(), RetrieveError> {
        let this = *self;
        this.body.destroy()
    }

    fn native_field_info(&self) -> &'static NativeLayout {
        self.body.native_field_info()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Restores [`MarkerEntity`]s.
#[derive(Default)]
pub struct MarkerFactory {
    restores: Cell<usize>,
}

impl MarkerFactory {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Number of restore requests served, successful or not.
    pub fn restores(&self) -> usize {
        self.restores.get()
    }

    /// Params for a container whose elements are markers.
    pub fn params<A: RestorableAllocator>(self: &Rc<Self>) -> GenericParams<A> {
        let factory: FactoryRef<A> = self.clone();
        GenericParams::with_factory(DurableType::Durable, factory)
    }
}

impl<A: RestorableAllocator> EntityFactoryProxy<A> for MarkerFactory {
    fn restore(
        &self,
        allocator: &A,
        _params: &GenericParams<A>,
        handle: EntityHandle,
        auto_reclaim: bool,
    ) -> Result<Box<dyn DurableEntity<A>>, RestoreError> {
        self.restores.set(self.restores.get() + 1);
        Ok(Box::new(MarkerEntity::restore(allocator, handle, auto_reclaim)?))
    }
}

#[cfg(test)]
mod tests {
    use durable_alloc::HeapAllocator;

    use super::*;

    #[test]
    fn marker_keeps_its_tag_across_restore() {
        let heap = HeapAllocator::default();
        let handle = MarkerEntity::create(&heap, -42, false).unwrap().handle();
        let mut back = MarkerEntity::restore(&heap, handle, false).unwrap();
        assert_eq!(back.tag(), -42);
    }

    #[test]
    fn fresh_marker_holds_its_tag_without_restore() {
        let heap = HeapAllocator::default();
        let mut marker = MarkerEntity::create(&heap, i64::MIN, false).unwrap();
        assert_eq!(marker.tag(), i64::MIN);
        let bytes = heap.read_bytes(marker.handle()).unwrap();
        assert_eq!(bytes, i64::MIN.to_ne_bytes());
    }

    #[test]
    fn factory_counts_restores() {
        let heap = HeapAllocator::default();
        let handle = MarkerEntity::create(&heap, 1, false).unwrap().handle();
        let factory = MarkerFactory::new();
        let params = factory.params::<HeapAllocator>();
        let proxy = params.element_factory().unwrap();
        proxy.restore(&heap, &params.shifted(), handle, false).unwrap();
        assert!(proxy
            .restore(&heap, &params.shifted(), EntityHandle(0xdead), false)
            .is_err());
        assert_eq!(factory.restores(), 2);
    }
}
