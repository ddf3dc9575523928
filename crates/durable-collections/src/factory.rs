//! Factories that materialize this crate's entities from cell handles.
//!
//! A container whose element type is [`DurableType::Durable`] needs one of
//! these at position 0 of its [`GenericParams`]:
//!
//! ```
//! use durable_alloc::HeapAllocator;
//! use durable_collections::{DurableArray, DurableArrayFactory, GenericValue};
//! use durable_core::{DurableType, GenericParams};
//!
//! let heap = HeapAllocator::default();
//! let params = || {
//!     GenericParams::with_factory(DurableType::Durable, DurableArrayFactory::shared())
//!         .then(DurableType::Long, None)
//! };
//!
//! let mut outer = DurableArray::create(&heap, params(), 2, false)?;
//! let mut inner = DurableArray::create(&heap, GenericParams::of(DurableType::Long), 3, false)?;
//! inner.set(2, Some(7i64.into()))?;
//! outer.set(0, Some(GenericValue::entity(inner)))?;
//! let handle = outer.handle();
//! drop(outer);
//!
//! // The factory rebuilds the inner array with the forwarded `[Long]` params.
//! let mut outer = DurableArray::restore(&heap, params(), handle, false)?;
//! let inner = outer
//!     .get_mut(0)?
//!     .and_then(GenericValue::as_entity_mut::<DurableArray<HeapAllocator>>)
//!     .expect("cell 0 holds an array");
//! assert_eq!(inner.size(), 3);
//! assert_eq!(inner.get(2)?.and_then(GenericValue::as_long), Some(7));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! [`DurableType::Durable`]: durable_core::DurableType::Durable

use std::rc::Rc;

use durable_core::{
    DurableEntity, EntityFactoryProxy, EntityHandle, FactoryRef, GenericParams,
    RestorableAllocator, RestoreError,
};

use crate::array::DurableArray;
use crate::string::DurableString;

/// Restores nested [`DurableArray`]s.
///
/// The element descriptors of the restored array are the ones the outer
/// container forwards, i.e. its own params shifted by one.
#[derive(Clone, Copy, Debug, Default)]
pub struct DurableArrayFactory;

impl DurableArrayFactory {
    /// A shareable reference to the factory.
    pub fn shared<A: RestorableAllocator>() -> FactoryRef<A> {
        Rc::new(Self)
    }
}

impl<A: RestorableAllocator> EntityFactoryProxy<A> for DurableArrayFactory {
    fn restore(
        &self,
        allocator: &A,
        params: &GenericParams<A>,
        handle: EntityHandle,
        auto_reclaim: bool,
    ) -> Result<Box<dyn DurableEntity<A>>, RestoreError> {
        let array = DurableArray::restore(allocator, params.clone(), handle, auto_reclaim)?;
        Ok(Box::new(array))
    }
}

/// Restores [`DurableString`]s held as generic durable entities.
///
/// Containers declared with [`DurableType::String`] restore strings
/// directly and do not need this.
///
/// [`DurableType::String`]: durable_core::DurableType::String
#[derive(Clone, Copy, Debug, Default)]
pub struct DurableStringFactory;

impl DurableStringFactory {
    /// A shareable reference to the factory.
    pub fn shared<A: RestorableAllocator>() -> FactoryRef<A> {
        Rc::new(Self)
    }
}

impl<A: RestorableAllocator> EntityFactoryProxy<A> for DurableStringFactory {
    fn restore(
        &self,
        allocator: &A,
        _params: &GenericParams<A>,
        handle: EntityHandle,
        auto_reclaim: bool,
    ) -> Result<Box<dyn DurableEntity<A>>, RestoreError> {
        let s = DurableString::restore(allocator, handle, auto_reclaim)?;
        Ok(Box::new(s))
    }
}

#[cfg(test)]
mod tests {
    use durable_alloc::HeapAllocator;
    use durable_core::DurableType;

    use super::*;

    #[test]
    fn array_factory_forwards_nested_params() {
        let heap = HeapAllocator::default();
        let inner = DurableArray::create(&heap, GenericParams::of(DurableType::Long), 3, false)
            .unwrap();
        let handle = inner.handle();

        let factory = DurableArrayFactory::shared::<HeapAllocator>();
        let mut restored = factory
            .restore(&heap, &GenericParams::of(DurableType::Long), handle, false)
            .unwrap();
        assert_eq!(restored.handle(), handle);
        let array = restored
            .as_any_mut()
            .downcast_mut::<DurableArray<HeapAllocator>>()
            .unwrap();
        assert_eq!(array.size(), 3);
        assert_eq!(array.params().element_type(), Some(DurableType::Long));
    }

    #[test]
    fn array_factory_surfaces_restore_errors() {
        let heap = HeapAllocator::default();
        let factory = DurableArrayFactory::shared::<HeapAllocator>();
        let err = factory
            .restore(&heap, &GenericParams::empty(), EntityHandle::NULL, false)
            .err()
            .unwrap();
        assert_eq!(err, RestoreError::NullHandle);
    }

    #[test]
    fn string_factory_restores_text() {
        let heap = HeapAllocator::default();
        let handle = DurableString::create(&heap, "nested", false).unwrap().handle();
        let restored = DurableStringFactory
            .restore(&heap, &GenericParams::empty(), handle, false)
            .unwrap();
        let s = restored.as_any().downcast_ref::<DurableString<HeapAllocator>>().unwrap();
        assert_eq!(s.as_str(), "nested");
    }
}
