//! Arrays whose elements are themselves durable entities.

use durable_alloc::HeapAllocator;
use durable_collections::{
    DurableArray, DurableArrayFactory, DurableString, DurableStringFactory, GenericValue,
};
use durable_core::{
    DurableEntity, DurableType, GenericParams, RestorableAllocator, RestoreError, RetrieveError,
};
use durable_test_utils::{restart, MarkerEntity, MarkerFactory};

type Array = DurableArray<HeapAllocator>;

fn array_of_longs() -> GenericParams<HeapAllocator> {
    GenericParams::with_factory(DurableType::Durable, DurableArrayFactory::shared())
        .then(DurableType::Long, None)
}

#[test]
fn array_of_arrays_survives_restart() {
    let heap = HeapAllocator::default();
    let mut outer = Array::create(&heap, array_of_longs(), 2, false).unwrap();
    let mut inner = Array::create(&heap, GenericParams::of(DurableType::Long), 3, false).unwrap();
    inner.set(2, Some(99i64.into())).unwrap();
    outer.set(1, Some(GenericValue::entity(inner))).unwrap();
    let handle = outer.handle();
    drop(outer);

    let next = restart(&heap);
    let mut restored = DurableArray::restore(&next, array_of_longs(), handle, false).unwrap();
    assert!(restored.get(0).unwrap().is_none());
    let inner = restored
        .get_mut(1)
        .unwrap()
        .and_then(GenericValue::as_entity_mut::<DurableArray<HeapAllocator>>)
        .unwrap();
    assert_eq!(inner.size(), 3);
    assert_eq!(inner.params().element_type(), Some(DurableType::Long));
    assert_eq!(inner.get(2).unwrap().and_then(GenericValue::as_long), Some(99));
    assert_eq!(inner.get(0).unwrap().and_then(GenericValue::as_long), Some(0));
}

#[test]
fn nested_element_is_updated_in_place() {
    let heap = HeapAllocator::default();
    let mut outer = Array::create(&heap, array_of_longs(), 1, false).unwrap();
    let inner = Array::create(&heap, GenericParams::of(DurableType::Long), 1, false).unwrap();
    outer.set(0, Some(GenericValue::entity(inner))).unwrap();

    outer
        .get_mut(0)
        .unwrap()
        .and_then(GenericValue::as_entity_mut::<Array>)
        .unwrap()
        .set(0, Some(5i64.into()))
        .unwrap();
    let handle = outer.handle();
    drop(outer);

    let mut again = Array::restore(&heap, array_of_longs(), handle, false).unwrap();
    let inner = again
        .get_mut(0)
        .unwrap()
        .and_then(GenericValue::as_entity_mut::<Array>)
        .unwrap();
    assert_eq!(inner.get(0).unwrap().and_then(GenericValue::as_long), Some(5));
}

#[test]
fn destroy_cascades_through_every_level() {
    let heap = HeapAllocator::default();
    let mut outer = Array::create(&heap, array_of_longs(), 2, false).unwrap();
    for i in 0..2 {
        let inner = Array::create(&heap, GenericParams::of(DurableType::Long), 4, false).unwrap();
        outer.set(i, Some(GenericValue::entity(inner))).unwrap();
    }
    let handle = outer.handle();
    drop(outer);
    assert_eq!(heap.live_chunks(), 3);

    Array::restore(&heap, array_of_longs(), handle, false)
        .unwrap()
        .destroy()
        .unwrap();
    assert_eq!(heap.live_chunks(), 0);
}

#[test]
fn nested_wrappers_follow_the_outer_policy() {
    let heap = HeapAllocator::default();
    let mut outer = Array::create(&heap, array_of_longs(), 1, true).unwrap();
    let inner = Array::create(&heap, GenericParams::of(DurableType::Long), 1, false).unwrap();
    let inner_handle = inner.handle();
    outer.set(0, Some(GenericValue::entity(inner))).unwrap();
    assert_eq!(heap.is_auto_reclaim(inner_handle), Some(true));

    outer.cancel_auto_reclaim();
    assert_eq!(heap.is_auto_reclaim(inner_handle), Some(false));
    let auto = outer
        .get(0)
        .unwrap()
        .and_then(GenericValue::as_entity::<Array>)
        .map(|inner| inner.auto_reclaim());
    assert_eq!(auto, Some(false));
}

#[test]
fn durable_element_without_factory_is_reported() {
    let heap = HeapAllocator::default();
    let mut array = Array::create(&heap, GenericParams::of(DurableType::Durable), 1, false).unwrap();
    let marker = MarkerEntity::create(&heap, 3, false).unwrap();
    array.set(0, Some(GenericValue::entity(marker))).unwrap();
    let handle = array.handle();
    drop(array);

    let mut restored =
        Array::restore(&heap, GenericParams::of(DurableType::Durable), handle, false).unwrap();
    assert_eq!(restored.get(0).unwrap_err(), RetrieveError::MissingFactory);
}

#[test]
fn dangling_element_surfaces_restore_error() {
    let heap = HeapAllocator::default();
    let factory = MarkerFactory::new();
    let mut array = Array::create(&heap, factory.params(), 1, false).unwrap();
    let marker = MarkerEntity::create(&heap, 3, false).unwrap();
    let marker_handle = marker.handle();
    array.set(0, Some(GenericValue::entity(marker))).unwrap();
    let handle = array.handle();
    drop(array);
    // Release the element behind the array's back.
    heap.destroy_chunk(heap.retrieve_chunk(marker_handle, false).unwrap());

    let mut restored = Array::restore(&heap, factory.params(), handle, false).unwrap();
    assert_eq!(
        restored.get(0).unwrap_err(),
        RetrieveError::Element(RestoreError::RetrieveFailure {
            handle: marker_handle
        })
    );
}

#[test]
fn markers_restore_through_their_factory() {
    let heap = HeapAllocator::default();
    let factory = MarkerFactory::new();
    let mut array = Array::create(&heap, factory.params(), 2, false).unwrap();
    array
        .set(1, Some(GenericValue::entity(MarkerEntity::create(&heap, -8, false).unwrap())))
        .unwrap();
    let handle = array.handle();
    drop(array);

    let mut restored = Array::restore(&heap, factory.params(), handle, false).unwrap();
    let tag = restored
        .get_mut(1)
        .unwrap()
        .and_then(GenericValue::as_entity_mut::<MarkerEntity<HeapAllocator>>)
        .map(MarkerEntity::tag);
    assert_eq!(tag, Some(-8));
    assert_eq!(factory.restores(), 1);
}

#[test]
fn strings_as_generic_entities() {
    let heap = HeapAllocator::default();
    let params = || {
        GenericParams::<HeapAllocator>::with_factory(
            DurableType::Durable,
            DurableStringFactory::shared(),
        )
    };
    let mut array = Array::create(&heap, params(), 1, false).unwrap();
    let s = DurableString::create(&heap, "boxed", false).unwrap();
    array.set(0, Some(GenericValue::entity(s))).unwrap();
    let handle = array.handle();
    drop(array);

    let mut restored = Array::restore(&heap, params(), handle, false).unwrap();
    let text = restored
        .get(0)
        .unwrap()
        .and_then(GenericValue::as_entity::<DurableString<HeapAllocator>>)
        .map(|s| s.as_str().to_owned());
    assert_eq!(text.as_deref(), Some("boxed"));
}

#[test]
fn raw_chunks_are_referenced_not_copied() {
    let heap = HeapAllocator::default();
    let mut array = Array::create(&heap, GenericParams::of(DurableType::Chunk), 1, false).unwrap();
    let chunk = heap.allocate_chunk(24, false).unwrap();
    array.set(0, Some(chunk.into())).unwrap();
    let handle = array.handle();
    drop(array);

    let next = restart(&heap);
    let mut restored =
        DurableArray::restore(&next, GenericParams::of(DurableType::Chunk), handle, false)
            .unwrap();
    let found = restored
        .get(0)
        .unwrap()
        .and_then(GenericValue::as_chunk)
        .copied()
        .unwrap();
    assert_eq!(found.handle(), chunk.handle());
    assert_eq!(found.size(), 24);
}

#[test]
fn wrong_entity_kind_is_rejected() {
    let heap = HeapAllocator::default();
    let mut array = Array::create(&heap, array_of_longs(), 1, false).unwrap();
    let s = DurableString::create(&heap, "not an entity slot", true).unwrap();
    let err = array.set(0, Some(s.into())).unwrap_err();
    assert_eq!(
        err,
        RetrieveError::TypeMismatch {
            expected: DurableType::Durable,
            found: DurableType::String,
        }
    );
    assert!(array.get(0).unwrap().is_none());
}
