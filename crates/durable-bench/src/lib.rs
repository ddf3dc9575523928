//! Benchmark profiles for durable collections.
//!
//! Provides pre-built heaps and arrays for benchmarking:
//!
//! - [`reference_heap`]: a heap sized for the reference profiles
//! - [`long_array`]: a `Long` array with every cell written
//! - [`string_array`]: a `String` array with every cell referencing its own string

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use durable_alloc::{AllocatorConfig, HeapAllocator};
use durable_collections::{DurableArray, DurableString};
use std::error::Error;

use durable_core::{DurableType, GenericParams};

/// Cells in the reference profile arrays.
pub const REFERENCE_CELLS: u32 = 10_000;

/// A heap large enough for several reference profiles at once.
pub fn reference_heap() -> HeapAllocator {
    HeapAllocator::new(AllocatorConfig::new(16 * 1024 * 1024))
}

/// An array of `size` longs where cell `i` holds `i`.
pub fn long_array(
    heap: &HeapAllocator,
    size: u32,
) -> Result<DurableArray<HeapAllocator>, Box<dyn Error>> {
    let mut array = DurableArray::create(heap, GenericParams::of(DurableType::Long), size, false)?;
    for i in 0..size {
        array.set(i, Some(i64::from(i).into()))?;
    }
    Ok(array)
}

/// An array of `size` strings where cell `i` holds `"cell-{i}"`.
pub fn string_array(
    heap: &HeapAllocator,
    size: u32,
) -> Result<DurableArray<HeapAllocator>, Box<dyn Error>> {
    let mut array = DurableArray::create(heap, GenericParams::of(DurableType::String), size, false)?;
    for i in 0..size {
        let s = DurableString::create(heap, &format!("cell-{i}"), false)?;
        array.set(i, Some(s.into()))?;
    }
    Ok(array)
}
