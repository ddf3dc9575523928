//! Durable: fixed-length arrays that outlive the process that created them.
//!
//! This is the top-level facade crate that re-exports the public API from all
//! durable sub-crates. For most users, adding `durable` as a single dependency
//! is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use durable::prelude::*;
//!
//! let heap = HeapAllocator::default();
//!
//! // An array of four longs that is kept when this wrapper goes away.
//! let mut array = DurableArray::create(&heap, GenericParams::of(DurableType::Long), 4, false)
//!     .unwrap();
//! array.set(3, Some((1i64 << 31).into())).unwrap();
//! let handle = array.handle();
//! drop(array);
//!
//! // Simulate a restart: write the heap out and load it back.
//! let mut image = Vec::new();
//! heap.save(&mut image).unwrap();
//! let next = HeapAllocator::load(&mut image.as_slice()).unwrap();
//!
//! let mut again =
//!     DurableArray::restore(&next, GenericParams::of(DurableType::Long), handle, false).unwrap();
//! assert_eq!(again.size(), 4);
//! assert_eq!(again.get(3).unwrap().and_then(GenericValue::as_long), Some(1 << 31));
//! assert!(again.get(4).is_err());
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `durable-core` | Handles, chunks, layouts, errors, core traits |
//! | [`alloc`] | `durable-alloc` | Reference heap allocator and heap images |
//! | [`collections`] | `durable-collections` | Arrays, strings, element values, factories |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and errors (`durable-core`).
///
/// Contains the [`types::RestorableAllocator`], [`types::DurableEntity`] and
/// [`types::EntityFactoryProxy`] traits that connect containers to their
/// storage and elements.
pub use durable_core as types;

/// Reference allocator (`durable-alloc`).
///
/// [`alloc::HeapAllocator`] keeps chunks in process memory and can
/// [`save`](alloc::HeapAllocator::save) and
/// [`load`](alloc::HeapAllocator::load) them as an image.
pub use durable_alloc as alloc;

/// Durable containers (`durable-collections`).
///
/// [`collections::DurableArray`] and [`collections::DurableString`], the
/// [`collections::GenericValue`] element enum, and the factories that
/// restore nested entities.
pub use durable_collections as collections;

/// Common imports for typical durable-array usage.
///
/// ```rust
/// use durable::prelude::*;
/// ```
pub mod prelude {
    // Allocator
    pub use durable_alloc::{AllocatorConfig, HeapAllocator};

    // Core types and traits
    pub use durable_core::{
        DurableEntity, DurableType, EntityHandle, GenericParams, MemChunk, RestorableAllocator,
    };

    // Errors
    pub use durable_alloc::AllocError;
    pub use durable_core::{OutOfMemory, RestoreError, RetrieveError};

    // Containers
    pub use durable_collections::{
        DurableArray, DurableArrayFactory, DurableString, DurableStringFactory, GenericValue,
    };
}
