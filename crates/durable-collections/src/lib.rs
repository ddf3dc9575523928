//! Durable fixed-length arrays over restorable allocators.
//!
//! A [`DurableArray`] keeps its elements in a single allocator chunk of
//! 8-byte cells, so it survives the process that created it: anyone
//! holding the array's [`handle`](DurableArray::handle) and the same
//! allocator can [`restore`](DurableArray::restore) it and read the cells
//! back. This crate is the only one in the workspace that dereferences
//! chunk memory, and does so only in `raw.rs`.
//!
//! # Architecture
//!
//! ```text
//! DurableArray (chunk of size × 8 bytes)
//! ├── GenericParams (element type + factory at position 0, tail forwarded)
//! └── GenericField × size (lazy, one per touched cell)
//!     └── GenericValue (cached element)
//!         ├── primitives: decoded from the cell bits
//!         ├── DurableString: restored from the cell handle
//!         ├── MemChunk: retrieved from the cell handle
//!         └── Box<dyn DurableEntity>: restored by the factory
//! ```
//!
//! # Ownership
//!
//! An array with auto-reclaim set owns its elements: dropping or
//! destroying it destroys every element its cells reference. Wrappers
//! stored into a cell take on the array's policy.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod array;
pub mod factory;
pub mod field;
mod raw;
pub mod string;
pub mod value;

// Public re-exports for the primary API surface.
pub use array::{DurableArray, ARRAY_LAYOUT};
pub use factory::{DurableArrayFactory, DurableStringFactory};
pub use field::GenericField;
pub use string::{DurableString, STRING_LAYOUT};
pub use value::GenericValue;
