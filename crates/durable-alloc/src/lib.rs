//! Restorable heap allocator for durable collections.
//!
//! [`HeapAllocator`] implements [`RestorableAllocator`](durable_core::RestorableAllocator)
//! over process memory. Chunks are word-aligned zeroed blocks addressed by
//! generational handles, and the whole heap can be written to an image and
//! loaded back, which is how a "fresh process" recovers its entities.
//!
//! # Architecture
//!
//! ```text
//! HeapAllocator (Rc handle, cloned into every entity)
//! └── HeapState
//!     ├── IndexMap<EntityHandle, ChunkEntry> (live chunks, insertion order)
//!     ├── generations: Vec<u32> (one per handle slot)
//!     └── free_list: Vec<u32> (slots of destroyed chunks)
//! ```
//!
//! # Reclamation
//!
//! Each chunk carries an auto-reclaim flag. [`HeapAllocator::close`] plays
//! the part of process exit: every chunk still flagged is released.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod handle;
pub mod heap;
pub mod image;

pub use config::AllocatorConfig;
pub use error::AllocError;
pub use heap::HeapAllocator;

/// Magic bytes at the start of every heap image.
pub const MAGIC: [u8; 4] = *b"DURA";

/// Current heap image format version.
pub const FORMAT_VERSION: u8 = 1;
