//! Core types and traits for durable off-heap collections.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! contract between durable containers and the two collaborators they rely
//! on: an allocator that hands out restorable chunks, and a factory that
//! materializes durable entities from 8-byte cells.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod chunk;
pub mod error;
pub mod id;
pub mod layout;
pub mod params;
pub mod traits;
pub mod types;

pub use chunk::MemChunk;
pub use error::{OutOfMemory, RestoreError, RetrieveError};
pub use id::EntityHandle;
pub use layout::{LengthEncoding, NativeLayout};
pub use params::{FactoryRef, GenericParams};
pub use traits::{DurableEntity, EntityFactoryProxy, RestorableAllocator};
pub use types::DurableType;
