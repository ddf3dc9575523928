//! Error types for durable entities.
//!
//! One type per failure domain: allocation ([`OutOfMemory`]), recovery
//! from a handle ([`RestoreError`]), and indexed access ([`RetrieveError`]).
//! Every failure leaves the entity in its prior state.

use thiserror::Error;

use crate::id::EntityHandle;
use crate::types::DurableType;

/// The allocator could not satisfy a create request.
///
/// Callers that own the allocator may grow the backing pool and retry.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("out of durable memory: could not allocate {requested} bytes")]
pub struct OutOfMemory {
    /// Number of bytes requested.
    pub requested: u64,
}

/// Errors from recovering a durable entity through its handle.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RestoreError {
    /// The handle was zero.
    #[error("null handle")]
    NullHandle,
    /// The allocator has no chunk under this handle.
    #[error("retrieve failure: no chunk for handle {handle}")]
    RetrieveFailure {
        /// The handle that could not be resolved.
        handle: EntityHandle,
    },
    /// The chunk was found but its contents are not a valid entity.
    #[error("invalid durable state: {reason}")]
    Invalid {
        /// Description of what was wrong.
        reason: String,
    },
}

/// Errors from reading or writing an element of a durable container.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RetrieveError {
    /// The index is not in `[0, size)`.
    #[error("index out of range: {index} >= {size}")]
    IndexOutOfRange {
        /// The requested index.
        index: u32,
        /// The container size.
        size: u32,
    },
    /// The container was built without an element type descriptor.
    #[error("missing element type")]
    MissingElementType,
    /// A `Durable` element type was declared without a factory.
    #[error("missing element factory")]
    MissingFactory,
    /// The value written does not match the container's element type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// The declared element type.
        expected: DurableType,
        /// The type of the rejected value.
        found: DurableType,
    },
    /// The slot for an in-range index could not be produced, or the
    /// container's chunk has already been released.
    #[error("slot {index} unavailable")]
    SlotUnavailable {
        /// The index whose slot is missing.
        index: u32,
    },
    /// Materializing a referenced element failed.
    #[error("element restore failed: {0}")]
    Element(#[from] RestoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_keep_short_reasons() {
        assert_eq!(RestoreError::NullHandle.to_string(), "null handle");
        assert!(RestoreError::RetrieveFailure {
            handle: EntityHandle(3)
        }
        .to_string()
        .starts_with("retrieve failure"));
        assert!(RetrieveError::IndexOutOfRange { index: 4, size: 4 }
            .to_string()
            .starts_with("index out of range"));
        assert_eq!(
            RetrieveError::MissingElementType.to_string(),
            "missing element type"
        );
    }

    #[test]
    fn restore_error_converts_into_retrieve_error() {
        let err: RetrieveError = RestoreError::NullHandle.into();
        assert_eq!(err, RetrieveError::Element(RestoreError::NullHandle));
        assert!(std::error::Error::source(&err).is_some());
    }
}
