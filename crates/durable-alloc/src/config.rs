//! Allocator configuration parameters.

/// Configuration for a [`HeapAllocator`](crate::HeapAllocator).
///
/// Validated at construction; immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocatorConfig {
    /// Maximum number of bytes live at once, summed over chunks rounded up
    /// to whole 8-byte words.
    ///
    /// Default: 64 MiB. Allocations past this limit fail and surface as
    /// `OutOfMemory` in the requesting entity.
    pub capacity_bytes: u64,
}

impl AllocatorConfig {
    /// Default capacity: 64 MiB.
    pub const DEFAULT_CAPACITY_BYTES: u64 = 64 * 1024 * 1024;

    /// Create a config with the given capacity.
    pub fn new(capacity_bytes: u64) -> Self {
        Self { capacity_bytes }
    }

    /// Bytes actually reserved for a request of `bytes` bytes.
    pub fn reserved_bytes(bytes: u64) -> Option<u64> {
        bytes.checked_add(7).map(|b| b & !7)
    }
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY_BYTES)
    }
}
