//! Static on-memory layout descriptors.
//!
//! Generic durable-entity tooling (image inspectors, migration helpers)
//! reads these tables to walk a chunk without knowing the entity type.

/// Where the element count of a durable container is recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LengthEncoding {
    /// Implicit: `chunk.size / cell_width`.
    ChunkSize,
}

/// Layout of a durable entity's chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NativeLayout {
    /// Width of each cell in bytes.
    pub cell_width: u32,
    /// Bytes before the first cell.
    pub header_bytes: u32,
    /// Bytes after the last cell.
    pub trailer_bytes: u32,
    /// How the cell count is derived.
    pub length: LengthEncoding,
}

impl NativeLayout {
    /// Number of whole cells a chunk of `chunk_size` bytes holds.
    pub fn cell_count(&self, chunk_size: u64) -> u64 {
        let body = chunk_size.saturating_sub(u64::from(self.header_bytes + self.trailer_bytes));
        match self.length {
            LengthEncoding::ChunkSize => body / u64::from(self.cell_width.max(1)),
        }
    }

    /// Offset of cell `index` from the chunk base.
    pub fn cell_offset(&self, index: u64) -> u64 {
        u64::from(self.header_bytes) + index * u64::from(self.cell_width)
    }
}
