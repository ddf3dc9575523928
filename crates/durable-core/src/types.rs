//! Durable element type descriptors.

use std::fmt;

/// How the 8 bytes of a durable cell are interpreted.
///
/// Primitive types are stored in place, zero-padded to the full cell width.
/// Reference types store the allocator handle of a separately allocated
/// chunk; an all-zero cell is the null reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DurableType {
    /// `bool`, stored as 0 or 1.
    Boolean,
    /// `char`, stored as its Unicode scalar value.
    Character,
    /// `i8`.
    Byte,
    /// `i16`.
    Short,
    /// `i32`.
    Integer,
    /// `i64`.
    Long,
    /// `f32`, stored as its IEEE-754 bits.
    Float,
    /// `f64`, stored as its IEEE-754 bits.
    Double,
    /// A durable UTF-8 string held in its own chunk.
    String,
    /// A nested durable entity materialized through a factory.
    Durable,
    /// A raw chunk owned through its handle.
    Chunk,
}

impl DurableType {
    /// Whether values of this type live directly in the cell.
    pub fn is_primitive(self) -> bool {
        !self.is_reference()
    }

    /// Whether the cell holds an allocator handle.
    pub fn is_reference(self) -> bool {
        matches!(self, Self::String | Self::Durable | Self::Chunk)
    }

    /// Number of meaningful bytes in the cell for primitive types.
    ///
    /// Reference types always use the full 8 bytes.
    pub fn value_width(self) -> u32 {
        match self {
            Self::Boolean | Self::Byte => 1,
            Self::Short => 2,
            Self::Character | Self::Integer | Self::Float => 4,
            Self::Long | Self::Double | Self::String | Self::Durable | Self::Chunk => 8,
        }
    }
}

impl fmt::Display for DurableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Boolean => "boolean",
            Self::Character => "character",
            Self::Byte => "byte",
            Self::Short => "short",
            Self::Integer => "integer",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::String => "string",
            Self::Durable => "durable",
            Self::Chunk => "chunk",
        };
        f.write_str(name)
    }
}
