//! Values held by durable cells.

use std::fmt;

use durable_core::{
    DurableEntity, DurableType, EntityHandle, MemChunk, RestorableAllocator, RestoreError,
    RetrieveError,
};

use crate::string::DurableString;

/// An element of a durable container.
///
/// Primitive variants are copied in and out of their cell. Reference
/// variants wrap a separately allocated entity; the cell holds only its
/// handle.
pub enum GenericValue<A: RestorableAllocator> {
    /// [`DurableType::Boolean`].
    Boolean(bool),
    /// [`DurableType::Character`].
    Character(char),
    /// [`DurableType::Byte`].
    Byte(i8),
    /// [`DurableType::Short`].
    Short(i16),
    /// [`DurableType::Integer`].
    Integer(i32),
    /// [`DurableType::Long`].
    Long(i64),
    /// [`DurableType::Float`].
    Float(f32),
    /// [`DurableType::Double`].
    Double(f64),
    /// [`DurableType::String`].
    String(DurableString<A>),
    /// [`DurableType::Durable`]: any entity, materialized through a factory.
    Durable(Box<dyn DurableEntity<A>>),
    /// [`DurableType::Chunk`].
    Chunk(MemChunk),
}

impl<A: RestorableAllocator> GenericValue<A> {
    /// Wrap a durable entity.
    pub fn entity(entity: impl DurableEntity<A>) -> Self {
        Self::Durable(Box::new(entity))
    }

    /// The element type this value belongs to.
    pub fn durable_type(&self) -> DurableType {
        match self {
            Self::Boolean(_) => DurableType::Boolean,
            Self::Character(_) => DurableType::Character,
            Self::Byte(_) => DurableType::Byte,
            Self::Short(_) => DurableType::Short,
            Self::Integer(_) => DurableType::Integer,
            Self::Long(_) => DurableType::Long,
            Self::Float(_) => DurableType::Float,
            Self::Double(_) => DurableType::Double,
            Self::String(_) => DurableType::String,
            Self::Durable(_) => DurableType::Durable,
            Self::Chunk(_) => DurableType::Chunk,
        }
    }

    /// The referenced handle, for reference variants.
    pub fn handle(&self) -> Option<EntityHandle> {
        match self {
            Self::String(s) => Some(s.handle()),
            Self::Durable(e) => Some(e.handle()),
            Self::Chunk(c) => Some(c.handle()),
            _ => None,
        }
    }

    /// Encode into cell bits.
    ///
    /// Primitives are zero-extended from their width; references become
    /// their handle.
    pub(crate) fn encode(&self) -> u64 {
        match self {
            Self::Boolean(v) => u64::from(*v),
            Self::Character(v) => u64::from(u32::from(*v)),
            Self::Byte(v) => u64::from(*v as u8),
            Self::Short(v) => u64::from(*v as u16),
            Self::Integer(v) => u64::from(*v as u32),
            Self::Long(v) => *v as u64,
            Self::Float(v) => u64::from(v.to_bits()),
            Self::Double(v) => v.to_bits(),
            Self::String(_) | Self::Durable(_) | Self::Chunk(_) => {
                self.handle().map_or(0, EntityHandle::get)
            }
        }
    }

    /// Decode cell bits of a primitive type. Only the low
    /// [`value_width`](DurableType::value_width) bytes are meaningful.
    ///
    /// Returns `Ok(None)` for reference types, which need an allocator.
    pub(crate) fn decode_primitive(ty: DurableType, bits: u64) -> Result<Option<Self>, RetrieveError> {
        let value = match ty {
            DurableType::Boolean => Self::Boolean(bits as u8 != 0),
            DurableType::Character => {
                let c = char::from_u32(bits as u32).ok_or_else(|| RestoreError::Invalid {
                    reason: format!("cell {bits:#x} is not a character"),
                })?;
                Self::Character(c)
            }
            DurableType::Byte => Self::Byte(bits as u8 as i8),
            DurableType::Short => Self::Short(bits as u16 as i16),
            DurableType::Integer => Self::Integer(bits as u32 as i32),
            DurableType::Long => Self::Long(bits as i64),
            DurableType::Float => Self::Float(f32::from_bits(bits as u32)),
            DurableType::Double => Self::Double(f64::from_bits(bits)),
            DurableType::String | DurableType::Durable | DurableType::Chunk => return Ok(None),
        };
        Ok(Some(value))
    }

    /// Apply a reclaim policy to the wrapped entity.
    pub(crate) fn set_auto_reclaim(&mut self, on: bool, allocator: &A) {
        match self {
            Self::String(s) => s.set_auto_reclaim(on),
            Self::Durable(e) => e.set_auto_reclaim(on),
            Self::Chunk(c) => {
                if on {
                    allocator.register_auto_reclaim(c);
                } else {
                    allocator.cancel_auto_reclaim(c);
                }
            }
            _ => {}
        }
    }

    /// Release whatever the value references.
    pub(crate) fn destroy(self, allocator: &A) -> Result<(), RetrieveError> {
        match self {
            Self::String(s) => {
                s.destroy();
                Ok(())
            }
            Self::Durable(e) => e.destroy(),
            Self::Chunk(c) => {
                allocator.destroy_chunk(c);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// The value as `bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as `char`.
    pub fn as_char(&self) -> Option<char> {
        match self {
            Self::Character(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as `i8`.
    pub fn as_byte(&self) -> Option<i8> {
        match self {
            Self::Byte(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as `i16`.
    pub fn as_short(&self) -> Option<i16> {
        match self {
            Self::Short(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as `i32`.
    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as `i64`.
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Self::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as `f32`.
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as `f64`.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// The text of a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// The chunk of a chunk value.
    pub fn as_chunk(&self) -> Option<&MemChunk> {
        match self {
            Self::Chunk(c) => Some(c),
            _ => None,
        }
    }

    /// Downcast a durable entity to its concrete type.
    pub fn as_entity<T: DurableEntity<A>>(&self) -> Option<&T> {
        match self {
            Self::Durable(e) => e.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Mutable form of [`as_entity`](Self::as_entity).
    pub fn as_entity_mut<T: DurableEntity<A>>(&mut self) -> Option<&mut T> {
        match self {
            Self::Durable(e) => e.as_any_mut().downcast_mut::<T>(),
            _ => None,
        }
    }
}

impl<A: RestorableAllocator> fmt::Debug for GenericValue<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(v) => f.debug_tuple("Boolean").field(v).finish(),
            Self::Character(v) => f.debug_tuple("Character").field(v).finish(),
            Self::Byte(v) => f.debug_tuple("Byte").field(v).finish(),
            Self::Short(v) => f.debug_tuple("Short").field(v).finish(),
            Self::Integer(v) => f.debug_tuple("Integer").field(v).finish(),
            Self::Long(v) => f.debug_tuple("Long").field(v).finish(),
            Self::Float(v) => f.debug_tuple("Float").field(v).finish(),
            Self::Double(v) => f.debug_tuple("Double").field(v).finish(),
            Self::String(s) => f.debug_tuple("String").field(&s.as_str()).finish(),
            Self::Durable(e) => f.debug_tuple("Durable").field(&e.handle()).finish(),
            Self::Chunk(c) => f.debug_tuple("Chunk").field(c).finish(),
        }
    }
}

macro_rules! impl_from_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl<A: RestorableAllocator> From<$ty> for GenericValue<A> {
                fn from(v: $ty) -> Self {
                    Self::$variant(v)
                }
            }
        )*
    };
}

impl_from_primitive! {
    bool => Boolean,
    char => Character,
    i8 => Byte,
    i16 => Short,
    i32 => Integer,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    MemChunk => Chunk,
}

impl<A: RestorableAllocator> From<DurableString<A>> for GenericValue<A> {
    fn from(s: DurableString<A>) -> Self {
        Self::String(s)
    }
}
