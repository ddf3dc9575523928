//! Generational handle encoding.
//!
//! A handle packs a slot index and the slot's generation:
//!
//! ```text
//! bits 63..32  generation
//! bits 31..0   slot + 1   (never 0, so no handle is ever null)
//! ```
//!
//! Destroying a chunk bumps its slot's generation, so a handle kept from
//! before the destroy no longer resolves even after the slot is reused.

use durable_core::EntityHandle;

/// Pack a slot index and generation into a handle.
pub(crate) fn encode(slot: u32, generation: u32) -> EntityHandle {
    EntityHandle((u64::from(generation) << 32) | (u64::from(slot) + 1))
}

/// Split a handle into `(slot, generation)`.
///
/// Returns `None` for the null handle and for handles whose low half is zero.
pub(crate) fn decode(handle: EntityHandle) -> Option<(u32, u32)> {
    let low = (handle.0 & 0xffff_ffff) as u32;
    let slot = low.checked_sub(1)?;
    Some((slot, (handle.0 >> 32) as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_never_null() {
        assert!(!encode(0, 0).is_null());
        assert_eq!(encode(0, 0), EntityHandle(1));
    }

    #[test]
    fn decode_inverts_encode() {
        let h = encode(41, 7);
        assert_eq!(decode(h), Some((41, 7)));
    }

    #[test]
    fn null_does_not_decode() {
        assert_eq!(decode(EntityHandle::NULL), None);
        assert_eq!(decode(EntityHandle(5 << 32)), None);
    }
}
