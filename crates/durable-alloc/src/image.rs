//! Persistent heap images.
//!
//! An image is everything a later process needs to resolve the same
//! handles to the same bytes. All integers are little-endian; chunk bodies
//! are copied verbatim, so cell contents keep the byte order they were
//! written in.
//!
//! ```text
//! [MAGIC "DURA"] [VERSION u8] [capacity u64]
//! [slot_count u32] [generation u32 × slot_count]
//! [free_count u32] [slot u32 × free_count]
//! [chunk_count u32] ([handle u64] [size u64] [body: size rounded up to 8 bytes]) × chunk_count
//! ```
//!
//! Auto-reclaim flags are not persisted: a policy belongs to the process
//! that set it, and a restored entity chooses its own.

use std::io::{Read, Write};

use durable_core::EntityHandle;

use crate::config::AllocatorConfig;
use crate::error::AllocError;
use crate::handle;
use crate::heap::{ChunkEntry, HeapAllocator, HeapState};
use crate::{FORMAT_VERSION, MAGIC};

// ── Primitive writers ───────────────────────────────────────────

fn write_u8(w: &mut dyn Write, v: u8) -> Result<(), AllocError> {
    w.write_all(&[v])?;
    Ok(())
}

fn write_u32_le(w: &mut dyn Write, v: u32) -> Result<(), AllocError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_u64_le(w: &mut dyn Write, v: u64) -> Result<(), AllocError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_len(w: &mut dyn Write, len: usize, what: &str) -> Result<(), AllocError> {
    let len = u32::try_from(len).map_err(|_| AllocError::Malformed {
        detail: format!("too many {what} for one image: {len}"),
    })?;
    write_u32_le(w, len)
}

// ── Primitive readers ───────────────────────────────────────────

fn read_u8(r: &mut dyn Read) -> Result<u8, AllocError> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u32_le(r: &mut dyn Read) -> Result<u32, AllocError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64_le(r: &mut dyn Read) -> Result<u64, AllocError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn malformed(detail: impl Into<String>) -> AllocError {
    AllocError::Malformed {
        detail: detail.into(),
    }
}

impl HeapAllocator {
    /// Write every live chunk to `w`.
    ///
    /// Call [`close`](Self::close) first to drop chunks whose owners asked
    /// to be reclaimed at exit.
    pub fn save(&self, w: &mut dyn Write) -> Result<(), AllocError> {
        let state = self.inner.borrow();

        w.write_all(&MAGIC)?;
        write_u8(w, FORMAT_VERSION)?;
        write_u64_le(w, state.config.capacity_bytes)?;

        write_len(w, state.generations.len(), "handle slots")?;
        for &generation in &state.generations {
            write_u32_le(w, generation)?;
        }

        write_len(w, state.free_list.len(), "free slots")?;
        for &slot in &state.free_list {
            write_u32_le(w, slot)?;
        }

        write_len(w, state.chunks.len(), "chunks")?;
        for (handle, entry) in &state.chunks {
            write_u64_le(w, handle.get())?;
            write_u64_le(w, entry.size)?;
            for word in entry.words.iter() {
                w.write_all(&word.to_ne_bytes())?;
            }
        }

        tracing::debug!(
            chunks = state.chunks.len(),
            used = state.used_bytes,
            "saved heap image"
        );
        Ok(())
    }

    /// Rebuild a heap from an image written by [`save`](Self::save).
    ///
    /// Chunks land at new addresses but keep their handles and contents.
    pub fn load(r: &mut dyn Read) -> Result<Self, AllocError> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(AllocError::InvalidMagic);
        }
        let version = read_u8(r)?;
        if version != FORMAT_VERSION {
            return Err(AllocError::UnsupportedVersion { found: version });
        }

        let capacity_bytes = read_u64_le(r)?;
        let mut state = HeapState::new(AllocatorConfig::new(capacity_bytes));

        let slot_count = read_u32_le(r)?;
        for _ in 0..slot_count {
            state.generations.push(read_u32_le(r)?);
        }

        let free_count = read_u32_le(r)?;
        for _ in 0..free_count {
            let slot = read_u32_le(r)?;
            if slot >= slot_count {
                return Err(malformed(format!(
                    "free slot {slot} outside {slot_count} slots"
                )));
            }
            state.free_list.push(slot);
        }

        let chunk_count = read_u32_le(r)?;
        for _ in 0..chunk_count {
            let handle = EntityHandle(read_u64_le(r)?);
            let (slot, generation) = handle::decode(handle)
                .ok_or_else(|| malformed(format!("chunk with invalid handle {handle}")))?;
            if state.generations.get(slot as usize) != Some(&generation) {
                return Err(malformed(format!(
                    "chunk handle {handle} does not match its slot generation"
                )));
            }
            if state.free_list.contains(&slot) {
                return Err(malformed(format!("chunk handle {handle} names a free slot")));
            }

            let size = read_u64_le(r)?;
            // Nothing is allocated for a chunk the heap could not hold.
            let remaining = capacity_bytes.saturating_sub(state.used_bytes);
            let reserved = AllocatorConfig::reserved_bytes(size)
                .filter(|&reserved| reserved <= remaining)
                .ok_or_else(|| {
                    malformed(format!(
                        "chunk {handle} of {size} bytes exceeds the {remaining} bytes left \
                         in a heap of {capacity_bytes}"
                    ))
                })?;
            let mut entry = ChunkEntry::zeroed(size)
                .ok_or_else(|| malformed(format!("chunk {handle} too large: {size} bytes")))?;
            for word in entry.words.iter_mut() {
                let mut buf = [0u8; 8];
                r.read_exact(&mut buf)?;
                *word = u64::from_ne_bytes(buf);
            }

            state.used_bytes += reserved;
            if state.chunks.insert(handle, entry).is_some() {
                return Err(malformed(format!("duplicate chunk handle {handle}")));
            }
        }

        tracing::debug!(
            chunks = state.chunks.len(),
            used = state.used_bytes,
            "loaded heap image"
        );
        Ok(Self::from_state(state))
    }
}

#[cfg(test)]
mod tests {
    use durable_core::RestorableAllocator;

    use super::*;

    fn saved(heap: &HeapAllocator) -> Vec<u8> {
        let mut buf = Vec::new();
        heap.save(&mut buf).unwrap();
        buf
    }

    #[test]
    fn load_preserves_handles_and_bytes() {
        let heap = HeapAllocator::new(AllocatorConfig::new(1024));
        let a = heap.allocate_chunk(16, false).unwrap();
        let b = heap.allocate_chunk(5, false).unwrap();
        let before_a = heap.read_bytes(a.handle()).unwrap();

        let image = saved(&heap);
        let loaded = HeapAllocator::load(&mut image.as_slice()).unwrap();

        assert_eq!(loaded.live_chunks(), 2);
        assert_eq!(loaded.used_bytes(), heap.used_bytes());
        assert_eq!(loaded.config(), heap.config());
        assert_eq!(loaded.read_bytes(a.handle()).unwrap(), before_a);
        let b2 = loaded.retrieve_chunk(b.handle(), false).unwrap();
        assert_eq!(b2.size(), 5);
    }

    #[test]
    fn load_keeps_stale_handles_stale() {
        let heap = HeapAllocator::default();
        let dead = heap.allocate_chunk(8, false).unwrap();
        let stale = dead.handle();
        heap.destroy_chunk(dead);

        let loaded = HeapAllocator::load(&mut saved(&heap).as_slice()).unwrap();
        assert!(loaded.retrieve_chunk(stale, false).is_none());
        let fresh = loaded.allocate_chunk(8, false).unwrap();
        assert_ne!(fresh.handle(), stale);
    }

    #[test]
    fn auto_reclaim_flags_are_not_persisted() {
        let heap = HeapAllocator::default();
        let chunk = heap.allocate_chunk(8, true).unwrap();
        let loaded = HeapAllocator::load(&mut saved(&heap).as_slice()).unwrap();
        assert_eq!(loaded.is_auto_reclaim(chunk.handle()), Some(false));
    }

    #[test]
    fn bad_magic_rejected() {
        let mut image = saved(&HeapAllocator::default());
        image[0] = b'X';
        let err = HeapAllocator::load(&mut image.as_slice()).err().unwrap();
        assert!(matches!(err, AllocError::InvalidMagic));
    }

    #[test]
    fn future_version_rejected() {
        let mut image = saved(&HeapAllocator::default());
        image[4] = FORMAT_VERSION + 1;
        let err = HeapAllocator::load(&mut image.as_slice()).err().unwrap();
        assert!(matches!(err, AllocError::UnsupportedVersion { found } if found == FORMAT_VERSION + 1));
    }

    #[test]
    fn truncated_image_is_an_io_error() {
        let heap = HeapAllocator::default();
        heap.allocate_chunk(64, false).unwrap();
        let image = saved(&heap);
        let cut = &image[..image.len() - 3];
        let err = HeapAllocator::load(&mut &cut[..]).err().unwrap();
        assert!(matches!(err, AllocError::Io(_)));
    }

    #[test]
    fn image_over_capacity_is_malformed() {
        let heap = HeapAllocator::new(AllocatorConfig::new(64));
        heap.allocate_chunk(64, false).unwrap();
        let mut image = saved(&heap);
        // Shrink the recorded capacity below what is live.
        image[5..13].copy_from_slice(&8u64.to_le_bytes());
        let err = HeapAllocator::load(&mut image.as_slice()).err().unwrap();
        assert!(matches!(err, AllocError::Malformed { .. }));
    }

    #[test]
    fn oversized_chunk_claim_is_malformed_before_allocation() {
        let mut image = Vec::new();
        image.extend_from_slice(&MAGIC);
        image.push(FORMAT_VERSION);
        image.extend_from_slice(&64u64.to_le_bytes());
        // One slot at generation 0, none free.
        image.extend_from_slice(&1u32.to_le_bytes());
        image.extend_from_slice(&0u32.to_le_bytes());
        image.extend_from_slice(&0u32.to_le_bytes());
        // One chunk claiming 2^60 bytes and carrying none of them.
        image.extend_from_slice(&1u32.to_le_bytes());
        image.extend_from_slice(&handle::encode(0, 0).get().to_le_bytes());
        image.extend_from_slice(&(1u64 << 60).to_le_bytes());

        let err = HeapAllocator::load(&mut image.as_slice()).err().unwrap();
        assert!(matches!(err, AllocError::Malformed { ref detail } if detail.contains("exceeds")));
    }

    #[test]
    fn chunks_that_together_exceed_capacity_are_malformed() {
        let heap = HeapAllocator::new(AllocatorConfig::new(64));
        heap.allocate_chunk(32, false).unwrap();
        heap.allocate_chunk(32, false).unwrap();
        let mut image = saved(&heap);
        image[5..13].copy_from_slice(&40u64.to_le_bytes());
        let err = HeapAllocator::load(&mut image.as_slice()).err().unwrap();
        assert!(matches!(err, AllocError::Malformed { .. }));
    }
}
