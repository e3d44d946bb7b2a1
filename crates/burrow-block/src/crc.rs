//! CRC-32 framing for fixed-size blocks.
//!
//! Every block persisted through the block manager carries a little-endian
//! CRC-32/IEEE checksum of its payload in its first four bytes. This module
//! owns that placement: stamping, verification, and the packing of arbitrary
//! payloads into runs of CRC-prefixed blocks.

use crate::error::{BlockError, BlockResult};

/// Bytes reserved at the start of every block for the checksum.
pub const CRC_SIZE: usize = 4;

/// Compute the CRC over `block[CRC_SIZE..]` and store it little-endian in
/// `block[..CRC_SIZE]`.
pub fn stamp(block: &mut [u8]) {
    debug_assert!(block.len() >= CRC_SIZE);
    let crc = crc32fast::hash(&block[CRC_SIZE..]);
    block[..CRC_SIZE].copy_from_slice(&crc.to_le_bytes());
}

/// Recompute the CRC over `block[CRC_SIZE..]` and compare it against the
/// stored prefix.
pub fn verify(block: &[u8]) -> BlockResult<()> {
    debug_assert!(block.len() >= CRC_SIZE);
    let mut stored = [0u8; CRC_SIZE];
    stored.copy_from_slice(&block[..CRC_SIZE]);
    let expected = u32::from_le_bytes(stored);
    let actual = crc32fast::hash(&block[CRC_SIZE..]);
    if expected != actual {
        return Err(BlockError::CorruptBlock { expected, actual });
    }
    Ok(())
}

/// Pack `payload` into a run of CRC-stamped blocks.
///
/// The payload is split into `block_size - CRC_SIZE` byte chunks; each chunk
/// lands at offset `CRC_SIZE` of a fresh zeroed block, the final chunk is
/// zero-padded, and every block is stamped. The output length is always a
/// multiple of `block_size`; a trailing partial chunk still occupies a full
/// block.
pub fn frame_payload(payload: &[u8], block_size: usize) -> Vec<u8> {
    debug_assert!(block_size > CRC_SIZE);
    let data_per_block = block_size - CRC_SIZE;
    let framed_len = size_after_framing(payload.len(), block_size) as usize;
    let mut framed = Vec::with_capacity(framed_len);
    for chunk in payload.chunks(data_per_block) {
        let mut block = vec![0u8; block_size];
        block[CRC_SIZE..CRC_SIZE + chunk.len()].copy_from_slice(chunk);
        stamp(&mut block);
        framed.extend_from_slice(&block);
    }
    framed
}

/// Number of bytes [`frame_payload`] produces for an `n`-byte payload.
pub fn size_after_framing(n: usize, block_size: usize) -> u64 {
    let data_per_block = block_size - CRC_SIZE;
    n.div_ceil(data_per_block) as u64 * block_size as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK_SIZE: usize = 64;

    #[test]
    fn stamp_then_verify_roundtrip() {
        let mut block = vec![0u8; BLOCK_SIZE];
        block[10] = 0xAB;
        stamp(&mut block);
        verify(&block).unwrap();
    }

    #[test]
    fn verify_detects_payload_corruption() {
        let mut block = vec![0u8; BLOCK_SIZE];
        block[20] = 7;
        stamp(&mut block);
        block[20] ^= 0xFF;
        assert!(matches!(
            verify(&block),
            Err(BlockError::CorruptBlock { .. })
        ));
    }

    #[test]
    fn verify_detects_prefix_corruption() {
        let mut block = vec![0u8; BLOCK_SIZE];
        block[5] = 1;
        stamp(&mut block);
        block[0] ^= 0x01;
        assert!(verify(&block).is_err());
    }

    #[test]
    fn frame_produces_whole_stamped_blocks() {
        let payload: Vec<u8> = (0..150).map(|i| i as u8).collect();
        let framed = frame_payload(&payload, BLOCK_SIZE);

        assert_eq!(framed.len() % BLOCK_SIZE, 0);
        assert_eq!(framed.len() as u64, size_after_framing(payload.len(), BLOCK_SIZE));
        for block in framed.chunks(BLOCK_SIZE) {
            verify(block).unwrap();
        }
    }

    #[test]
    fn frame_zero_pads_the_final_block() {
        // 61 bytes of data: one full 60-byte chunk plus a single byte.
        let payload = vec![0xEE; 61];
        let framed = frame_payload(&payload, BLOCK_SIZE);
        assert_eq!(framed.len(), 2 * BLOCK_SIZE);

        let tail = &framed[BLOCK_SIZE..];
        assert_eq!(tail[CRC_SIZE], 0xEE);
        assert!(tail[CRC_SIZE + 1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn frame_reassembles_to_original_payload() {
        let payload: Vec<u8> = (0..200).map(|i| (i * 7) as u8).collect();
        let framed = frame_payload(&payload, BLOCK_SIZE);

        let mut reassembled = Vec::new();
        for block in framed.chunks(BLOCK_SIZE) {
            reassembled.extend_from_slice(&block[CRC_SIZE..]);
        }
        reassembled.truncate(payload.len());
        assert_eq!(reassembled, payload);
    }

    #[test]
    fn empty_payload_frames_to_nothing() {
        assert!(frame_payload(&[], BLOCK_SIZE).is_empty());
        assert_eq!(size_after_framing(0, BLOCK_SIZE), 0);
    }

    #[test]
    fn size_after_framing_boundaries() {
        let data = BLOCK_SIZE - CRC_SIZE;
        assert_eq!(size_after_framing(1, BLOCK_SIZE), BLOCK_SIZE as u64);
        assert_eq!(size_after_framing(data, BLOCK_SIZE), BLOCK_SIZE as u64);
        assert_eq!(size_after_framing(data + 1, BLOCK_SIZE), 2 * BLOCK_SIZE as u64);
        assert_eq!(
            size_after_framing(3 * data, BLOCK_SIZE),
            3 * BLOCK_SIZE as u64
        );
    }
}
