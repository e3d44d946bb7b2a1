//! Shared persistence convention for probabilistic sidecar files.
//!
//! HyperLogLog, SimHash, Count-Min and Bloom sidecars all serialize to an
//! opaque byte string and persist it as `length: u64 LE | payload`, CRC-framed
//! into whole blocks. These helpers keep the convention in one place; the
//! sketches themselves live outside this crate and only ever see bytes.

use std::path::Path;

use crate::crc;
use crate::error::BlockResult;
use crate::manager::BlockManager;

/// Persist `payload` to `file` under the length-prefixed sidecar convention.
///
/// The file is overwritten from offset 0.
pub fn write_sidecar(manager: &BlockManager, file: &Path, payload: &[u8]) -> BlockResult<()> {
    let mut bytes = Vec::with_capacity(8 + payload.len());
    bytes.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    bytes.extend_from_slice(payload);
    let framed = crc::frame_payload(&bytes, manager.block_size());
    manager.write_to_disk(&framed, file, 0)
}

/// Read back a payload persisted by [`write_sidecar`].
///
/// Reads the 8-byte length first, then chains a second read from the physical
/// offset the first one returned. Block CRCs are hidden from both reads.
pub fn read_sidecar(manager: &BlockManager, file: &Path) -> BlockResult<Vec<u8>> {
    let (len_bytes, next) = manager.read_from_disk(file, 0, 8)?;
    let mut len = [0u8; 8];
    len.copy_from_slice(&len_bytes);
    let len = u64::from_le_bytes(len) as usize;

    let (payload, _) = manager.read_from_disk(file, next, len)?;
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BlockConfig;

    fn manager() -> BlockManager {
        BlockManager::new(BlockConfig {
            block_size: 128,
            cache_capacity: 8,
        })
        .unwrap()
    }

    #[test]
    fn sidecar_roundtrip_small() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bloom_users.db");
        let mgr = manager();

        let payload = b"sketch bytes".to_vec();
        write_sidecar(&mgr, &file, &payload).unwrap();
        assert_eq!(read_sidecar(&mgr, &file).unwrap(), payload);
    }

    #[test]
    fn sidecar_roundtrip_spans_many_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("cms_events.db");
        let mgr = manager();

        let payload: Vec<u8> = (0..5000).map(|i| (i % 241) as u8).collect();
        write_sidecar(&mgr, &file, &payload).unwrap();
        assert_eq!(read_sidecar(&mgr, &file).unwrap(), payload);
    }

    #[test]
    fn sidecar_roundtrip_empty_payload() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("hll_empty.db");
        let mgr = manager();

        write_sidecar(&mgr, &file, &[]).unwrap();
        assert!(read_sidecar(&mgr, &file).unwrap().is_empty());
    }

    #[test]
    fn rewrite_replaces_previous_payload() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("simhash_docs.db");
        let mgr = manager();

        write_sidecar(&mgr, &file, &vec![1u8; 700]).unwrap();
        write_sidecar(&mgr, &file, b"short").unwrap();
        assert_eq!(read_sidecar(&mgr, &file).unwrap(), b"short");
    }
}
