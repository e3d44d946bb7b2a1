//! The single gateway through which persistent components read and write
//! bytes.
//!
//! A [`BlockManager`] is stateless between calls apart from its block cache
//! and its per-file lock table. It is shared across threads behind an `Arc`;
//! the per-file lock serializes a writer against readers of the same file so
//! no reader can observe a torn block, while writers on different files
//! proceed in parallel.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::debug;

use crate::address::BlockAddress;
use crate::cache::BlockCache;
use crate::config::BlockConfig;
use crate::crc::{self, CRC_SIZE};
use crate::error::{BlockError, BlockResult};
use crate::locks::FileLockTable;

/// Fixed-size block I/O with write-through caching and per-file locking.
pub struct BlockManager {
    config: BlockConfig,
    cache: BlockCache,
    locks: FileLockTable,
}

impl BlockManager {
    pub fn new(config: BlockConfig) -> BlockResult<Self> {
        config.validate()?;
        let cache = BlockCache::new(config.cache_capacity);
        Ok(Self {
            config,
            cache,
            locks: FileLockTable::new(),
        })
    }

    /// Block size in bytes, CRC prefix included.
    pub fn block_size(&self) -> usize {
        self.config.block_size
    }

    /// Read the full block at `addr`, CRC prefix included.
    ///
    /// Served from the cache when possible. A read past the current end of
    /// file succeeds with the missing tail zero-filled, so short reads on a
    /// file's tail block behave like reads of not-yet-written slots.
    pub fn read_block(&self, addr: &BlockAddress) -> BlockResult<Vec<u8>> {
        if let Some(block) = self.cache.get(addr) {
            return Ok(block);
        }

        let lock = self.locks.lock_for(&addr.file);
        let _guard = lock.read();

        // Another reader may have populated the cache while we waited.
        if let Some(block) = self.cache.get(addr) {
            return Ok(block);
        }

        let mut file = match File::open(&addr.file) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(BlockError::NotFound(addr.file.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        file.seek(SeekFrom::Start(addr.byte_offset(self.block_size())))?;

        let mut block = vec![0u8; self.block_size()];
        read_up_to(&mut file, &mut block)?;

        self.cache.insert(addr.clone(), block.clone());
        Ok(block)
    }

    /// Write one full block at `addr`, creating the file if absent.
    ///
    /// The bytes also land in the cache write-through. No fsync is issued
    /// here; durability is best-effort at this layer.
    pub fn write_block(&self, addr: &BlockAddress, block: &[u8]) -> BlockResult<()> {
        if block.len() != self.block_size() {
            return Err(BlockError::BadBlockLength {
                expected: self.block_size(),
                actual: block.len(),
            });
        }

        let lock = self.locks.lock_for(&addr.file);
        let _guard = lock.write();

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&addr.file)?;
        file.seek(SeekFrom::Start(addr.byte_offset(self.block_size())))?;
        file.write_all(block)?;

        self.cache.insert(addr.clone(), block.to_vec());
        Ok(())
    }

    /// Write pre-framed bytes as consecutive blocks starting at
    /// `start_byte_offset`.
    ///
    /// `framed` must be laid out by [`crc::frame_payload`]: its length and
    /// the start offset must both be multiples of the block size, and every
    /// block must already carry its CRC.
    pub fn write_to_disk(
        &self,
        framed: &[u8],
        file: &Path,
        start_byte_offset: u64,
    ) -> BlockResult<()> {
        let block_size = self.block_size();
        if framed.len() % block_size != 0 || start_byte_offset % block_size as u64 != 0 {
            return Err(BlockError::UnalignedFrame {
                len: framed.len(),
                offset: start_byte_offset,
                block_size,
            });
        }

        let first_index = start_byte_offset / block_size as u64;
        for (i, block) in framed.chunks(block_size).enumerate() {
            let addr = BlockAddress::new(file, first_index + i as u64);
            self.write_block(&addr, block)?;
        }
        Ok(())
    }

    /// Read `logical_size` payload bytes starting at physical offset
    /// `start_byte_offset`, skipping and verifying the CRC prefix of every
    /// block touched.
    ///
    /// An offset that falls inside a block's CRC area is advanced to that
    /// block's first payload byte. Returns the payload together with the next
    /// physical offset; callers chain consecutive reads with it.
    pub fn read_from_disk(
        &self,
        file: &Path,
        start_byte_offset: u64,
        logical_size: usize,
    ) -> BlockResult<(Vec<u8>, u64)> {
        let block_size = self.block_size() as u64;
        let mut offset = start_byte_offset;
        let mut payload = Vec::with_capacity(logical_size);

        while payload.len() < logical_size {
            // Never start inside a CRC prefix.
            if offset % block_size < CRC_SIZE as u64 {
                offset = offset - offset % block_size + CRC_SIZE as u64;
            }

            let index = offset / block_size;
            let block = self.read_block(&BlockAddress::new(file, index))?;
            crc::verify(&block)?;

            let in_block = (offset % block_size) as usize;
            let take = (logical_size - payload.len()).min(self.block_size() - in_block);
            payload.extend_from_slice(&block[in_block..in_block + take]);
            offset += take as u64;
        }

        Ok((payload, offset))
    }

    /// Drop the per-file lock entry and every cached block for `file`.
    ///
    /// Callers invoke this when they delete the file; the lock table and
    /// cache hold their entries until told otherwise.
    pub fn release_file(&self, file: &Path) {
        self.cache.remove_file(file);
        self.locks.release(file);
        debug!(file = %file.display(), "released block file");
    }
}

/// Fill `buf` from `file`, tolerating EOF: a short read leaves the zeroed
/// tail of `buf` in place.
fn read_up_to(file: &mut File, buf: &mut [u8]) -> io::Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
