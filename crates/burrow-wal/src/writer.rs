//! Append path of the write-ahead log.
//!
//! Records arrive as opaque byte strings and are staged in an in-memory
//! active block. A record that fits the remainder of the block is written in
//! place as a single FULL fragment; a larger one is split into
//! FIRST/MIDDLE/LAST fragments, one per block, all inside one segment. Full
//! blocks are CRC-stamped and handed to the shared [`BlockManager`]; segments
//! roll at a fixed block count.
//!
//! Durability contract: every flushed block survives a crash; bytes that are
//! only in the active block at crash time are lost. A clean [`close`]
//! flushes the active block and persists the resume offset, so the next
//! [`open`] continues appending in the middle of that same block.
//!
//! [`open`]: WalWriter::open
//! [`close`]: WalWriter::close

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use burrow_block::crc::{self, CRC_SIZE};
use burrow_block::{BlockAddress, BlockManager};
use tracing::debug;

use crate::config::WalConfig;
use crate::error::{WalError, WalResult};
use crate::header::{FragmentHeader, FragmentKind, HEADER_SIZE};
use crate::metadata::WalMetadata;

/// Append-only writer over segmented, fragment-encoded log files.
///
/// Single-owner: exactly one thread drives `append`/`close` on an instance.
/// The writer owns the active block buffer and the durability metadata
/// sidecar; everything it flushes goes through the shared block manager.
pub struct WalWriter {
    manager: Arc<BlockManager>,
    config: WalConfig,
    /// Active block being filled; always `block_size` long.
    buffer: Vec<u8>,
    /// Next byte to write within the active block; never below `CRC_SIZE`.
    write_offset: usize,
    /// Blocks already flushed into the active segment.
    blocks_in_segment: u64,
    /// Segment currently receiving flushes.
    active_segment: u64,
    /// Oldest segment still on disk.
    first_segment: u64,
}

impl WalWriter {
    /// Open the log in `config.dir`, creating the directory when missing.
    ///
    /// Existing segments are discovered by name. A clean-shutdown sidecar
    /// lets the writer reload the last flushed block and resume appending
    /// mid-block; the sidecar is then rewritten unclean, so a crash from
    /// here on loses only the active block.
    pub fn open(manager: Arc<BlockManager>, config: WalConfig) -> WalResult<Self> {
        fs::create_dir_all(&config.dir)?;

        let block_size = manager.block_size();
        let (first_segment, active_segment) = discover_segments(&config.dir)?;
        let active_len = match fs::metadata(segment_path(&config.dir, active_segment)) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };

        let mut writer = Self {
            manager,
            config,
            buffer: vec![0u8; block_size],
            write_offset: CRC_SIZE,
            blocks_in_segment: active_len / block_size as u64,
            active_segment,
            first_segment,
        };
        // A clean sidecar may reload the last flushed block, re-opening a
        // slot even in a segment that sits at capacity; only afterwards can
        // we tell whether the next flush belongs to a fresh segment.
        let metadata = WalMetadata::load(&writer.config.dir)?;
        if metadata.clean_shutdown {
            writer.resume_from(metadata.resume_write_offset)?;
        }
        if writer.blocks_in_segment >= writer.config.segment_blocks {
            writer.roll_segment();
        }
        WalMetadata::unclean().store(&writer.config.dir)?;

        debug!(
            first = writer.first_segment,
            active = writer.active_segment,
            blocks = writer.blocks_in_segment,
            offset = writer.write_offset,
            "WAL opened"
        );
        Ok(writer)
    }

    /// Continue appending where a clean shutdown left off.
    fn resume_from(&mut self, resume_offset: u64) -> WalResult<()> {
        let block_size = self.manager.block_size() as u64;
        if resume_offset >= block_size || resume_offset <= CRC_SIZE as u64 {
            // The last block was exactly full (or never touched): keep the
            // fresh buffer and append into the next slot.
            return Ok(());
        }
        if self.blocks_in_segment == 0 {
            // Sidecar from before any flush; nothing to reload.
            return Ok(());
        }

        // Reload the last flushed block and keep filling it; the next flush
        // rewrites the same slot.
        self.blocks_in_segment -= 1;
        let addr = BlockAddress::new(
            segment_path(&self.config.dir, self.active_segment),
            self.blocks_in_segment,
        );
        let block = self.manager.read_block(&addr)?;
        crc::verify(&block)?;
        self.buffer = block;
        self.write_offset = resume_offset as usize;
        Ok(())
    }

    /// Append one logical record, returning the segment it landed in.
    pub fn append(&mut self, payload: &[u8]) -> WalResult<u64> {
        let block_size = self.manager.block_size();
        let need = HEADER_SIZE + payload.len();

        // Fits in the remainder of the active block: a single FULL fragment
        // in place. Capture the segment first: placement may fill the block
        // exactly, and the flush then rolls past the segment the record
        // lives in.
        if need <= block_size - self.write_offset {
            let segment = self.active_segment;
            self.place_fragment(FragmentKind::Full, payload)?;
            return Ok(segment);
        }

        // Otherwise start from a fresh block.
        if self.write_offset > CRC_SIZE {
            self.flush()?;
        }

        if need <= block_size - CRC_SIZE {
            let segment = self.active_segment;
            self.place_fragment(FragmentKind::Full, payload)?;
            return Ok(segment);
        }

        self.append_fragmented(payload)
    }

    /// Split an oversized record into FIRST/MIDDLE/LAST fragments, one per
    /// block, all inside one segment.
    fn append_fragmented(&mut self, payload: &[u8]) -> WalResult<u64> {
        let block_size = self.manager.block_size();
        let max_fragment = block_size - CRC_SIZE - HEADER_SIZE;
        let fragments = payload.len().div_ceil(max_fragment) as u64;

        if fragments > self.config.segment_blocks {
            return Err(WalError::CapacityExceeded {
                need_blocks: fragments,
                segment_blocks: self.config.segment_blocks,
            });
        }
        // Fragments never straddle segments: a record that does not fit in
        // what remains of the active segment goes wholly into the next.
        if self.blocks_in_segment + fragments > self.config.segment_blocks {
            self.roll_segment();
        }
        // Every fragment lands in this segment; a LAST fragment that fills
        // its block may roll further before we return.
        let segment = self.active_segment;

        let mut chunks = payload.chunks(max_fragment).peekable();
        let mut first = true;
        while let Some(chunk) = chunks.next() {
            let kind = match (first, chunks.peek().is_none()) {
                (true, true) => FragmentKind::Full,
                (true, false) => FragmentKind::First,
                (false, false) => FragmentKind::Middle,
                (false, true) => FragmentKind::Last,
            };
            // Non-LAST fragments carry exactly `max_fragment` bytes, so they
            // fill their block and flush on placement.
            self.place_fragment(kind, chunk)?;
            first = false;
        }
        Ok(segment)
    }

    /// Write one fragment into the active block at the current offset,
    /// flushing when the block becomes exactly full.
    fn place_fragment(&mut self, kind: FragmentKind, payload: &[u8]) -> WalResult<()> {
        let header = FragmentHeader::new(payload.len() as u64, kind, self.active_segment);
        let start = self.write_offset;
        self.buffer[start..start + HEADER_SIZE].copy_from_slice(&header.encode());
        self.buffer[start + HEADER_SIZE..start + HEADER_SIZE + payload.len()]
            .copy_from_slice(payload);
        self.write_offset = start + HEADER_SIZE + payload.len();

        if self.write_offset == self.manager.block_size() {
            self.flush()?;
        }
        Ok(())
    }

    /// Flush the active block: stamp it, hand it to the block manager at the
    /// next slot of the active segment, then start a fresh block.
    fn flush(&mut self) -> WalResult<()> {
        crc::stamp(&mut self.buffer);
        let addr = BlockAddress::new(
            segment_path(&self.config.dir, self.active_segment),
            self.blocks_in_segment,
        );
        self.manager.write_block(&addr, &self.buffer)?;
        debug!(
            segment = self.active_segment,
            block = self.blocks_in_segment,
            "flushed WAL block"
        );

        self.blocks_in_segment += 1;
        if self.blocks_in_segment >= self.config.segment_blocks {
            self.roll_segment();
        }
        self.buffer = vec![0u8; self.manager.block_size()];
        self.write_offset = CRC_SIZE;
        Ok(())
    }

    fn roll_segment(&mut self) {
        self.active_segment += 1;
        self.blocks_in_segment = 0;
        debug!(segment = self.active_segment, "rolled to new WAL segment");
    }

    /// Flush the active block (even partially full) and stamp the sidecar
    /// clean, recording the offset at which the next open resumes.
    pub fn close(&mut self) -> WalResult<()> {
        let resume_offset = self.write_offset as u64;
        if self.write_offset > CRC_SIZE {
            self.flush()?;
        }
        WalMetadata::clean(resume_offset).store(&self.config.dir)?;
        debug!(resume = resume_offset, "WAL closed cleanly");
        Ok(())
    }

    /// Remove every segment with index below `watermark` and advance the
    /// retained range. Missing files are not errors; the active segment is
    /// always retained.
    pub fn delete_segments_below(&mut self, watermark: u64) -> WalResult<()> {
        let upper = watermark.min(self.active_segment);
        while self.first_segment < upper {
            let path = segment_path(&self.config.dir, self.first_segment);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            self.manager.release_file(&path);
            debug!(segment = self.first_segment, "deleted WAL segment");
            self.first_segment += 1;
        }
        Ok(())
    }

    /// Oldest segment still on disk.
    pub fn first_segment(&self) -> u64 {
        self.first_segment
    }

    /// Segment currently receiving flushes.
    pub fn active_segment(&self) -> u64 {
        self.active_segment
    }

    /// Blocks already flushed into the active segment.
    pub fn blocks_in_active_segment(&self) -> u64 {
        self.blocks_in_segment
    }

    /// Next byte to write within the active block.
    pub fn write_offset(&self) -> usize {
        self.write_offset
    }

    /// Directory holding segments and the metadata sidecar.
    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    pub(crate) fn manager(&self) -> &BlockManager {
        &self.manager
    }
}

/// Path of segment `n` inside `dir`.
pub(crate) fn segment_path(dir: &Path, n: u64) -> PathBuf {
    dir.join(format!("wal_{n}.log"))
}

/// Scan `dir` for `wal_<N>.log` files, returning the lowest and highest
/// indices present (both 1 when the directory holds none).
fn discover_segments(dir: &Path) -> WalResult<(u64, u64)> {
    let mut first: Option<u64> = None;
    let mut last: Option<u64> = None;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(n) = parse_segment_name(&name.to_string_lossy()) else {
            continue;
        };
        first = Some(first.map_or(n, |f| f.min(n)));
        last = Some(last.map_or(n, |l| l.max(n)));
    }
    Ok((first.unwrap_or(1), last.unwrap_or(1)))
}

fn parse_segment_name(name: &str) -> Option<u64> {
    name.strip_prefix("wal_")?.strip_suffix(".log")?.parse().ok()
}
