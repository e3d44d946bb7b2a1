//! Replay of flushed WAL segments into memtables.
//!
//! Recovery walks the retained segments in order, verifies every block's
//! CRC, reassembles fragments into logical records, and hands each record to
//! the current memtable. When a memtable reports full the walk continues
//! into the next one from the same cursor; when all segments are exhausted
//! the walk succeeds even if memtables remain non-full.

use std::fs;
use std::io;
use std::mem;

use burrow_block::crc::{self, CRC_SIZE};
use burrow_block::BlockAddress;
use tracing::debug;

use crate::error::{WalError, WalResult};
use crate::header::{FragmentHeader, FragmentKind, HEADER_SIZE};
use crate::memtable::Memtable;
use crate::writer::{segment_path, WalWriter};

/// Counters from one replay walk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Logical records handed to memtables.
    pub records: u64,
    /// Segment files visited.
    pub segments_walked: u64,
    /// Blocks fetched and verified.
    pub blocks_read: u64,
}

/// Reassembly state of the fragment parser.
enum ParserState {
    Idle,
    Assembling(Vec<u8>),
}

impl WalWriter {
    /// Replay every flushed record, in order, into `memtables`.
    ///
    /// Only blocks on disk are visible here: bytes still in the active block
    /// buffer are not part of the durable log. A record whose LAST fragment
    /// was never flushed is the crash tail and is dropped silently; every
    /// other inconsistency is an error.
    pub fn replay<M: Memtable>(&self, memtables: &mut [M]) -> WalResult<ReplayReport> {
        let block_size = self.manager().block_size();
        let mut report = ReplayReport::default();
        let mut state = ParserState::Idle;

        let mut table = 0usize;
        while table < memtables.len() && memtables[table].is_full() {
            table += 1;
        }
        if table == memtables.len() {
            return Ok(report);
        }

        'segments: for segment in self.first_segment()..=self.active_segment() {
            let path = segment_path(self.dir(), segment);
            // Flushed blocks only; a partial tail block never exists on disk
            // because flushes write whole blocks.
            let blocks = match fs::metadata(&path) {
                Ok(meta) => meta.len() / block_size as u64,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            report.segments_walked += 1;

            for block_index in 0..blocks {
                let block = self
                    .manager()
                    .read_block(&BlockAddress::new(&path, block_index))?;
                crc::verify(&block)?;
                report.blocks_read += 1;

                let mut offset = CRC_SIZE;
                while offset < block_size {
                    if block[offset..].iter().all(|&b| b == 0) {
                        // Trailing padding ends the record stream within
                        // this block. A record must not be mid-assembly
                        // across that sentinel.
                        if matches!(state, ParserState::Assembling(_)) {
                            return Err(malformed(
                                segment,
                                block_index,
                                offset,
                                "padding interrupts a fragmented record",
                            ));
                        }
                        break;
                    }
                    let fragment_start = offset;
                    if block_size - offset < HEADER_SIZE {
                        return Err(malformed(
                            segment,
                            block_index,
                            fragment_start,
                            "truncated fragment header",
                        ));
                    }

                    let mut header_bytes = [0u8; HEADER_SIZE];
                    header_bytes.copy_from_slice(&block[offset..offset + HEADER_SIZE]);
                    let Some(header) = FragmentHeader::decode(&header_bytes) else {
                        return Err(malformed(
                            segment,
                            block_index,
                            fragment_start,
                            "unknown fragment kind",
                        ));
                    };
                    if header.segment_id != segment {
                        return Err(malformed(
                            segment,
                            block_index,
                            fragment_start,
                            "fragment claims a different segment",
                        ));
                    }
                    let payload_len = header.payload_size as usize;
                    if offset + HEADER_SIZE + payload_len > block_size {
                        return Err(malformed(
                            segment,
                            block_index,
                            fragment_start,
                            "fragment overruns its block",
                        ));
                    }
                    let payload =
                        block[offset + HEADER_SIZE..offset + HEADER_SIZE + payload_len].to_vec();
                    offset += HEADER_SIZE + payload_len;

                    let record = match (mem::replace(&mut state, ParserState::Idle), header.kind)
                    {
                        (ParserState::Idle, FragmentKind::Full) => Some(payload),
                        (ParserState::Idle, FragmentKind::First) => {
                            state = ParserState::Assembling(payload);
                            None
                        }
                        (ParserState::Assembling(mut buf), FragmentKind::Middle) => {
                            buf.extend_from_slice(&payload);
                            state = ParserState::Assembling(buf);
                            None
                        }
                        (ParserState::Assembling(mut buf), FragmentKind::Last) => {
                            buf.extend_from_slice(&payload);
                            Some(buf)
                        }
                        (ParserState::Idle, FragmentKind::Middle | FragmentKind::Last) => {
                            return Err(malformed(
                                segment,
                                block_index,
                                fragment_start,
                                "continuation without a first fragment",
                            ));
                        }
                        (ParserState::Assembling(_), FragmentKind::Full | FragmentKind::First) => {
                            return Err(malformed(
                                segment,
                                block_index,
                                fragment_start,
                                "record starts while another is assembling",
                            ));
                        }
                    };

                    if let Some(record) = record {
                        memtables[table].put(record);
                        report.records += 1;
                        if memtables[table].is_full() {
                            table += 1;
                            while table < memtables.len() && memtables[table].is_full() {
                                table += 1;
                            }
                            if table == memtables.len() {
                                break 'segments;
                            }
                        }
                    }
                }
            }
        }

        // Anything still assembling lost its LAST fragment to a crash before
        // it was flushed; the durability contract drops it.
        debug!(
            records = report.records,
            segments = report.segments_walked,
            blocks = report.blocks_read,
            "WAL replay complete"
        );
        Ok(report)
    }
}

fn malformed(segment: u64, block: u64, offset: usize, reason: &str) -> WalError {
    WalError::MalformedFragment {
        segment,
        block,
        offset,
        reason: reason.to_string(),
    }
}
