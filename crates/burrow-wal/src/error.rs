use std::io;

use burrow_block::BlockError;

/// Errors produced by the write-ahead log.
#[derive(Debug, thiserror::Error)]
pub enum WalError {
    /// I/O error during segment or sidecar file operations.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Error surfaced by the block layer, including CRC corruption and
    /// missing files.
    #[error("block layer error: {0}")]
    Block(#[from] BlockError),

    /// A fragment that cannot be honored during recovery: unknown kind,
    /// overrun past its block, or inconsistent reassembly state.
    #[error("malformed fragment in segment {segment} block {block} at offset {offset}: {reason}")]
    MalformedFragment {
        segment: u64,
        block: u64,
        offset: usize,
        reason: String,
    },

    /// A record too large for the fragmentation contract: its fragments
    /// would not fit into a single segment.
    #[error("record needs {need_blocks} blocks but a segment holds {segment_blocks}")]
    CapacityExceeded {
        need_blocks: u64,
        segment_blocks: u64,
    },

    /// Configuration could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result alias for WAL operations.
pub type WalResult<T> = Result<T, WalError>;
