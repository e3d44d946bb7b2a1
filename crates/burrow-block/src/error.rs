use std::io;
use std::path::PathBuf;

/// Errors produced by the block I/O layer.
#[derive(Debug, thiserror::Error)]
pub enum BlockError {
    /// I/O error from the underlying filesystem.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// File does not exist for a read.
    #[error("block file not found: {0}")]
    NotFound(PathBuf),

    /// CRC mismatch on a block read.
    #[error("corrupt block: stored CRC {expected:#010x}, computed {actual:#010x}")]
    CorruptBlock { expected: u32, actual: u32 },

    /// A buffer handed to `write_block` is not exactly one block long.
    #[error("bad block length: expected {expected} bytes, got {actual}")]
    BadBlockLength { expected: usize, actual: usize },

    /// Framed bytes or a start offset are not block-aligned.
    #[error(
        "unaligned frame: length {len} at offset {offset} with block size {block_size}"
    )]
    UnalignedFrame {
        len: usize,
        offset: u64,
        block_size: usize,
    },

    /// Configuration rejected at construction.
    #[error("invalid block configuration: {0}")]
    InvalidConfig(String),
}

/// Result alias for block-layer operations.
pub type BlockResult<T> = Result<T, BlockError>;
