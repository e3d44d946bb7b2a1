use std::path::PathBuf;

/// Location of one fixed-size block: a file path plus a 0-based block index.
///
/// The byte offset within the file is `index * block_size`. Addresses are
/// stable across process lifetimes, which is what makes them usable as cache
/// keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlockAddress {
    /// File holding the block.
    pub file: PathBuf,
    /// 0-based block index within the file.
    pub index: u64,
}

impl BlockAddress {
    pub fn new(file: impl Into<PathBuf>, index: u64) -> Self {
        Self {
            file: file.into(),
            index,
        }
    }

    /// Byte offset of this block within its file.
    pub fn byte_offset(&self, block_size: usize) -> u64 {
        self.index * block_size as u64
    }
}
