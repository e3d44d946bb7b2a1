use serde::Deserialize;

use crate::crc::CRC_SIZE;
use crate::error::{BlockError, BlockResult};

/// Configuration of the block I/O layer.
///
/// The defaults match the on-disk format this crate is deployed with: 4 KiB
/// blocks and a 100-entry cache. Block size is fixed for the lifetime of a
/// store; changing it invalidates every file written with the old size.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BlockConfig {
    /// Size of one block in bytes, CRC prefix included.
    pub block_size: usize,
    /// Block cache capacity in entries.
    pub cache_capacity: usize,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            block_size: 4096,
            cache_capacity: 100,
        }
    }
}

impl BlockConfig {
    /// Reject block sizes that leave no room for a payload after the CRC
    /// prefix.
    pub fn validate(&self) -> BlockResult<()> {
        if self.block_size <= CRC_SIZE {
            return Err(BlockError::InvalidConfig(format!(
                "block size {} does not exceed the {CRC_SIZE}-byte CRC prefix",
                self.block_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = BlockConfig::default();
        assert_eq!(config.block_size, 4096);
        assert_eq!(config.cache_capacity, 100);
        config.validate().unwrap();
    }

    #[test]
    fn rejects_block_size_smaller_than_crc_prefix() {
        let config = BlockConfig {
            block_size: 4,
            cache_capacity: 10,
        };
        assert!(matches!(
            config.validate(),
            Err(BlockError::InvalidConfig(_))
        ));
    }
}
