use std::fs;
use std::path::{Path, PathBuf};

use burrow_block::BlockConfig;
use serde::Deserialize;

use crate::error::{WalError, WalResult};

/// Configuration of the write-ahead log.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct WalConfig {
    /// Directory holding the `wal_<N>.log` segments and the metadata
    /// sidecar.
    pub dir: PathBuf,
    /// Maximum number of blocks per segment file.
    #[serde(default = "default_segment_blocks")]
    pub segment_blocks: u64,
}

fn default_segment_blocks() -> u64 {
    16
}

impl WalConfig {
    /// Configuration with the default segment length.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            segment_blocks: default_segment_blocks(),
        }
    }

    pub fn with_segment_blocks(mut self, segment_blocks: u64) -> Self {
        self.segment_blocks = segment_blocks;
        self
    }
}

/// The process-wide storage configuration: block layer plus WAL.
///
/// Materialized as an explicit value handed to constructors rather than a
/// global, so tests and multi-store processes each carry their own.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    #[serde(default)]
    pub block: BlockConfig,
    pub wal: WalConfig,
}

impl StorageConfig {
    pub fn from_toml_str(raw: &str) -> WalResult<Self> {
        toml::from_str(raw).map_err(|e| WalError::Config(e.to_string()))
    }

    pub fn from_toml_file(path: &Path) -> WalResult<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}
