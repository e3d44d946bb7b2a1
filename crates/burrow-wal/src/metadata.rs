//! Durability metadata sidecar.
//!
//! A single 9-byte file next to the WAL segments records whether the last
//! shutdown was clean and, if so, the offset within the active block at
//! which appending may resume. The file is rewritten unclean on every WAL
//! open and rewritten clean on close; a crash therefore always leaves it
//! unclean, and recovery then trusts only fully flushed blocks.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::WalResult;

/// File name of the sidecar within the WAL directory.
pub const METADATA_FILE: &str = "metadata.bin";

/// Encoded size of the sidecar record.
pub const METADATA_SIZE: usize = 9;

/// Clean-shutdown bit plus the in-progress offset within the active block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WalMetadata {
    /// True when the previous process reached a clean close.
    pub clean_shutdown: bool,
    /// Offset within the active block at which appending resumes. Only
    /// meaningful when `clean_shutdown` is set.
    pub resume_write_offset: u64,
}

impl WalMetadata {
    /// The state recorded while a WAL is open.
    pub fn unclean() -> Self {
        Self {
            clean_shutdown: false,
            resume_write_offset: 0,
        }
    }

    /// The state recorded by a clean close.
    pub fn clean(resume_write_offset: u64) -> Self {
        Self {
            clean_shutdown: true,
            resume_write_offset,
        }
    }

    /// Serialize to the 9-byte wire form: `clean u8 | resume u64 LE`.
    pub fn encode(&self) -> [u8; METADATA_SIZE] {
        let mut bytes = [0u8; METADATA_SIZE];
        bytes[0] = u8::from(self.clean_shutdown);
        bytes[1..].copy_from_slice(&self.resume_write_offset.to_le_bytes());
        bytes
    }

    /// Parse the 9-byte wire form.
    pub fn decode(bytes: &[u8; METADATA_SIZE]) -> Self {
        let mut offset = [0u8; 8];
        offset.copy_from_slice(&bytes[1..]);
        Self {
            clean_shutdown: bytes[0] == 1,
            resume_write_offset: u64::from_le_bytes(offset),
        }
    }

    /// Load the sidecar from `dir`. A missing or truncated file reads as
    /// unclean.
    pub fn load(dir: &Path) -> WalResult<Self> {
        let bytes = match fs::read(dir.join(METADATA_FILE)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::unclean()),
            Err(e) => return Err(e.into()),
        };
        if bytes.len() < METADATA_SIZE {
            return Ok(Self::unclean());
        }
        let mut buf = [0u8; METADATA_SIZE];
        buf.copy_from_slice(&bytes[..METADATA_SIZE]);
        Ok(Self::decode(&buf))
    }

    /// Rewrite the sidecar in `dir`.
    pub fn store(&self, dir: &Path) -> WalResult<()> {
        fs::write(dir.join(METADATA_FILE), self.encode())?;
        Ok(())
    }
}
