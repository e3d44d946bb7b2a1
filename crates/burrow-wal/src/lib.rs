//! Segmented, fragment-encoded write-ahead log for the Burrow storage
//! engine.
//!
//! The WAL makes record persistence crash-durable: callers hand opaque byte
//! payloads to the [`WalWriter`], which stages them in an in-memory active
//! block, fragments them across blocks when they do not fit, and flushes
//! CRC-stamped blocks through the shared `burrow-block` manager into
//! `wal_<N>.log` segment files. Recovery walks the segments back, reassembles
//! fragments, and feeds the records to caller-provided [`Memtable`]s.
//!
//! # Components
//!
//! - [`FragmentHeader`] -- the 17-byte wire header carried by every fragment
//! - [`WalWriter`] -- append, flush, segment roll, clean close, segment
//!   deletion, and replay
//! - [`WalMetadata`] -- the 9-byte durability sidecar recording the
//!   clean-shutdown bit and the mid-block resume offset
//! - [`Memtable`] -- the interface recovered records are delivered through
//! - [`StorageConfig`] -- the process-wide configuration, block layer
//!   included
//!
//! # Durability Contract
//!
//! 1. Every flushed block is on disk and survives crashes.
//! 2. Bytes only in the active block at crash time are lost.
//! 3. A clean close flushes the active block and persists the resume offset,
//!    so the next open continues appending in the middle of that block.

pub mod config;
pub mod error;
pub mod header;
pub mod memtable;
pub mod metadata;
pub mod recovery;
pub mod writer;

pub use config::{StorageConfig, WalConfig};
pub use error::{WalError, WalResult};
pub use header::{FragmentHeader, FragmentKind, HEADER_SIZE};
pub use memtable::{Memtable, VecMemtable};
pub use metadata::{WalMetadata, METADATA_FILE};
pub use recovery::ReplayReport;
pub use writer::WalWriter;
