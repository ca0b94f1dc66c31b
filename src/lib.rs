//! # blf-store
//!
//! Reading and writing chunked, compressed binary log files in the BLF
//! container layout: a fixed file header followed by independently
//! compressed chunks whose concatenated payloads form a stream of
//! timestamped records.
//!
//! ## Layers
//!
//! - [`store::ChunkStore`]: file header and the physical chunk sequence
//! - [`stream::UncompressedStream`]: every chunk's payload as one seekable
//!   byte stream, with a decompressed-chunk cache and write buffering
//! - [`record_stream::RecordStream`]: that byte stream as indexed records
//! - [`BlfFile`]: configuration plus the record API in one handle
//!
//! ## Quick Start
//!
//! ```rust
//! use blf_store::{BlfConfig, BlfFile, CanMessage, Record};
//!
//! # fn main() -> blf_store::Result<()> {
//! let dir = tempfile::tempdir()?;
//! let path = dir.path().join("trace.blf");
//!
//! let mut file = BlfFile::create(&path, BlfConfig::default())?;
//! let frame = CanMessage { channel: 1, dlc: 2, id: 0x7DF, data: [2, 1, 0, 0, 0, 0, 0, 0], ..Default::default() };
//! file.write(&Record::new(frame, 1_000_000))?;
//! file.close()?;
//!
//! let mut file = BlfFile::open(&path)?;
//! assert_eq!(file.len(), 1);
//! let record = file.read()?.expect("one record");
//! assert_eq!(record.envelope.timestamp_nanos(), 1_000_000);
//! # Ok(())
//! # }
//! ```
//!
//! ### Compression and background I/O
//!
//! ```rust
//! use blf_store::{BlfConfig, CompressionMethod};
//!
//! let config = BlfConfig::default()
//!     .with_compression(CompressionMethod::Zstd)
//!     .with_level(9)
//!     .with_chunk_size(64 * 1024)
//!     .with_background_io(true);
//! assert!(config.validate().is_ok());
//! ```

pub mod byte_file;
pub mod cache;
pub mod chunk;
pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod file;
pub mod record;
pub mod record_stream;
pub mod statistics;
pub mod store;
pub mod stream;
mod worker;

pub use byte_file::{ByteFile, OpenMode};
pub use codec::CompressionMethod;
pub use config::{ApiVersion, ApplicationTag, BlfConfig, DEFAULT_CHUNK_SIZE};
pub use error::{BlfError, Result};
pub use file::{BlfFile, Records};
pub use record::{
    AppText, CanErrorFrame, CanMessage, Envelope, FlexRayData, LinBaudrateEvent, LinMessage,
    MostDataLost, ObjectType, RealtimeClock, Record, RecordBody, RecordCodec,
};
pub use record_stream::RecordIndexEntry;
pub use statistics::{FileStatistics, SystemTime};
pub use stream::ChunkIndexEntry;

use std::path::Path;

/// Write `records` to a new file and return the final header.
pub fn write_records<P: AsRef<Path>>(path: P, records: &[Record], config: BlfConfig) -> Result<FileStatistics> {
    let path = path.as_ref();
    let mut file = BlfFile::create(path, config)?;
    for record in records {
        file.write(record)?;
    }
    file.close()?;
    Ok(BlfFile::open(path)?.statistics()?)
}

/// Read every record of a file, skipping kinds this crate cannot decode.
///
/// Returns the decoded records and the number of records skipped.
pub fn read_records<P: AsRef<Path>>(path: P) -> Result<(Vec<Record>, usize)> {
    let mut file = BlfFile::open(path)?;
    let mut records = Vec::with_capacity(file.len());
    let mut skipped = 0;
    for result in file.records() {
        match result {
            Ok(record) => records.push(record),
            Err(e) if e.is_recoverable() => skipped += 1,
            Err(e) => return Err(e),
        }
    }
    Ok((records, skipped))
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
