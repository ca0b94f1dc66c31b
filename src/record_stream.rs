//! The uncompressed stream seen as a sequence of records.

use crate::byte_file::OpenMode;
use crate::config::BlfConfig;
use crate::error::{BlfError, Result};
use crate::record::{ObjectBase, Record, BASE_HEADER_SIZE};
use crate::statistics::FileStatistics;
use crate::stream::UncompressedStream;
use log::{debug, error, trace};
use std::io::{Cursor, SeekFrom};
use std::path::Path;

/// Location of one record in the uncompressed stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordIndexEntry {
    pub offset: u64,
    /// Declared object size plus padding; `offset + size` is the next record.
    pub size: u64,
    /// Declared object size, excluding padding.
    pub object_size: u32,
    pub kind: u32,
}

pub struct RecordStream {
    stream: UncompressedStream,
    mode: OpenMode,
    /// Filled at open in read mode; stays empty in write mode.
    index: Vec<RecordIndexEntry>,
    written: usize,
    current: usize,
    last_timestamp: Option<u64>,
}

impl RecordStream {
    /// Open `path`; in read mode every record header is scanned once to
    /// build the record index.
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode, config: &BlfConfig) -> Result<Self> {
        let stream = UncompressedStream::open(path, mode, config)?;
        let mut records = Self { stream, mode, index: Vec::new(), written: 0, current: 0, last_timestamp: None };
        if mode == OpenMode::Read {
            records.build_index()?;
        }
        Ok(records)
    }

    fn build_index(&mut self) -> Result<()> {
        let size = self.stream.size()?;
        let mut offset = 0u64;
        let mut head = [0u8; BASE_HEADER_SIZE as usize];
        while offset < size {
            self.stream.seek_get(SeekFrom::Start(offset))?;
            let n = self.stream.read(&mut head)?;
            if n < head.len() {
                return Err(BlfError::format(format!(
                    "truncated record header at offset {} ({} of {} bytes)",
                    offset,
                    n,
                    head.len()
                )));
            }
            let base = ObjectBase::read(&mut Cursor::new(&head[..]))?;
            if offset + u64::from(base.object_size) > size {
                return Err(BlfError::format(format!(
                    "record {} at offset {} declares {} bytes, stream ends at {}",
                    self.index.len(),
                    offset,
                    base.object_size,
                    size
                )));
            }
            // Padding after the very last record may be missing.
            let stride = base.stride().min(size - offset);
            self.index.push(RecordIndexEntry {
                offset,
                size: stride,
                object_size: base.object_size,
                kind: base.object_type,
            });
            offset += stride;
        }
        self.stream.seek_get(SeekFrom::Start(0))?;
        debug!("indexed {} records over {} bytes", self.index.len(), size);
        Ok(())
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Records in the file (read mode) or written so far (write mode).
    pub fn len(&self) -> usize {
        match self.mode {
            OpenMode::Read => self.index.len(),
            OpenMode::Write => self.written,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record index of a file opened for reading. Empty in write mode.
    pub fn index(&self) -> &[RecordIndexEntry] {
        &self.index
    }

    /// Number of the record [`read_next`](Self::read_next) returns next.
    pub fn tell(&self) -> usize {
        self.current
    }

    /// Position on record `number`; `len()` positions at the end.
    pub fn seek(&mut self, number: usize) -> Result<()> {
        if self.mode != OpenMode::Read {
            return Err(BlfError::WrongMode(self.mode));
        }
        if number > self.index.len() {
            return Err(BlfError::InvalidSeek(format!("record {} of {}", number, self.index.len())));
        }
        let offset = self.index.get(number).map_or(self.stream.size()?, |entry| entry.offset);
        self.stream.seek_get(SeekFrom::Start(offset))?;
        self.current = number;
        Ok(())
    }

    /// Decode the record at the current position and step past it.
    ///
    /// Returns `Ok(None)` at the end. An unknown kind is reported as
    /// [`BlfError::UnknownKind`] after the position has already moved on, so
    /// the caller can keep reading.
    pub fn read_next(&mut self) -> Result<Option<Record>> {
        if self.mode != OpenMode::Read {
            return Err(BlfError::WrongMode(self.mode));
        }
        let Some(entry) = self.index.get(self.current).copied() else {
            return Ok(None);
        };

        self.stream.seek_get(SeekFrom::Start(entry.offset))?;
        let mut bytes = vec![0u8; entry.object_size as usize];
        let n = self.stream.read(&mut bytes)?;
        self.current += 1;
        if n < bytes.len() {
            return Err(BlfError::format(format!("truncated record {}", self.current - 1)));
        }
        trace!("record {}: kind {} at offset {}", self.current - 1, entry.kind, entry.offset);
        Record::decode(&bytes).map(Some)
    }

    /// Decode record `number` without decoding any other.
    pub fn read_at(&mut self, number: usize) -> Result<Record> {
        if number >= self.index.len() {
            return Err(BlfError::InvalidSeek(format!("record {} of {}", number, self.index.len())));
        }
        self.seek(number)?;
        self.read_next()?
            .ok_or_else(|| BlfError::InvalidSeek(format!("record {} of {}", number, self.index.len())))
    }

    /// Encode and append a record, updating the header counters.
    pub fn write(&mut self, record: &Record) -> Result<()> {
        if self.mode != OpenMode::Write {
            return Err(BlfError::WrongMode(self.mode));
        }
        let bytes = record.encode()?;
        self.stream.write(&bytes)?;

        self.written += 1;
        self.last_timestamp = Some(record.envelope.timestamp_nanos());
        self.stream.update_statistics(|stats| stats.object_count = stats.object_count.saturating_add(1))
    }

    /// Timestamp of the most recently written record, in nanoseconds.
    pub fn last_timestamp(&self) -> Option<u64> {
        self.last_timestamp
    }

    pub fn statistics(&self) -> Result<FileStatistics> {
        self.stream.statistics()
    }

    pub fn update_statistics<F: FnOnce(&mut FileStatistics)>(&self, f: F) -> Result<()> {
        self.stream.update_statistics(f)
    }

    pub fn stream(&self) -> &UncompressedStream {
        &self.stream
    }

    /// Derive the last object time from the measurement start, then close
    /// the underlying stream.
    pub fn close(&mut self) -> Result<()> {
        if self.mode == OpenMode::Write && self.stream.is_open() {
            if let Some(nanos) = self.last_timestamp {
                self.stream.update_statistics(|stats| {
                    if let Some(time) = stats.measurement_start_time.offset_by_nanos(nanos) {
                        stats.last_object_time = time;
                    }
                })?;
            }
        }
        self.stream.close()
    }
}

impl Drop for RecordStream {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!("failed to close record stream: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{AppText, CanErrorFrame, CanMessage, LinBaudrateEvent};
    use crate::statistics::SystemTime;
    use tempfile::NamedTempFile;

    fn sample() -> Vec<Record> {
        vec![
            Record::new(CanMessage { channel: 1, dlc: 2, id: 0x100, ..Default::default() }, 1_000),
            Record::new(AppText::new(0, "abcde"), 2_000),
            Record::new(CanErrorFrame { channel: 2, length: 8, reserved: 0 }, 3_000),
            Record::new(LinBaudrateEvent { channel: 1, reserved: 0, baudrate: 9_600 }, 4_000),
        ]
    }

    fn write_all(path: &Path, records: &[Record], config: &BlfConfig) {
        let mut stream = RecordStream::open(path, OpenMode::Write, config).unwrap();
        for record in records {
            stream.write(record).unwrap();
        }
        assert_eq!(stream.len(), records.len());
        stream.close().unwrap();
    }

    #[test]
    fn test_records_survive_reopen() {
        let temp = NamedTempFile::new().unwrap();
        let config = BlfConfig::default().with_chunk_size(50);
        let records = sample();
        write_all(temp.path(), &records, &config);

        let mut stream = RecordStream::open(temp.path(), OpenMode::Read, &config).unwrap();
        assert_eq!(stream.len(), records.len());
        assert_eq!(stream.statistics().unwrap().object_count, records.len() as u32);
        let mut read = Vec::new();
        while let Some(record) = stream.read_next().unwrap() {
            read.push(record);
        }
        assert_eq!(read, records);
        assert!(stream.read_next().unwrap().is_none());
    }

    #[test]
    fn test_index_is_contiguous() {
        let temp = NamedTempFile::new().unwrap();
        let config = BlfConfig::default().with_chunk_size(32);
        write_all(temp.path(), &sample(), &config);

        let stream = RecordStream::open(temp.path(), OpenMode::Read, &config).unwrap();
        let index = stream.index();
        assert_eq!(index[0].offset, 0);
        for pair in index.windows(2) {
            assert!(pair[0].offset < pair[1].offset);
            assert_eq!(pair[0].offset + pair[0].size, pair[1].offset);
        }
        // The 53-byte text record is padded to 56.
        assert_eq!(index[1].object_size, 53);
        assert_eq!(index[1].size, 56);
    }

    #[test]
    fn test_random_access() {
        let temp = NamedTempFile::new().unwrap();
        let config = BlfConfig::default();
        let records = sample();
        write_all(temp.path(), &records, &config);

        let mut stream = RecordStream::open(temp.path(), OpenMode::Read, &config).unwrap();
        assert_eq!(stream.read_at(2).unwrap(), records[2]);
        assert_eq!(stream.tell(), 3);
        assert_eq!(stream.read_next().unwrap().as_ref(), Some(&records[3]));
        assert_eq!(stream.read_at(0).unwrap(), records[0]);

        stream.seek(4).unwrap();
        assert!(stream.read_next().unwrap().is_none());
        assert!(matches!(stream.seek(5), Err(BlfError::InvalidSeek(_))));
        assert!(matches!(stream.read_at(4), Err(BlfError::InvalidSeek(_))));
    }

    #[test]
    fn test_last_object_time_derived_on_close() {
        let temp = NamedTempFile::new().unwrap();
        let config = BlfConfig::default();
        let start = SystemTime {
            year: 2023,
            month: 1,
            day_of_week: 0,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
            milliseconds: 0,
        };
        let mut stream = RecordStream::open(temp.path(), OpenMode::Write, &config).unwrap();
        stream.update_statistics(|s| s.measurement_start_time = start).unwrap();
        stream.write(&Record::new(CanErrorFrame::default(), 2_500_000_000)).unwrap();
        assert_eq!(stream.last_timestamp(), Some(2_500_000_000));
        stream.close().unwrap();

        let stream = RecordStream::open(temp.path(), OpenMode::Read, &config).unwrap();
        let last = stream.statistics().unwrap().last_object_time;
        assert_eq!((last.second, last.milliseconds), (2, 500));
    }

    #[test]
    fn test_write_mode_counts_without_indexing() {
        let temp = NamedTempFile::new().unwrap();
        let config = BlfConfig::default().with_chunk_size(32);
        let mut stream = RecordStream::open(temp.path(), OpenMode::Write, &config).unwrap();
        for record in sample().iter().cycle().take(50) {
            stream.write(record).unwrap();
        }
        assert_eq!(stream.len(), 50);
        assert!(stream.index().is_empty());
        stream.close().unwrap();

        let stream = RecordStream::open(temp.path(), OpenMode::Read, &config).unwrap();
        assert_eq!(stream.len(), 50);
        assert_eq!(stream.index().len(), 50);
    }

    #[test]
    fn test_mode_checks() {
        let temp = NamedTempFile::new().unwrap();
        let config = BlfConfig::default();
        let mut stream = RecordStream::open(temp.path(), OpenMode::Write, &config).unwrap();
        assert!(matches!(stream.read_next(), Err(BlfError::WrongMode(OpenMode::Write))));
        assert!(matches!(stream.seek(0), Err(BlfError::WrongMode(OpenMode::Write))));
        stream.close().unwrap();

        let mut stream = RecordStream::open(temp.path(), OpenMode::Read, &config).unwrap();
        assert!(stream.is_empty());
        let record = Record::new(CanErrorFrame::default(), 0);
        assert!(matches!(stream.write(&record), Err(BlfError::WrongMode(OpenMode::Read))));
    }
}
