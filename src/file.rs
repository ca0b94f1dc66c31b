//! `BlfFile`: configuration plus the record-level API in one handle.

use crate::byte_file::OpenMode;
use crate::config::{ApiVersion, ApplicationTag, BlfConfig};
use crate::error::{BlfError, Result};
use crate::record::Record;
use crate::record_stream::{RecordIndexEntry, RecordStream};
use crate::statistics::{FileStatistics, SystemTime};
use std::path::Path;

pub struct BlfFile {
    records: RecordStream,
    config: BlfConfig,
}

impl BlfFile {
    /// Open an existing file for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, BlfConfig::default())
    }

    /// Open for reading with explicit I/O settings (background read-ahead,
    /// cache limit). Compression settings come from the file itself.
    pub fn open_with<P: AsRef<Path>>(path: P, config: BlfConfig) -> Result<Self> {
        config.validate()?;
        let records = RecordStream::open(path, OpenMode::Read, &config)?;
        Ok(Self { records, config })
    }

    /// Create or truncate `path` for writing. The configuration is validated
    /// before the file is touched.
    pub fn create<P: AsRef<Path>>(path: P, config: BlfConfig) -> Result<Self> {
        config.validate()?;
        let records = RecordStream::open(path, OpenMode::Write, &config)?;
        Ok(Self { records, config })
    }

    pub fn config(&self) -> &BlfConfig {
        &self.config
    }

    pub fn mode(&self) -> OpenMode {
        self.records.mode()
    }

    /// Next record, or `None` at the end.
    pub fn read(&mut self) -> Result<Option<Record>> {
        self.records.read_next()
    }

    pub fn read_at(&mut self, number: usize) -> Result<Record> {
        self.records.read_at(number)
    }

    pub fn write(&mut self, record: &Record) -> Result<()> {
        self.records.write(record)
    }

    pub fn seek(&mut self, number: usize) -> Result<()> {
        self.records.seek(number)
    }

    pub fn tell(&self) -> usize {
        self.records.tell()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn index(&self) -> &[RecordIndexEntry] {
        self.records.index()
    }

    /// Iterate from the current position to the end.
    pub fn records(&mut self) -> Records<'_> {
        Records { file: self, done: false }
    }

    pub fn statistics(&self) -> Result<FileStatistics> {
        self.records.statistics()
    }

    /// Bytes in the uncompressed stream.
    pub fn uncompressed_size(&self) -> Result<u64> {
        self.records.stream().size()
    }

    /// Size on disk as recorded in the header.
    pub fn file_size(&self) -> Result<u64> {
        Ok(self.records.statistics()?.file_size)
    }

    pub fn chunk_count(&self) -> Result<usize> {
        self.records.stream().chunk_count()
    }

    pub fn set_application(&mut self, application: ApplicationTag) -> Result<()> {
        self.edit_header(|stats| stats.application = application)
    }

    pub fn set_api(&mut self, api: ApiVersion) -> Result<()> {
        self.edit_header(|stats| stats.api = api)
    }

    pub fn set_objects_read(&mut self, objects_read: u32) -> Result<()> {
        self.edit_header(|stats| stats.objects_read = objects_read)
    }

    pub fn set_measurement_start_time(&mut self, time: SystemTime) -> Result<()> {
        self.edit_header(|stats| stats.measurement_start_time = time)
    }

    fn edit_header<F: FnOnce(&mut FileStatistics)>(&mut self, f: F) -> Result<()> {
        if self.mode() != OpenMode::Write {
            return Err(BlfError::WrongMode(self.mode()));
        }
        self.records.update_statistics(f)
    }

    /// Flush everything and write the final header.
    pub fn close(&mut self) -> Result<()> {
        self.records.close()
    }
}

/// Records from the current position onwards.
///
/// Unknown kinds are yielded as errors and iteration continues past them;
/// any other error ends the iteration.
pub struct Records<'a> {
    file: &'a mut BlfFile,
    done: bool,
}

impl Iterator for Records<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.file.read() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = !e.is_recoverable();
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CompressionMethod;
    use crate::record::{CanMessage, RealtimeClock};
    use tempfile::NamedTempFile;

    #[test]
    fn test_invalid_config_fails_before_io() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never.blf");
        let config = BlfConfig::default().with_compression(CompressionMethod::Zlib).with_level(12);
        assert!(matches!(BlfFile::create(&path, config), Err(BlfError::Config(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_facade_accessors() {
        let temp = NamedTempFile::new().unwrap();
        let config = BlfConfig::default().with_chunk_size(64);
        let mut file = BlfFile::create(temp.path(), config).unwrap();
        file.set_application(ApplicationTag { id: 9, major: 2, minor: 1, build: 0 }).unwrap();
        file.set_objects_read(2).unwrap();
        for i in 0..10u64 {
            file.write(&Record::new(CanMessage { id: i as u32, ..Default::default() }, i * 100)).unwrap();
        }
        file.write(&Record::new(RealtimeClock::default(), 2_000)).unwrap();
        assert_eq!(file.len(), 11);
        file.close().unwrap();

        let mut file = BlfFile::open(temp.path()).unwrap();
        let stats = file.statistics().unwrap();
        assert_eq!(stats.object_count, 11);
        assert_eq!(stats.objects_read, 2);
        assert_eq!(stats.application.id, 9);
        assert_eq!(file.uncompressed_size().unwrap(), 11 * 48);
        assert_eq!(file.chunk_count().unwrap(), 9);
        assert_eq!(file.file_size().unwrap(), std::fs::metadata(temp.path()).unwrap().len());
        assert!(matches!(file.set_objects_read(1), Err(BlfError::WrongMode(OpenMode::Read))));

        let records: Vec<Record> = file.records().collect::<Result<_>>().unwrap();
        assert_eq!(records.len(), 11);
        assert_eq!(file.tell(), 11);
        file.seek(9).unwrap();
        assert_eq!(file.records().count(), 2);
    }
}
