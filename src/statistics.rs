//! Global file header ("file statistics").
//!
//! Written as a placeholder when a file is created and rewritten in place on
//! close, once the counters are final.

use crate::config::{ApiVersion, ApplicationTag};
use crate::error::{BlfError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;
use std::io::{Read, Write};

/// File signature "LOGG".
pub const FILE_SIGNATURE: u32 = 0x4747_4F4C;

/// Encoded size of the header written by this crate.
pub const STATISTICS_SIZE: u32 = 144;

pub const MAX_STATISTICS_SIZE: u32 = 0x1_0000;

const RESERVED_WORDS: usize = 16;

/// Calendar time with millisecond resolution, laid out as eight 16-bit words.
///
/// An all-zero value means "not set".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SystemTime {
    pub year: u16,
    pub month: u16,
    pub day_of_week: u16,
    pub day: u16,
    pub hour: u16,
    pub minute: u16,
    pub second: u16,
    pub milliseconds: u16,
}

impl SystemTime {
    pub fn is_unset(&self) -> bool {
        *self == SystemTime::default()
    }

    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(i32::from(self.year), u32::from(self.month), u32::from(self.day))?
            .and_hms_milli_opt(
                u32::from(self.hour),
                u32::from(self.minute),
                u32::from(self.second),
                u32::from(self.milliseconds),
            )
    }

    /// This time shifted by `nanos`, or `None` if the time is unset or invalid.
    pub fn offset_by_nanos(&self, nanos: u64) -> Option<SystemTime> {
        let base = self.to_naive()?;
        let shifted = base.checked_add_signed(Duration::nanoseconds(i64::try_from(nanos).ok()?))?;
        Some(SystemTime::from(shifted))
    }

    fn read<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            year: reader.read_u16::<LittleEndian>()?,
            month: reader.read_u16::<LittleEndian>()?,
            day_of_week: reader.read_u16::<LittleEndian>()?,
            day: reader.read_u16::<LittleEndian>()?,
            hour: reader.read_u16::<LittleEndian>()?,
            minute: reader.read_u16::<LittleEndian>()?,
            second: reader.read_u16::<LittleEndian>()?,
            milliseconds: reader.read_u16::<LittleEndian>()?,
        })
    }

    fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        for word in [
            self.year,
            self.month,
            self.day_of_week,
            self.day,
            self.hour,
            self.minute,
            self.second,
            self.milliseconds,
        ] {
            writer.write_u16::<LittleEndian>(word)?;
        }
        Ok(())
    }
}

impl From<NaiveDateTime> for SystemTime {
    fn from(time: NaiveDateTime) -> Self {
        Self {
            year: time.year().clamp(0, i32::from(u16::MAX)) as u16,
            month: time.month() as u16,
            day_of_week: time.weekday().num_days_from_sunday() as u16,
            day: time.day() as u16,
            hour: time.hour() as u16,
            minute: time.minute() as u16,
            second: time.second() as u16,
            milliseconds: (time.nanosecond() / 1_000_000).min(999) as u16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStatistics {
    pub statistics_size: u32,
    pub application: ApplicationTag,
    pub api: ApiVersion,
    /// Size of the whole file on disk.
    pub file_size: u64,
    /// Header size plus every chunk's internal header and uncompressed payload.
    pub uncompressed_file_size: u64,
    pub object_count: u32,
    pub objects_read: u32,
    pub measurement_start_time: SystemTime,
    pub last_object_time: SystemTime,
    pub restore_points_offset: u64,
}

impl Default for FileStatistics {
    fn default() -> Self {
        Self {
            statistics_size: STATISTICS_SIZE,
            application: ApplicationTag::default(),
            api: ApiVersion::default(),
            file_size: 0,
            uncompressed_file_size: u64::from(STATISTICS_SIZE),
            object_count: 0,
            objects_read: 0,
            measurement_start_time: SystemTime::default(),
            last_object_time: SystemTime::default(),
            restore_points_offset: 0,
        }
    }
}

impl FileStatistics {
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(FILE_SIGNATURE)?;
        writer.write_u32::<LittleEndian>(STATISTICS_SIZE)?;
        writer.write_u8(self.application.id)?;
        writer.write_u8(self.application.major)?;
        writer.write_u8(self.application.minor)?;
        writer.write_u8(self.application.build)?;
        writer.write_u8(self.api.major)?;
        writer.write_u8(self.api.minor)?;
        writer.write_u8(self.api.build)?;
        writer.write_u8(self.api.patch)?;
        writer.write_u64::<LittleEndian>(self.file_size)?;
        writer.write_u64::<LittleEndian>(self.uncompressed_file_size)?;
        writer.write_u32::<LittleEndian>(self.object_count)?;
        writer.write_u32::<LittleEndian>(self.objects_read)?;
        self.measurement_start_time.write(writer)?;
        self.last_object_time.write(writer)?;
        writer.write_u64::<LittleEndian>(self.restore_points_offset)?;
        writer.write_all(&[0u8; RESERVED_WORDS * 4])?;
        Ok(())
    }

    /// Read and validate a header. The signature is checked before anything
    /// else; a larger declared size is tolerated and its tail skipped.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let signature = reader.read_u32::<LittleEndian>()?;
        if signature != FILE_SIGNATURE {
            return Err(BlfError::format(format!("bad file signature 0x{:08x}", signature)));
        }

        let statistics_size = reader.read_u32::<LittleEndian>()?;
        if !(STATISTICS_SIZE..=MAX_STATISTICS_SIZE).contains(&statistics_size) {
            return Err(BlfError::format(format!(
                "file statistics size {} outside {}..={}",
                statistics_size, STATISTICS_SIZE, MAX_STATISTICS_SIZE
            )));
        }

        let application = ApplicationTag {
            id: reader.read_u8()?,
            major: reader.read_u8()?,
            minor: reader.read_u8()?,
            build: reader.read_u8()?,
        };
        let api = ApiVersion {
            major: reader.read_u8()?,
            minor: reader.read_u8()?,
            build: reader.read_u8()?,
            patch: reader.read_u8()?,
        };
        let file_size = reader.read_u64::<LittleEndian>()?;
        let uncompressed_file_size = reader.read_u64::<LittleEndian>()?;
        let object_count = reader.read_u32::<LittleEndian>()?;
        let objects_read = reader.read_u32::<LittleEndian>()?;
        let measurement_start_time = SystemTime::read(reader)?;
        let last_object_time = SystemTime::read(reader)?;
        let restore_points_offset = reader.read_u64::<LittleEndian>()?;

        let mut reserved = vec![0u8; (statistics_size - STATISTICS_SIZE) as usize + RESERVED_WORDS * 4];
        reader.read_exact(&mut reserved)?;

        Ok(Self {
            statistics_size,
            application,
            api,
            file_size,
            uncompressed_file_size,
            object_count,
            objects_read,
            measurement_start_time,
            last_object_time,
            restore_points_offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> FileStatistics {
        FileStatistics {
            application: ApplicationTag { id: 5, major: 1, minor: 2, build: 3 },
            api: ApiVersion { major: 4, minor: 7, build: 1, patch: 0 },
            file_size: 4096,
            uncompressed_file_size: 10_000,
            object_count: 42,
            measurement_start_time: SystemTime {
                year: 2024,
                month: 3,
                day_of_week: 5,
                day: 15,
                hour: 12,
                minute: 30,
                second: 45,
                milliseconds: 250,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_header_layout_size() {
        let mut buffer = Vec::new();
        sample().write(&mut buffer).unwrap();
        assert_eq!(buffer.len(), STATISTICS_SIZE as usize);
        assert_eq!(&buffer[..4], b"LOGG");
    }

    #[test]
    fn test_header_fields_survive_rewrite() {
        let stats = sample();
        let mut buffer = Vec::new();
        stats.write(&mut buffer).unwrap();
        let read = FileStatistics::read(&mut Cursor::new(&buffer)).unwrap();
        assert_eq!(read, stats);
    }

    #[test]
    fn test_wrong_signature_rejected() {
        let mut buffer = Vec::new();
        sample().write(&mut buffer).unwrap();
        buffer[0] = buffer[0].wrapping_sub(1);
        let err = FileStatistics::read(&mut Cursor::new(&buffer)).unwrap_err();
        assert!(matches!(err, BlfError::Format(_)));
    }

    #[test]
    fn test_extended_header_tail_skipped() {
        let mut buffer = Vec::new();
        sample().write(&mut buffer).unwrap();
        buffer[4..8].copy_from_slice(&(STATISTICS_SIZE + 8).to_le_bytes());
        buffer.extend_from_slice(&[0xAA; 8]);
        buffer.extend_from_slice(b"next");

        let mut cursor = Cursor::new(&buffer);
        let read = FileStatistics::read(&mut cursor).unwrap();
        assert_eq!(read.statistics_size, STATISTICS_SIZE + 8);
        assert_eq!(cursor.position(), u64::from(STATISTICS_SIZE) + 8);
    }

    #[test]
    fn test_system_time_offset() {
        let start = sample().measurement_start_time;
        let later = start.offset_by_nanos(1_500_000_000).unwrap();
        assert_eq!(later.second, 46);
        assert_eq!(later.milliseconds, 750);
        assert_eq!(later.minute, 30);
        assert!(SystemTime::default().offset_by_nanos(1).is_none());
    }
}
