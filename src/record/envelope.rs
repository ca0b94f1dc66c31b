//! Object headers shared by records and chunks.

use crate::error::{BlfError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Object signature "LOBJ".
pub const OBJECT_SIGNATURE: u32 = 0x4A42_4F4C;

/// Size of the base header every object starts with.
pub const BASE_HEADER_SIZE: u16 = 16;

/// Objects are aligned to this many bytes on disk and in the record stream.
pub const ALIGNMENT: u32 = 4;

/// Zero bytes that follow an object of `object_size` bytes.
pub fn padding_len(object_size: u32) -> u32 {
    (ALIGNMENT - object_size % ALIGNMENT) % ALIGNMENT
}

bitflags::bitflags! {
    /// Unit of the object timestamp.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ObjectFlags: u32 {
        const TIME_TEN_MICS = 0x0000_0001;
        const TIME_ONE_NANS = 0x0000_0002;
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct TimestampStatus: u8 {
        /// The original timestamp field is valid.
        const ORIG = 0x01;
        /// Software generated timestamp (hardware when clear).
        const SW_HW = 0x02;
        const USER = 0x10;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    TenMicros,
    Nanos,
}

/// The leading 16 bytes of every object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObjectBase {
    pub header_size: u16,
    pub header_version: u16,
    pub object_size: u32,
    pub object_type: u32,
}

impl ObjectBase {
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let signature = reader.read_u32::<LittleEndian>()?;
        if signature != OBJECT_SIGNATURE {
            return Err(BlfError::format(format!("bad object signature 0x{:08x}", signature)));
        }
        let base = Self {
            header_size: reader.read_u16::<LittleEndian>()?,
            header_version: reader.read_u16::<LittleEndian>()?,
            object_size: reader.read_u32::<LittleEndian>()?,
            object_type: reader.read_u32::<LittleEndian>()?,
        };
        if base.header_size < BASE_HEADER_SIZE || base.object_size < u32::from(base.header_size) {
            return Err(BlfError::format(format!(
                "object type {} declares header size {} and object size {}",
                base.object_type, base.header_size, base.object_size
            )));
        }
        Ok(base)
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(OBJECT_SIGNATURE)?;
        writer.write_u16::<LittleEndian>(self.header_size)?;
        writer.write_u16::<LittleEndian>(self.header_version)?;
        writer.write_u32::<LittleEndian>(self.object_size)?;
        writer.write_u32::<LittleEndian>(self.object_type)?;
        Ok(())
    }

    /// Bytes this object occupies including trailing padding.
    pub fn stride(&self) -> u64 {
        u64::from(self.object_size) + u64::from(padding_len(self.object_size))
    }
}

/// Header layouts, told apart by the declared header size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderLayout {
    /// Base header only.
    Base,
    /// Base + flags, client index, version, timestamp.
    V1,
    /// Base + flags, timestamp status, version, timestamp, original timestamp.
    V2,
}

impl HeaderLayout {
    pub fn header_size(self) -> u16 {
        match self {
            HeaderLayout::Base => BASE_HEADER_SIZE,
            HeaderLayout::V1 => 32,
            HeaderLayout::V2 => 40,
        }
    }

    pub fn header_version(self) -> u16 {
        match self {
            HeaderLayout::Base | HeaderLayout::V1 => 1,
            HeaderLayout::V2 => 2,
        }
    }

    fn from_header_size(size: u16) -> Option<Self> {
        match size {
            16 => Some(HeaderLayout::Base),
            32 => Some(HeaderLayout::V1),
            40 => Some(HeaderLayout::V2),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderExtension {
    Base,
    V1 {
        client_index: u16,
    },
    V2 {
        timestamp_status: TimestampStatus,
        reserved: u8,
        original_timestamp: u64,
    },
}

/// Common prefix of every record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub kind: u32,
    /// Kept as read; some writers put 1 here for v2 headers.
    pub header_version: u16,
    /// Header plus payload, excluding padding.
    pub object_size: u32,
    pub flags: ObjectFlags,
    pub object_version: u16,
    pub timestamp: u64,
    pub extension: HeaderExtension,
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new(0, HeaderLayout::V1)
    }
}

impl Envelope {
    pub fn new(kind: u32, layout: HeaderLayout) -> Self {
        let extension = match layout {
            HeaderLayout::Base => HeaderExtension::Base,
            HeaderLayout::V1 => HeaderExtension::V1 { client_index: 0 },
            HeaderLayout::V2 => HeaderExtension::V2 {
                timestamp_status: TimestampStatus::empty(),
                reserved: 0,
                original_timestamp: 0,
            },
        };
        Self {
            kind,
            header_version: layout.header_version(),
            object_size: u32::from(layout.header_size()),
            flags: ObjectFlags::TIME_ONE_NANS,
            object_version: 0,
            timestamp: 0,
            extension,
        }
    }

    pub fn layout(&self) -> HeaderLayout {
        match self.extension {
            HeaderExtension::Base => HeaderLayout::Base,
            HeaderExtension::V1 { .. } => HeaderLayout::V1,
            HeaderExtension::V2 { .. } => HeaderLayout::V2,
        }
    }

    pub fn header_size(&self) -> u16 {
        self.layout().header_size()
    }

    pub fn time_unit(&self) -> TimeUnit {
        if self.flags.contains(ObjectFlags::TIME_TEN_MICS) {
            TimeUnit::TenMicros
        } else {
            TimeUnit::Nanos
        }
    }

    /// Timestamp converted to nanoseconds.
    pub fn timestamp_nanos(&self) -> u64 {
        match self.time_unit() {
            TimeUnit::TenMicros => self.timestamp.saturating_mul(10_000),
            TimeUnit::Nanos => self.timestamp,
        }
    }

    /// Original (hardware) timestamp, when the header carries a valid one.
    pub fn original_timestamp(&self) -> Option<u64> {
        match self.extension {
            HeaderExtension::V2 { timestamp_status, original_timestamp, .. }
                if timestamp_status.contains(TimestampStatus::ORIG) =>
            {
                Some(original_timestamp)
            }
            _ => None,
        }
    }

    pub fn set_original_timestamp(&mut self, value: Option<u64>) {
        if let HeaderExtension::V2 { timestamp_status, original_timestamp, .. } = &mut self.extension {
            timestamp_status.set(TimestampStatus::ORIG, value.is_some());
            *original_timestamp = value.unwrap_or(0);
        }
    }

    pub fn is_software_timestamp(&self) -> bool {
        matches!(
            self.extension,
            HeaderExtension::V2 { timestamp_status, .. } if timestamp_status.contains(TimestampStatus::SW_HW)
        )
    }

    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let base = ObjectBase::read(reader)?;
        Self::read_after_base(base, reader)
    }

    /// Continue decoding once the base header has been consumed.
    pub fn read_after_base<R: Read>(base: ObjectBase, reader: &mut R) -> Result<Self> {
        let layout = HeaderLayout::from_header_size(base.header_size).ok_or_else(|| {
            BlfError::format(format!(
                "unsupported header size {} for object type {}",
                base.header_size, base.object_type
            ))
        })?;
        if base.header_version != layout.header_version() {
            log::warn!(
                "object type {} has header version {} with a {}-byte header",
                base.object_type,
                base.header_version,
                base.header_size
            );
        }

        let mut envelope = Self {
            kind: base.object_type,
            header_version: base.header_version,
            object_size: base.object_size,
            flags: ObjectFlags::empty(),
            object_version: 0,
            timestamp: 0,
            extension: HeaderExtension::Base,
        };

        match layout {
            HeaderLayout::Base => {}
            HeaderLayout::V1 => {
                envelope.flags = ObjectFlags::from_bits_retain(reader.read_u32::<LittleEndian>()?);
                let client_index = reader.read_u16::<LittleEndian>()?;
                envelope.object_version = reader.read_u16::<LittleEndian>()?;
                envelope.timestamp = reader.read_u64::<LittleEndian>()?;
                envelope.extension = HeaderExtension::V1 { client_index };
            }
            HeaderLayout::V2 => {
                envelope.flags = ObjectFlags::from_bits_retain(reader.read_u32::<LittleEndian>()?);
                let timestamp_status = TimestampStatus::from_bits_retain(reader.read_u8()?);
                let reserved = reader.read_u8()?;
                envelope.object_version = reader.read_u16::<LittleEndian>()?;
                envelope.timestamp = reader.read_u64::<LittleEndian>()?;
                let original_timestamp = reader.read_u64::<LittleEndian>()?;
                envelope.extension = HeaderExtension::V2 { timestamp_status, reserved, original_timestamp };
            }
        }
        Ok(envelope)
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        ObjectBase {
            header_size: self.header_size(),
            header_version: self.header_version,
            object_size: self.object_size,
            object_type: self.kind,
        }
        .write(writer)?;

        match self.extension {
            HeaderExtension::Base => {}
            HeaderExtension::V1 { client_index } => {
                writer.write_u32::<LittleEndian>(self.flags.bits())?;
                writer.write_u16::<LittleEndian>(client_index)?;
                writer.write_u16::<LittleEndian>(self.object_version)?;
                writer.write_u64::<LittleEndian>(self.timestamp)?;
            }
            HeaderExtension::V2 { timestamp_status, reserved, original_timestamp } => {
                writer.write_u32::<LittleEndian>(self.flags.bits())?;
                writer.write_u8(timestamp_status.bits())?;
                writer.write_u8(reserved)?;
                writer.write_u16::<LittleEndian>(self.object_version)?;
                writer.write_u64::<LittleEndian>(self.timestamp)?;
                writer.write_u64::<LittleEndian>(original_timestamp)?;
            }
        }
        Ok(())
    }
}
