use super::{ObjectType, RecordCodec};
use crate::error::Result;
use crate::record::envelope::HeaderLayout;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Messages lost on a MOST bus.
///
/// Uses the v2 header. Some writers still declare header version 1 for it,
/// which decoding accepts as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MostDataLost {
    pub channel: u16,
    pub reserved: u16,
    pub info: u32,
    pub lost_msgs_ctrl: u32,
    pub lost_msgs_async: u32,
    pub last_good_timestamp_ns: u64,
    pub next_good_timestamp_ns: u64,
}

impl RecordCodec for MostDataLost {
    const KIND: ObjectType = ObjectType::MostDataLost;
    const LAYOUT: HeaderLayout = HeaderLayout::V2;

    fn decode<R: Read>(reader: &mut R, _payload_len: usize) -> Result<Self> {
        Ok(Self {
            channel: reader.read_u16::<LittleEndian>()?,
            reserved: reader.read_u16::<LittleEndian>()?,
            info: reader.read_u32::<LittleEndian>()?,
            lost_msgs_ctrl: reader.read_u32::<LittleEndian>()?,
            lost_msgs_async: reader.read_u32::<LittleEndian>()?,
            last_good_timestamp_ns: reader.read_u64::<LittleEndian>()?,
            next_good_timestamp_ns: reader.read_u64::<LittleEndian>()?,
        })
    }

    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<LittleEndian>(self.channel)?;
        writer.write_u16::<LittleEndian>(self.reserved)?;
        writer.write_u32::<LittleEndian>(self.info)?;
        writer.write_u32::<LittleEndian>(self.lost_msgs_ctrl)?;
        writer.write_u32::<LittleEndian>(self.lost_msgs_async)?;
        writer.write_u64::<LittleEndian>(self.last_good_timestamp_ns)?;
        writer.write_u64::<LittleEndian>(self.next_good_timestamp_ns)?;
        Ok(())
    }

    fn encoded_size(&self) -> usize {
        32
    }
}
