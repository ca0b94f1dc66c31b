use super::{ObjectType, RecordCodec};
use crate::error::Result;
use crate::record::envelope::HeaderLayout;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Classic CAN frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanMessage {
    pub channel: u16,
    /// Direction and remote-frame bits.
    pub flags: u8,
    pub dlc: u8,
    pub id: u32,
    pub data: [u8; 8],
}

impl RecordCodec for CanMessage {
    const KIND: ObjectType = ObjectType::CanMessage;
    const LAYOUT: HeaderLayout = HeaderLayout::V1;

    fn decode<R: Read>(reader: &mut R, _payload_len: usize) -> Result<Self> {
        let channel = reader.read_u16::<LittleEndian>()?;
        let flags = reader.read_u8()?;
        let dlc = reader.read_u8()?;
        let id = reader.read_u32::<LittleEndian>()?;
        let mut data = [0u8; 8];
        reader.read_exact(&mut data)?;
        Ok(Self { channel, flags, dlc, id, data })
    }

    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<LittleEndian>(self.channel)?;
        writer.write_u8(self.flags)?;
        writer.write_u8(self.dlc)?;
        writer.write_u32::<LittleEndian>(self.id)?;
        writer.write_all(&self.data)?;
        Ok(())
    }

    fn encoded_size(&self) -> usize {
        16
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanErrorFrame {
    pub channel: u16,
    /// Length of the error frame, may be 0.
    pub length: u16,
    pub reserved: u32,
}

impl RecordCodec for CanErrorFrame {
    const KIND: ObjectType = ObjectType::CanError;
    const LAYOUT: HeaderLayout = HeaderLayout::V1;

    fn decode<R: Read>(reader: &mut R, _payload_len: usize) -> Result<Self> {
        Ok(Self {
            channel: reader.read_u16::<LittleEndian>()?,
            length: reader.read_u16::<LittleEndian>()?,
            reserved: reader.read_u32::<LittleEndian>()?,
        })
    }

    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<LittleEndian>(self.channel)?;
        writer.write_u16::<LittleEndian>(self.length)?;
        writer.write_u32::<LittleEndian>(self.reserved)?;
        Ok(())
    }

    fn encoded_size(&self) -> usize {
        8
    }
}
