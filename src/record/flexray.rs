use super::{ObjectType, RecordCodec};
use crate::error::Result;
use crate::record::envelope::HeaderLayout;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlexRayData {
    pub channel: u16,
    pub mux: u8,
    pub len: u8,
    pub message_id: u16,
    pub crc: u16,
    pub dir: u8,
    pub reserved1: u8,
    pub reserved2: u16,
    pub data_bytes: [u8; 12],
}

impl RecordCodec for FlexRayData {
    const KIND: ObjectType = ObjectType::FlexRayData;
    const LAYOUT: HeaderLayout = HeaderLayout::V1;

    fn decode<R: Read>(reader: &mut R, _payload_len: usize) -> Result<Self> {
        let mut frame = Self {
            channel: reader.read_u16::<LittleEndian>()?,
            mux: reader.read_u8()?,
            len: reader.read_u8()?,
            message_id: reader.read_u16::<LittleEndian>()?,
            crc: reader.read_u16::<LittleEndian>()?,
            dir: reader.read_u8()?,
            reserved1: reader.read_u8()?,
            reserved2: reader.read_u16::<LittleEndian>()?,
            data_bytes: [0u8; 12],
        };
        reader.read_exact(&mut frame.data_bytes)?;
        Ok(frame)
    }

    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<LittleEndian>(self.channel)?;
        writer.write_u8(self.mux)?;
        writer.write_u8(self.len)?;
        writer.write_u16::<LittleEndian>(self.message_id)?;
        writer.write_u16::<LittleEndian>(self.crc)?;
        writer.write_u8(self.dir)?;
        writer.write_u8(self.reserved1)?;
        writer.write_u16::<LittleEndian>(self.reserved2)?;
        writer.write_all(&self.data_bytes)?;
        Ok(())
    }

    fn encoded_size(&self) -> usize {
        24
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_data_bytes_follow_fixed_fields() {
        let frame = FlexRayData {
            channel: 1,
            message_id: 0x0203,
            data_bytes: [9; 12],
            ..Default::default()
        };
        let mut buffer = Vec::new();
        frame.encode(&mut buffer).unwrap();
        assert_eq!(buffer.len(), 24);
        assert_eq!(&buffer[4..6], &[0x03, 0x02]);
        assert_eq!(&buffer[12..], &[9; 12]);
        assert_eq!(FlexRayData::decode(&mut Cursor::new(&buffer), 24).unwrap(), frame);
    }
}
