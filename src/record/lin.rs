use super::{ObjectType, RecordCodec};
use crate::error::Result;
use crate::record::envelope::HeaderLayout;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinMessage {
    pub channel: u16,
    pub id: u8,
    pub dlc: u8,
    pub data: [u8; 8],
    pub fsm_id: u8,
    pub fsm_state: u8,
    pub header_time: u8,
    pub full_time: u8,
    pub crc: u16,
    /// 0 = Rx, 1 = Tx receipt, 2 = Tx request.
    pub dir: u8,
    pub reserved1: u8,
    pub reserved2: u32,
}

impl RecordCodec for LinMessage {
    const KIND: ObjectType = ObjectType::LinMessage;
    const LAYOUT: HeaderLayout = HeaderLayout::V1;

    fn decode<R: Read>(reader: &mut R, _payload_len: usize) -> Result<Self> {
        let channel = reader.read_u16::<LittleEndian>()?;
        let id = reader.read_u8()?;
        let dlc = reader.read_u8()?;
        let mut data = [0u8; 8];
        reader.read_exact(&mut data)?;
        Ok(Self {
            channel,
            id,
            dlc,
            data,
            fsm_id: reader.read_u8()?,
            fsm_state: reader.read_u8()?,
            header_time: reader.read_u8()?,
            full_time: reader.read_u8()?,
            crc: reader.read_u16::<LittleEndian>()?,
            dir: reader.read_u8()?,
            reserved1: reader.read_u8()?,
            reserved2: reader.read_u32::<LittleEndian>()?,
        })
    }

    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<LittleEndian>(self.channel)?;
        writer.write_u8(self.id)?;
        writer.write_u8(self.dlc)?;
        writer.write_all(&self.data)?;
        writer.write_u8(self.fsm_id)?;
        writer.write_u8(self.fsm_state)?;
        writer.write_u8(self.header_time)?;
        writer.write_u8(self.full_time)?;
        writer.write_u16::<LittleEndian>(self.crc)?;
        writer.write_u8(self.dir)?;
        writer.write_u8(self.reserved1)?;
        writer.write_u32::<LittleEndian>(self.reserved2)?;
        Ok(())
    }

    fn encoded_size(&self) -> usize {
        24
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinBaudrateEvent {
    pub channel: u16,
    pub reserved: u16,
    /// Bits per second.
    pub baudrate: i32,
}

impl RecordCodec for LinBaudrateEvent {
    const KIND: ObjectType = ObjectType::LinBaudrate;
    const LAYOUT: HeaderLayout = HeaderLayout::V1;

    fn decode<R: Read>(reader: &mut R, _payload_len: usize) -> Result<Self> {
        Ok(Self {
            channel: reader.read_u16::<LittleEndian>()?,
            reserved: reader.read_u16::<LittleEndian>()?,
            baudrate: reader.read_i32::<LittleEndian>()?,
        })
    }

    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<LittleEndian>(self.channel)?;
        writer.write_u16::<LittleEndian>(self.reserved)?;
        writer.write_i32::<LittleEndian>(self.baudrate)?;
        Ok(())
    }

    fn encoded_size(&self) -> usize {
        8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_lin_message_size_and_fields() {
        let msg = LinMessage {
            channel: 0x1111,
            id: 0x22,
            dlc: 0x33,
            data: [0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB],
            fsm_id: 0xCC,
            fsm_state: 0xDD,
            header_time: 0xEE,
            full_time: 0xFF,
            crc: 0x1111,
            dir: 0x22,
            reserved1: 0x33,
            reserved2: 0,
        };
        let mut buffer = Vec::new();
        msg.encode(&mut buffer).unwrap();
        assert_eq!(buffer.len(), 24);
        let decoded = LinMessage::decode(&mut Cursor::new(&buffer), buffer.len()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_baudrate_is_signed_little_endian() {
        let bytes = [0x01, 0x00, 0x00, 0x00, 0x00, 0x4B, 0x00, 0x00];
        let event = LinBaudrateEvent::decode(&mut Cursor::new(&bytes[..]), bytes.len()).unwrap();
        assert_eq!(event.channel, 1);
        assert_eq!(event.baudrate, 19_200);
    }
}
