use super::{ObjectType, RecordCodec};
use crate::error::{BlfError, Result};
use crate::record::envelope::HeaderLayout;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Wall-clock reference captured by the logger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RealtimeClock {
    /// Nanoseconds since 1970-01-01.
    pub time: u64,
    pub logging_offset: u64,
}

impl RecordCodec for RealtimeClock {
    const KIND: ObjectType = ObjectType::RealtimeClock;
    const LAYOUT: HeaderLayout = HeaderLayout::V1;

    fn decode<R: Read>(reader: &mut R, _payload_len: usize) -> Result<Self> {
        Ok(Self {
            time: reader.read_u64::<LittleEndian>()?,
            logging_offset: reader.read_u64::<LittleEndian>()?,
        })
    }

    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u64::<LittleEndian>(self.time)?;
        writer.write_u64::<LittleEndian>(self.logging_offset)?;
        Ok(())
    }

    fn encoded_size(&self) -> usize {
        16
    }
}

const APP_TEXT_FIXED: usize = 16;

/// Free-form text attached to a measurement (comments, database info).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppText {
    pub source: u32,
    pub reserved1: u32,
    pub reserved2: u32,
    pub text: Vec<u8>,
}

impl AppText {
    pub fn new(source: u32, text: &str) -> Self {
        Self { source, text: text.as_bytes().to_vec(), ..Default::default() }
    }

    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.text).into_owned()
    }
}

impl RecordCodec for AppText {
    const KIND: ObjectType = ObjectType::AppText;
    const LAYOUT: HeaderLayout = HeaderLayout::V1;

    fn decode<R: Read>(reader: &mut R, payload_len: usize) -> Result<Self> {
        let source = reader.read_u32::<LittleEndian>()?;
        let reserved1 = reader.read_u32::<LittleEndian>()?;
        let text_length = reader.read_u32::<LittleEndian>()? as usize;
        let reserved2 = reader.read_u32::<LittleEndian>()?;
        if APP_TEXT_FIXED + text_length > payload_len {
            return Err(BlfError::format(format!(
                "app text length {} overruns its {}-byte payload",
                text_length, payload_len
            )));
        }
        let mut text = vec![0u8; text_length];
        reader.read_exact(&mut text)?;
        Ok(Self { source, reserved1, reserved2, text })
    }

    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        let text_length = u32::try_from(self.text.len())
            .map_err(|_| BlfError::format("app text longer than 4 GiB"))?;
        writer.write_u32::<LittleEndian>(self.source)?;
        writer.write_u32::<LittleEndian>(self.reserved1)?;
        writer.write_u32::<LittleEndian>(text_length)?;
        writer.write_u32::<LittleEndian>(self.reserved2)?;
        writer.write_all(&self.text)?;
        Ok(())
    }

    fn encoded_size(&self) -> usize {
        APP_TEXT_FIXED + self.text.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_app_text_variable_size() {
        let text = AppText::new(2, "bus database: powertrain.dbc");
        assert_eq!(text.encoded_size(), 16 + 28);
        let mut buffer = Vec::new();
        text.encode(&mut buffer).unwrap();
        let decoded = AppText::decode(&mut Cursor::new(&buffer), buffer.len()).unwrap();
        assert_eq!(decoded.text_lossy(), "bus database: powertrain.dbc");
        assert_eq!(decoded, text);
    }

    #[test]
    fn test_app_text_length_overrun() {
        let mut buffer = Vec::new();
        AppText::new(0, "abcdef").encode(&mut buffer).unwrap();
        let err = AppText::decode(&mut Cursor::new(&buffer), 18).unwrap_err();
        assert!(matches!(err, BlfError::Format(_)));
    }

    #[test]
    fn test_realtime_clock_fields() {
        let clock = RealtimeClock { time: 0x1111_1111_1111_1111, logging_offset: 0x2222_2222_2222_2222 };
        let mut buffer = Vec::new();
        clock.encode(&mut buffer).unwrap();
        assert_eq!(buffer.len(), 16);
        assert_eq!(RealtimeClock::decode(&mut Cursor::new(&buffer), 16).unwrap(), clock);
    }
}
