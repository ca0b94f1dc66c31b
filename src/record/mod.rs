//! Records: an [`Envelope`] followed by a kind-specific payload.
//!
//! Every payload type implements [`RecordCodec`]; the record stream only ever
//! talks to [`Record`], which dispatches on the envelope's kind tag.

mod can;
pub mod envelope;
mod flexray;
mod lin;
mod most;
mod system;

pub use can::{CanErrorFrame, CanMessage};
pub use envelope::{
    padding_len, Envelope, BASE_HEADER_SIZE, HeaderExtension, HeaderLayout, ObjectBase, ObjectFlags, TimeUnit,
    TimestampStatus,
};
pub use flexray::FlexRayData;
pub use lin::{LinBaudrateEvent, LinMessage};
pub use most::MostDataLost;
pub use system::{AppText, RealtimeClock};

use crate::error::{BlfError, Result};
use std::io::{Cursor, Read, Write};

/// Object type tags this crate knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ObjectType {
    CanMessage = 1,
    CanError = 2,
    LogContainer = 10,
    LinMessage = 11,
    LinBaudrate = 19,
    FlexRayData = 29,
    MostDataLost = 38,
    RealtimeClock = 51,
    AppText = 65,
}

impl ObjectType {
    pub fn tag(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for ObjectType {
    type Error = u32;

    fn try_from(tag: u32) -> std::result::Result<Self, u32> {
        let kind = match tag {
            1 => ObjectType::CanMessage,
            2 => ObjectType::CanError,
            10 => ObjectType::LogContainer,
            11 => ObjectType::LinMessage,
            19 => ObjectType::LinBaudrate,
            29 => ObjectType::FlexRayData,
            38 => ObjectType::MostDataLost,
            51 => ObjectType::RealtimeClock,
            65 => ObjectType::AppText,
            other => return Err(other),
        };
        Ok(kind)
    }
}

/// Pack/unpack contract for a record payload.
///
/// `decode` must consume exactly `encoded_size()` bytes of the payload it is
/// handed; the record layer rejects any mismatch with the declared size.
pub trait RecordCodec: Sized {
    const KIND: ObjectType;
    const LAYOUT: HeaderLayout;

    fn decode<R: Read>(reader: &mut R, payload_len: usize) -> Result<Self>;

    fn encode<W: Write>(&self, writer: &mut W) -> Result<()>;

    fn encoded_size(&self) -> usize;
}

macro_rules! record_kinds {
    ($($variant:ident),+ $(,)?) => {
        /// Decoded payload of a known record kind.
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum RecordBody {
            $($variant($variant)),+
        }

        $(
            impl From<$variant> for RecordBody {
                fn from(body: $variant) -> Self {
                    RecordBody::$variant(body)
                }
            }
        )+

        impl RecordBody {
            pub fn kind(&self) -> ObjectType {
                match self {
                    $(RecordBody::$variant(_) => <$variant as RecordCodec>::KIND),+
                }
            }

            pub fn layout(&self) -> HeaderLayout {
                match self {
                    $(RecordBody::$variant(_) => <$variant as RecordCodec>::LAYOUT),+
                }
            }

            pub fn encoded_size(&self) -> usize {
                match self {
                    $(RecordBody::$variant(body) => body.encoded_size()),+
                }
            }

            fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
                match self {
                    $(RecordBody::$variant(body) => body.encode(writer)),+
                }
            }

            /// `None` when no codec is registered for `kind`.
            fn expected_layout(kind: ObjectType) -> Option<HeaderLayout> {
                $(
                    if kind == <$variant as RecordCodec>::KIND {
                        return Some(<$variant as RecordCodec>::LAYOUT);
                    }
                )+
                None
            }

            fn decode<R: Read>(kind: ObjectType, reader: &mut R, payload_len: usize) -> Option<Result<Self>> {
                $(
                    if kind == <$variant as RecordCodec>::KIND {
                        return Some(<$variant as RecordCodec>::decode(reader, payload_len).map(RecordBody::$variant));
                    }
                )+
                None
            }
        }
    };
}

record_kinds!(
    CanMessage,
    CanErrorFrame,
    LinMessage,
    LinBaudrateEvent,
    FlexRayData,
    MostDataLost,
    RealtimeClock,
    AppText,
);

/// One decoded event. Always an independent copy of the stream bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub envelope: Envelope,
    pub body: RecordBody,
}

impl Record {
    /// Build a record with a fresh envelope stamped in nanoseconds.
    pub fn new(body: impl Into<RecordBody>, timestamp_ns: u64) -> Self {
        let body = body.into();
        let mut envelope = Envelope::new(body.kind().tag(), body.layout());
        envelope.timestamp = timestamp_ns;
        envelope.object_size = (usize::from(envelope.header_size()) + body.encoded_size()) as u32;
        Self { envelope, body }
    }

    pub fn kind(&self) -> ObjectType {
        self.body.kind()
    }

    /// Header plus payload, excluding padding.
    pub fn encoded_size(&self) -> usize {
        usize::from(self.body.layout().header_size()) + self.body.encoded_size()
    }

    /// Serialize header, payload and padding. The declared object size is
    /// recomputed from the payload, whatever the envelope held before.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let layout = self.body.layout();
        if self.envelope.layout() != layout {
            return Err(BlfError::format(format!(
                "{:?} needs a {:?} header, envelope has {:?}",
                self.kind(),
                layout,
                self.envelope.layout()
            )));
        }

        let object_size = u32::try_from(self.encoded_size())
            .map_err(|_| BlfError::format("record larger than 4 GiB"))?;
        let mut envelope = self.envelope.clone();
        envelope.kind = self.kind().tag();
        envelope.object_size = object_size;

        let padding = padding_len(object_size) as usize;
        let mut out = Vec::with_capacity(object_size as usize + padding);
        envelope.write(&mut out)?;
        self.body.encode(&mut out)?;
        if out.len() != object_size as usize {
            return Err(BlfError::format(format!(
                "{:?} codec wrote {} bytes but reported {}",
                self.kind(),
                out.len(),
                object_size
            )));
        }
        out.resize(out.len() + padding, 0);
        Ok(out)
    }

    /// Decode one record from exactly its declared object bytes (no padding).
    pub fn decode(bytes: &[u8]) -> Result<Record> {
        let mut cursor = Cursor::new(bytes);
        let envelope = Envelope::read(&mut cursor).map_err(|e| e.truncated_as_format("record header"))?;
        if envelope.object_size as usize != bytes.len() {
            return Err(BlfError::format(format!(
                "record declares {} bytes, {} supplied",
                envelope.object_size,
                bytes.len()
            )));
        }

        let kind = match ObjectType::try_from(envelope.kind) {
            Ok(kind) => kind,
            Err(_) => return Err(BlfError::UnknownKind { envelope: Box::new(envelope) }),
        };
        let expected = match RecordBody::expected_layout(kind) {
            Some(layout) => layout,
            None => return Err(BlfError::UnknownKind { envelope: Box::new(envelope) }),
        };
        if envelope.layout() != expected {
            return Err(BlfError::format(format!(
                "{:?} record carries a {:?} header, expected {:?}",
                kind,
                envelope.layout(),
                expected
            )));
        }

        let payload_len = bytes.len() - usize::from(envelope.header_size());
        let body = match RecordBody::decode(kind, &mut cursor, payload_len) {
            Some(result) => result.map_err(|e| e.truncated_as_format("record payload"))?,
            None => return Err(BlfError::UnknownKind { envelope: Box::new(envelope) }),
        };

        let consumed = cursor.position() as usize;
        if consumed != bytes.len() || body.encoded_size() != payload_len {
            return Err(BlfError::format(format!(
                "{:?} record declares {} bytes but decodes {}",
                kind,
                bytes.len(),
                consumed
            )));
        }

        Ok(Record { envelope, body })
    }
}
