use crate::byte_file::OpenMode;
use crate::record::Envelope;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlfError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid BLF format: {0}")]
    Format(String),

    #[error("Unknown record kind {} ({} bytes)", .envelope.kind, .envelope.object_size)]
    UnknownKind { envelope: Box<Envelope> },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Compression failed: {0}")]
    Compression(String),

    #[error("Invalid seek: {0}")]
    InvalidSeek(String),

    #[error("Operation not supported in {0:?} mode")]
    WrongMode(OpenMode),

    #[error("File is not open")]
    NotOpen,

    #[error("Background worker failed: {0}")]
    Worker(String),
}

impl BlfError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        BlfError::Format(msg.into())
    }

    /// Turn an unexpected end of input into a format error naming `what`.
    pub(crate) fn truncated_as_format(self, what: &str) -> Self {
        match self {
            BlfError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                BlfError::Format(format!("truncated {}", what))
            }
            other => other,
        }
    }

    /// Whether the stream stays usable after this error.
    ///
    /// Only an unknown record kind is recoverable: the record stream has
    /// already stepped over the record, so the next read continues with the
    /// following one.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, BlfError::UnknownKind { .. })
    }
}

pub type Result<T> = std::result::Result<T, BlfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unknown_kind_is_recoverable() {
        let unknown = BlfError::UnknownKind { envelope: Box::new(Envelope::default()) };
        assert!(unknown.is_recoverable());
        assert!(!BlfError::format("bad magic").is_recoverable());
        assert!(!BlfError::NotOpen.is_recoverable());
    }

    #[test]
    fn test_truncation_becomes_format_error() {
        let eof: BlfError = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(matches!(eof.truncated_as_format("chunk"), BlfError::Format(msg) if msg == "truncated chunk"));

        let denied: BlfError = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no").into();
        assert!(matches!(denied.truncated_as_format("chunk"), BlfError::Io(_)));
    }

    #[test]
    fn test_io_conversion() {
        let err: BlfError = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(matches!(err, BlfError::Io(_)));
    }
}
