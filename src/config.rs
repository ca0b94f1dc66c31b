use crate::codec::CompressionMethod;
use crate::error::{BlfError, Result};
use serde::Serialize;
use std::num::NonZeroUsize;

/// Default uncompressed size of one chunk (128 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 0x20000;

/// Identity of the application that produced a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApplicationTag {
    pub id: u8,
    pub major: u8,
    pub minor: u8,
    pub build: u8,
}

/// Version of the library that wrote a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApiVersion {
    pub major: u8,
    pub minor: u8,
    pub build: u8,
    pub patch: u8,
}

impl ApiVersion {
    /// The version of this crate.
    pub fn current() -> Self {
        let part = |s: &str| s.parse::<u8>().unwrap_or(0);
        Self {
            major: part(env!("CARGO_PKG_VERSION_MAJOR")),
            minor: part(env!("CARGO_PKG_VERSION_MINOR")),
            build: part(env!("CARGO_PKG_VERSION_PATCH")),
            patch: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BlfConfig {
    pub compression_method: CompressionMethod,
    pub compression_level: u16,
    pub chunk_size: usize,
    pub application: ApplicationTag,
    pub api: ApiVersion,
    /// Compress/flush (write) and decompress (read) chunks on a worker thread.
    pub background_io: bool,
    /// Maximum number of decompressed chunks kept in memory; `None` keeps all.
    pub cache_limit: Option<NonZeroUsize>,
}

impl Default for BlfConfig {
    fn default() -> Self {
        Self {
            compression_method: CompressionMethod::Zlib,
            compression_level: 6,
            chunk_size: DEFAULT_CHUNK_SIZE,
            application: ApplicationTag::default(),
            api: ApiVersion::current(),
            background_io: false,
            cache_limit: None,
        }
    }
}

impl BlfConfig {
    /// Switch compression method, resetting the level to the method's default.
    pub fn with_compression(mut self, method: CompressionMethod) -> Self {
        self.compression_method = method;
        self.compression_level = method.default_level();
        self
    }

    pub fn with_level(mut self, level: u16) -> Self {
        self.compression_level = level;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_application(mut self, application: ApplicationTag) -> Self {
        self.application = application;
        self
    }

    pub fn with_api(mut self, api: ApiVersion) -> Self {
        self.api = api;
        self
    }

    pub fn with_background_io(mut self, enabled: bool) -> Self {
        self.background_io = enabled;
        self
    }

    pub fn with_cache_limit(mut self, limit: Option<NonZeroUsize>) -> Self {
        self.cache_limit = limit;
        self
    }

    /// Check every knob before any file is touched.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(BlfError::Config("chunk size must be greater than zero".to_string()));
        }
        if self.chunk_size > u32::MAX as usize {
            return Err(BlfError::Config(format!(
                "chunk size {} exceeds the 32-bit limit",
                self.chunk_size
            )));
        }
        self.compression_method.validate_level(self.compression_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = BlfConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.compression_method, CompressionMethod::Zlib);
        assert_eq!(config.compression_level, 6);
        assert_eq!(config.chunk_size, 0x20000);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let config = BlfConfig::default().with_chunk_size(0);
        assert!(matches!(config.validate(), Err(BlfError::Config(_))));
    }

    #[test]
    fn test_level_checked_against_method() {
        let config = BlfConfig::default().with_level(12);
        assert!(config.validate().is_err());

        let config = BlfConfig::default().with_compression(CompressionMethod::Zstd).with_level(12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_with_compression_resets_level() {
        let config = BlfConfig::default().with_compression(CompressionMethod::None);
        assert_eq!(config.compression_level, 0);
        assert!(config.validate().is_ok());
    }
}
