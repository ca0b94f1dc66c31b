//! Per-chunk compression.
//!
//! `Zlib` is the container format's native method; `Lz4` and `Zstd` are
//! extensions that readers without them reject as an unknown method.

use crate::error::{BlfError, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::Serialize;
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CompressionMethod {
    None = 0,
    Zlib = 2,
    Lz4 = 3,
    Zstd = 4,
}

impl CompressionMethod {
    pub fn id(self) -> u16 {
        self as u16
    }

    /// Default level for this method.
    pub fn default_level(self) -> u16 {
        match self {
            CompressionMethod::None | CompressionMethod::Lz4 => 0,
            CompressionMethod::Zlib => 6,
            CompressionMethod::Zstd => 3,
        }
    }

    /// Accepted level range, inclusive.
    pub fn level_range(self) -> (u16, u16) {
        match self {
            CompressionMethod::None | CompressionMethod::Lz4 => (0, 0),
            CompressionMethod::Zlib => (0, 9),
            CompressionMethod::Zstd => (1, 22),
        }
    }

    pub fn validate_level(self, level: u16) -> Result<()> {
        let (min, max) = self.level_range();
        if level < min || level > max {
            return Err(BlfError::Config(format!(
                "compression level {} out of range {}..={} for {}",
                level, min, max, self
            )));
        }
        Ok(())
    }
}

impl TryFrom<u16> for CompressionMethod {
    type Error = BlfError;

    fn try_from(id: u16) -> Result<Self> {
        match id {
            0 => Ok(CompressionMethod::None),
            2 => Ok(CompressionMethod::Zlib),
            3 => Ok(CompressionMethod::Lz4),
            4 => Ok(CompressionMethod::Zstd),
            _ => Err(BlfError::format(format!("unknown compression method {}", id))),
        }
    }
}

impl FromStr for CompressionMethod {
    type Err = BlfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "none" | "stored" => Ok(CompressionMethod::None),
            "zlib" | "deflate" => Ok(CompressionMethod::Zlib),
            "lz4" => Ok(CompressionMethod::Lz4),
            "zstd" => Ok(CompressionMethod::Zstd),
            _ => Err(BlfError::Config(format!("Invalid compression method: {}", s))),
        }
    }
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompressionMethod::None => "none",
            CompressionMethod::Zlib => "zlib",
            CompressionMethod::Lz4 => "lz4",
            CompressionMethod::Zstd => "zstd",
        };
        f.write_str(name)
    }
}

/// Compress `data` with `method` at `level`.
pub fn compress(data: &[u8], method: CompressionMethod, level: u16) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::None => Ok(data.to_vec()),
        CompressionMethod::Zlib => {
            let mut encoder = ZlibEncoder::new(
                Vec::with_capacity(data.len() / 2 + 64),
                Compression::new(u32::from(level)),
            );
            encoder.write_all(data)?;
            Ok(encoder.finish()?)
        }
        CompressionMethod::Lz4 => Ok(lz4_flex::compress(data)),
        CompressionMethod::Zstd => zstd::bulk::compress(data, i32::from(level))
            .map_err(|e| BlfError::Compression(format!("zstd: {}", e))),
    }
}

/// Decompress `data`, which must expand to exactly `declared_size` bytes.
pub fn decompress(data: &[u8], declared_size: usize, method: CompressionMethod) -> Result<Vec<u8>> {
    let output = match method {
        CompressionMethod::None => data.to_vec(),
        CompressionMethod::Zlib => {
            // Read one byte past the declared size so an oversized payload is caught.
            let mut output = Vec::with_capacity(declared_size);
            ZlibDecoder::new(data)
                .take(declared_size as u64 + 1)
                .read_to_end(&mut output)
                .map_err(|e| BlfError::format(format!("zlib payload corrupt: {}", e)))?;
            output
        }
        CompressionMethod::Lz4 => lz4_flex::decompress(data, declared_size)
            .map_err(|e| BlfError::format(format!("lz4 payload corrupt: {}", e)))?,
        CompressionMethod::Zstd => zstd::bulk::decompress(data, declared_size)
            .map_err(|e| BlfError::format(format!("zstd payload corrupt: {}", e)))?,
    };

    if output.len() != declared_size {
        return Err(BlfError::format(format!(
            "decompressed size {} does not match declared size {}",
            output.len(),
            declared_size
        )));
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        (0..4096u32).flat_map(|x| (x % 97).to_le_bytes()).collect()
    }

    #[test]
    fn test_all_methods_restore_input() {
        let data = sample();
        for method in [
            CompressionMethod::None,
            CompressionMethod::Zlib,
            CompressionMethod::Lz4,
            CompressionMethod::Zstd,
        ] {
            let packed = compress(&data, method, method.default_level()).unwrap();
            let unpacked = decompress(&packed, data.len(), method).unwrap();
            assert_eq!(unpacked, data, "method {}", method);
        }
    }

    #[test]
    fn test_zlib_compresses_repetitive_data() {
        let data = vec![7u8; 10_000];
        let packed = compress(&data, CompressionMethod::Zlib, 9).unwrap();
        assert!(packed.len() < 200);
    }

    #[test]
    fn test_declared_size_mismatch_is_format_error() {
        let data = sample();
        for method in [
            CompressionMethod::None,
            CompressionMethod::Zlib,
            CompressionMethod::Lz4,
            CompressionMethod::Zstd,
        ] {
            let packed = compress(&data, method, method.default_level()).unwrap();
            let err = decompress(&packed, data.len() - 1, method).unwrap_err();
            assert!(matches!(err, BlfError::Format(_)), "method {}", method);
            let err = decompress(&packed, data.len() + 1, method).unwrap_err();
            assert!(matches!(err, BlfError::Format(_)), "method {}", method);
        }
    }

    #[test]
    fn test_garbage_payload_is_format_error() {
        let err = decompress(&[0xde, 0xad, 0xbe, 0xef], 16, CompressionMethod::Zlib).unwrap_err();
        assert!(matches!(err, BlfError::Format(_)));
    }

    #[test]
    fn test_method_ids_and_parsing() {
        assert_eq!(CompressionMethod::try_from(2).unwrap(), CompressionMethod::Zlib);
        assert!(CompressionMethod::try_from(1).is_err());
        assert_eq!("ZSTD".parse::<CompressionMethod>().unwrap(), CompressionMethod::Zstd);
        assert!("brotli".parse::<CompressionMethod>().is_err());
    }

    #[test]
    fn test_level_validation() {
        assert!(CompressionMethod::Zlib.validate_level(9).is_ok());
        assert!(CompressionMethod::Zlib.validate_level(10).is_err());
        assert!(CompressionMethod::Zstd.validate_level(0).is_err());
        assert!(CompressionMethod::Lz4.validate_level(1).is_err());
    }
}
