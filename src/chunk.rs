use crate::codec::{self, CompressionMethod};
use crate::error::{BlfError, Result};
use crate::record::{padding_len, ObjectBase, ObjectType, BASE_HEADER_SIZE};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Base header plus the container fields that precede the payload.
pub const CHUNK_HEADER_SIZE: u32 = 32;

/// Framing in front of each compressed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
	/// Header plus compressed payload, excluding padding.
	pub object_size: u32,
	pub compression_method: CompressionMethod,
	pub compression_level: u16,
	pub uncompressed_size: u32,
}

impl ChunkHeader {
	pub fn compressed_size(&self) -> u32 {
		self.object_size - CHUNK_HEADER_SIZE
	}

	/// Bytes the chunk occupies on disk, padding included.
	pub fn stride(&self) -> u64 {
		u64::from(self.object_size) + u64::from(padding_len(self.object_size))
	}

	pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
		ObjectBase {
			header_size: BASE_HEADER_SIZE,
			header_version: 1,
			object_size: self.object_size,
			object_type: ObjectType::LogContainer.tag(),
		}
		.write(writer)?;
		writer.write_u16::<LittleEndian>(self.compression_method.id())?;
		writer.write_u16::<LittleEndian>(self.compression_level)?;
		writer.write_u32::<LittleEndian>(0)?;
		writer.write_u32::<LittleEndian>(self.uncompressed_size)?;
		writer.write_u32::<LittleEndian>(0)?;
		Ok(())
	}

	/// The header as one fixed block.
	pub fn to_bytes(&self) -> Result<[u8; CHUNK_HEADER_SIZE as usize]> {
		let mut raw = [0u8; CHUNK_HEADER_SIZE as usize];
		let mut block: &mut [u8] = &mut raw;
		self.write(&mut block)?;
		Ok(raw)
	}

	/// Decode a header from a block read in one call.
	pub fn from_bytes(raw: &[u8; CHUNK_HEADER_SIZE as usize]) -> Result<Self> {
		let mut block: &[u8] = raw;
		Self::read(&mut block)
	}

	/// Read and validate a chunk header: signature, object type and sizes.
	pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
		let base = ObjectBase::read(reader)?;
		if base.object_type != ObjectType::LogContainer.tag() {
			return Err(BlfError::format(format!(
				"expected a log container, found object type {}",
				base.object_type
			)));
		}
		if base.header_size != BASE_HEADER_SIZE || base.object_size < CHUNK_HEADER_SIZE {
			return Err(BlfError::format(format!(
				"log container declares header size {} and object size {}",
				base.header_size, base.object_size
			)));
		}

		let compression_method = CompressionMethod::try_from(reader.read_u16::<LittleEndian>()?)?;
		let compression_level = reader.read_u16::<LittleEndian>()?;
		let _reserved = reader.read_u32::<LittleEndian>()?;
		let uncompressed_size = reader.read_u32::<LittleEndian>()?;
		let _reserved = reader.read_u32::<LittleEndian>()?;

		if compression_method == CompressionMethod::None
			&& uncompressed_size != base.object_size - CHUNK_HEADER_SIZE
		{
			return Err(BlfError::format(format!(
				"stored chunk declares {} uncompressed bytes but carries {}",
				uncompressed_size,
				base.object_size - CHUNK_HEADER_SIZE
			)));
		}

		Ok(Self {
			object_size: base.object_size,
			compression_method,
			compression_level,
			uncompressed_size,
		})
	}
}

/// Unit of compression: one independently compressed run of stream bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
	pub compression_method: CompressionMethod,
	pub compression_level: u16,
	pub uncompressed_size: u32,
	pub payload: Vec<u8>,
}

impl Chunk {
	/// Compress a sealed buffer into a chunk.
	pub fn compress(data: &[u8], method: CompressionMethod, level: u16) -> Result<Self> {
		let uncompressed_size = u32::try_from(data.len())
			.map_err(|_| BlfError::Compression(format!("chunk of {} bytes exceeds 4 GiB", data.len())))?;
		let payload = codec::compress(data, method, level)?;
		Ok(Self { compression_method: method, compression_level: level, uncompressed_size, payload })
	}

	/// Expand the payload; the result is always `uncompressed_size` bytes.
	pub fn decompress(&self) -> Result<Vec<u8>> {
		codec::decompress(&self.payload, self.uncompressed_size as usize, self.compression_method)
	}

	pub fn header(&self) -> Result<ChunkHeader> {
		let object_size = u32::try_from(self.payload.len())
			.ok()
			.and_then(|len| len.checked_add(CHUNK_HEADER_SIZE))
			.ok_or_else(|| BlfError::Compression("compressed chunk exceeds 4 GiB".to_string()))?;
		Ok(ChunkHeader {
			object_size,
			compression_method: self.compression_method,
			compression_level: self.compression_level,
			uncompressed_size: self.uncompressed_size,
		})
	}

	/// Write header, payload and padding. Returns the number of bytes written.
	pub fn write<W: Write>(&self, writer: &mut W) -> Result<u64> {
		let framed = self.to_bytes()?;
		writer.write_all(&framed)?;
		Ok(framed.len() as u64)
	}

	/// Header, payload and padding as they appear on disk.
	pub fn to_bytes(&self) -> Result<Vec<u8>> {
		let header = self.header()?;
		let mut framed = Vec::with_capacity(header.stride() as usize);
		framed.extend_from_slice(&header.to_bytes()?);
		framed.extend_from_slice(&self.payload);
		framed.resize(header.stride() as usize, 0);
		Ok(framed)
	}

	/// Read the payload that follows an already decoded header.
	pub fn read_payload<R: Read>(header: ChunkHeader, reader: &mut R) -> Result<Self> {
		let mut payload = vec![0u8; header.compressed_size() as usize];
		reader
			.read_exact(&mut payload)
			.map_err(|e| BlfError::from(e).truncated_as_format("chunk payload"))?;
		Ok(Self {
			compression_method: header.compression_method,
			compression_level: header.compression_level,
			uncompressed_size: header.uncompressed_size,
			payload,
		})
	}
}
