//! Global header plus the physical chunk sequence of a file.
//!
//! The store is the only owner of the [`ByteFile`]. In read mode it scans
//! the chunk headers once at open; in write mode it appends framed chunks and
//! keeps the header counters that [`ChunkStore::close`] persists.

use crate::byte_file::{ByteFile, OpenMode};
use crate::chunk::{Chunk, ChunkHeader, CHUNK_HEADER_SIZE};
use crate::error::{BlfError, Result};
use crate::statistics::{FileStatistics, FILE_SIGNATURE, MAX_STATISTICS_SIZE, STATISTICS_SIZE};
use byteorder::{ByteOrder, LittleEndian};
use log::{debug, trace};
use std::io::{Cursor, SeekFrom};
use std::path::Path;

/// Where a chunk lives on disk and what its header declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLocation {
	pub position: u64,
	pub header: ChunkHeader,
}

#[derive(Debug)]
pub struct ChunkStore {
	file: ByteFile,
	mode: OpenMode,
	statistics: FileStatistics,
	locations: Vec<ChunkLocation>,
	end: u64,
}

impl ChunkStore {
	/// Open `path`. Read mode validates the header and scans every chunk
	/// header; write mode truncates and writes a placeholder header.
	pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode) -> Result<Self> {
		let mut file = ByteFile::new();
		file.open(path.as_ref(), mode)?;
		debug!("opened {} in {:?} mode", path.as_ref().display(), mode);

		let mut store = Self {
			file,
			mode,
			statistics: FileStatistics::default(),
			locations: Vec::new(),
			end: 0,
		};
		match mode {
			OpenMode::Read => {
				store.statistics = store.read_statistics()?;
				store.scan_chunks()?;
			}
			OpenMode::Write => {
				store.write_statistics()?;
				store.end = u64::from(STATISTICS_SIZE);
			}
		}
		Ok(store)
	}

	fn read_statistics(&mut self) -> Result<FileStatistics> {
		let mut head = vec![0u8; STATISTICS_SIZE as usize];
		let n = self.file.read(&mut head)?;
		if n >= 4 && LittleEndian::read_u32(&head[..4]) != FILE_SIGNATURE {
			return Err(BlfError::format(format!(
				"bad file signature 0x{:08x}",
				LittleEndian::read_u32(&head[..4])
			)));
		}
		if n < head.len() {
			return Err(BlfError::format(format!("truncated file header ({} bytes)", n)));
		}

		let declared = LittleEndian::read_u32(&head[4..8]);
		if !(STATISTICS_SIZE..=MAX_STATISTICS_SIZE).contains(&declared) {
			return Err(BlfError::format(format!(
				"file statistics size {} outside {}..={}",
				declared, STATISTICS_SIZE, MAX_STATISTICS_SIZE
			)));
		}
		if declared > STATISTICS_SIZE {
			let mut tail = vec![0u8; (declared - STATISTICS_SIZE) as usize];
			self.file
				.read_exact(&mut tail)
				.map_err(|e| BlfError::from(e).truncated_as_format("file header"))?;
			head.extend_from_slice(&tail);
		}
		FileStatistics::read(&mut Cursor::new(&head)).map_err(|e| e.truncated_as_format("file header"))
	}

	fn write_statistics(&mut self) -> Result<()> {
		let mut raw = Vec::with_capacity(STATISTICS_SIZE as usize);
		self.statistics.write(&mut raw)?;
		self.file.write(&raw)?;
		Ok(())
	}

	/// One read per header; the fields are decoded from the block.
	fn read_chunk_header(&mut self) -> Result<ChunkHeader> {
		let mut raw = [0u8; CHUNK_HEADER_SIZE as usize];
		self.file
			.read_exact(&mut raw)
			.map_err(|e| BlfError::from(e).truncated_as_format("chunk header"))?;
		ChunkHeader::from_bytes(&raw)
	}

	fn scan_chunks(&mut self) -> Result<()> {
		let len = self.file.len()?;
		let mut position = u64::from(self.statistics.statistics_size);
		while position < len {
			if len - position < u64::from(CHUNK_HEADER_SIZE) {
				return Err(BlfError::format(format!(
					"truncated chunk header at offset {} ({} bytes left)",
					position,
					len - position
				)));
			}
			self.file.seek(SeekFrom::Start(position))?;
			let header = self.read_chunk_header()?;
			if position + u64::from(header.object_size) > len {
				return Err(BlfError::format(format!(
					"chunk {} at offset {} runs past end of file",
					self.locations.len(),
					position
				)));
			}
			self.locations.push(ChunkLocation { position, header });
			position += header.stride();
		}
		self.end = len;
		debug!("indexed {} chunks, {} bytes on disk", self.locations.len(), len);
		Ok(())
	}

	pub fn mode(&self) -> OpenMode {
		self.mode
	}

	pub fn is_open(&self) -> bool {
		self.file.is_open()
	}

	pub fn statistics(&self) -> &FileStatistics {
		&self.statistics
	}

	pub fn statistics_mut(&mut self) -> &mut FileStatistics {
		&mut self.statistics
	}

	pub fn chunk_count(&self) -> usize {
		self.locations.len()
	}

	/// Chunks found at open (read mode) or appended so far (write mode).
	pub fn locations(&self) -> &[ChunkLocation] {
		&self.locations
	}

	/// Read chunk `index`, re-validating its header against the scan.
	pub fn read_chunk(&mut self, index: usize) -> Result<Chunk> {
		if self.mode != OpenMode::Read {
			return Err(BlfError::WrongMode(self.mode));
		}
		let location = *self.locations.get(index).ok_or_else(|| {
			BlfError::InvalidSeek(format!("chunk {} of {}", index, self.locations.len()))
		})?;

		self.file.seek(SeekFrom::Start(location.position))?;
		let header = self.read_chunk_header()?;
		if header != location.header {
			return Err(BlfError::format(format!("chunk {} header changed since open", index)));
		}
		trace!(
			"read chunk {}: {} -> {} bytes ({})",
			index,
			header.compressed_size(),
			header.uncompressed_size,
			header.compression_method
		);
		Chunk::read_payload(header, &mut self.file)
	}

	/// Append a framed chunk and account for it in the header counters.
	pub fn write_chunk(&mut self, chunk: &Chunk) -> Result<()> {
		if self.mode != OpenMode::Write {
			return Err(BlfError::WrongMode(self.mode));
		}
		if !self.file.is_open() {
			return Err(BlfError::NotOpen);
		}

		let header = chunk.header()?;
		let position = self.end;
		self.file.seek(SeekFrom::Start(position))?;
		let framed = chunk.to_bytes()?;
		self.file.write(&framed)?;
		self.end = position + framed.len() as u64;
		self.locations.push(ChunkLocation { position, header });

		self.statistics.file_size = self.end;
		self.statistics.uncompressed_file_size +=
			u64::from(CHUNK_HEADER_SIZE) + u64::from(chunk.uncompressed_size);
		trace!(
			"wrote chunk {}: {} -> {} bytes at offset {}",
			self.locations.len() - 1,
			chunk.uncompressed_size,
			header.compressed_size(),
			position
		);
		Ok(())
	}

	/// Persist the header (write mode) and release the file. Idempotent.
	pub fn close(&mut self) -> Result<()> {
		if !self.file.is_open() {
			return Ok(());
		}
		if self.mode == OpenMode::Write {
			self.statistics.file_size = self.end;
			self.file.seek(SeekFrom::Start(0))?;
			self.write_statistics()?;
			self.file.flush()?;
		}
		self.file.close()?;
		debug!(
			"closed store: {} chunks, {} bytes, {} objects",
			self.locations.len(),
			self.statistics.file_size,
			self.statistics.object_count
		);
		Ok(())
	}
}
