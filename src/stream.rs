//! The uncompressed byte stream: every chunk's payload, concatenated.
//!
//! All mutable state (chunk index, cache, positions, write buffer) sits
//! behind one mutex, so every public operation takes `&self` and runs to
//! completion before the next one starts.

use crate::byte_file::OpenMode;
use crate::cache::ChunkCache;
use crate::config::BlfConfig;
use crate::error::{BlfError, Result};
use crate::statistics::FileStatistics;
use crate::store::ChunkStore;
use crate::worker::Backend;
use log::{debug, error, trace};
use std::io::SeekFrom;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Maps a range of the uncompressed stream onto a physical chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkIndexEntry {
    pub ordinal: usize,
    /// Offset of the chunk in the file.
    pub position: u64,
    /// First uncompressed byte covered by the chunk.
    pub start: u64,
    pub len: u64,
}

impl ChunkIndexEntry {
    pub fn end(&self) -> u64 {
        self.start + self.len
    }
}

struct State {
    mode: OpenMode,
    backend: Option<Backend>,
    index: Vec<ChunkIndexEntry>,
    cache: ChunkCache,
    /// Unsealed tail of the stream (write mode).
    tail: Vec<u8>,
    chunk_size: usize,
    sealed_chunks: usize,
    get_pos: u64,
    /// Logical end of the data; fixed at open in read mode.
    put_pos: u64,
    statistics: FileStatistics,
}

impl State {
    fn backend(&mut self) -> Result<&mut Backend> {
        self.backend.as_mut().ok_or(BlfError::NotOpen)
    }

    fn seal(&mut self) -> Result<()> {
        if self.tail.is_empty() {
            return Ok(());
        }
        let mut data = std::mem::take(&mut self.tail);
        data.shrink_to_fit();
        trace!("sealing chunk {} ({} bytes)", self.sealed_chunks, data.len());
        self.backend()?.submit(data)?;
        self.sealed_chunks += 1;
        Ok(())
    }

    fn resolve(&self, pos: SeekFrom, current: u64) -> Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => current.checked_add_signed(delta),
            SeekFrom::End(delta) => self.put_pos.checked_add_signed(delta),
        };
        target.ok_or_else(|| BlfError::InvalidSeek(format!("{:?} from {}", pos, current)))
    }
}

pub struct UncompressedStream {
    state: Mutex<State>,
}

impl UncompressedStream {
    /// Open the chunk store at `path` and build the chunk index (read mode)
    /// or prepare an empty write buffer (write mode).
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode, config: &BlfConfig) -> Result<Self> {
        config.validate()?;
        let store = ChunkStore::open(path, mode)?;

        let mut index = Vec::with_capacity(store.chunk_count());
        let mut statistics = store.statistics().clone();
        let put_pos = match mode {
            OpenMode::Read => {
                let mut start = 0u64;
                for (ordinal, location) in store.locations().iter().enumerate() {
                    let len = u64::from(location.header.uncompressed_size);
                    index.push(ChunkIndexEntry { ordinal, position: location.position, start, len });
                    start += len;
                }
                start
            }
            OpenMode::Write => {
                statistics.application = config.application;
                statistics.api = config.api;
                0
            }
        };
        debug!("stream open: {} chunks, {} uncompressed bytes", index.len(), put_pos);

        let backend = Backend::start(store, config)?;
        Ok(Self {
            state: Mutex::new(State {
                mode,
                backend: Some(backend),
                index,
                cache: ChunkCache::new(config.cache_limit),
                tail: Vec::new(),
                chunk_size: config.chunk_size,
                sealed_chunks: 0,
                get_pos: 0,
                put_pos,
                statistics,
            }),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| BlfError::Worker("stream state poisoned by a panic".to_string()))
    }

    /// Read up to `buf.len()` bytes at the get position. A short count means
    /// the end of the stream was reached.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let mut guard = self.lock()?;
        let state = &mut *guard;
        if state.mode != OpenMode::Read {
            return Err(BlfError::WrongMode(state.mode));
        }
        if state.backend.is_none() {
            return Err(BlfError::NotOpen);
        }

        let mut filled = 0;
        while filled < buf.len() {
            let pos = state.get_pos;
            let slot = state.index.partition_point(|entry| entry.end() <= pos);
            let Some(entry) = state.index.get(slot).copied() else {
                break;
            };

            if !state.cache.contains(slot) {
                let prefetch = Some(slot + 1)
                    .filter(|next| *next < state.index.len() && !state.cache.contains(*next));
                let data = state.backend()?.fetch(entry.ordinal, prefetch)?;
                trace!("cached chunk {} ({} bytes)", slot, data.len());
                state.cache.insert(slot, data);
            }
            let data = state
                .cache
                .get(slot)
                .ok_or_else(|| BlfError::Worker(format!("chunk {} evicted while in use", slot)))?;

            let offset = (pos - entry.start) as usize;
            let n = (buf.len() - filled).min(data.len() - offset);
            buf[filled..filled + n].copy_from_slice(&data[offset..offset + n]);
            filled += n;
            state.get_pos += n as u64;
        }
        Ok(filled)
    }

    /// Append `buf` at the put position, sealing each chunk as it fills.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        let mut state = self.lock()?;
        if state.mode != OpenMode::Write {
            return Err(BlfError::WrongMode(state.mode));
        }
        if state.backend.is_none() {
            return Err(BlfError::NotOpen);
        }

        let mut written = 0;
        while written < buf.len() {
            let room = state.chunk_size - state.tail.len();
            let n = room.min(buf.len() - written);
            state.tail.extend_from_slice(&buf[written..written + n]);
            state.put_pos += n as u64;
            written += n;
            if state.tail.len() == state.chunk_size {
                state.seal()?;
            }
        }
        Ok(written)
    }

    /// Move the get position. `End` is relative to the put position.
    pub fn seek_get(&self, pos: SeekFrom) -> Result<u64> {
        let mut state = self.lock()?;
        let target = state.resolve(pos, state.get_pos)?;
        if target > state.put_pos {
            return Err(BlfError::InvalidSeek(format!(
                "offset {} beyond end of stream at {}",
                target, state.put_pos
            )));
        }
        state.get_pos = target;
        Ok(target)
    }

    pub fn tell_get(&self) -> Result<u64> {
        Ok(self.lock()?.get_pos)
    }

    /// Move the put position forward, zero-filling the gap. Bytes already
    /// written are never revisited.
    pub fn seek_put(&self, pos: SeekFrom) -> Result<u64> {
        let (current, target) = {
            let state = self.lock()?;
            if state.mode != OpenMode::Write {
                return Err(BlfError::WrongMode(state.mode));
            }
            (state.put_pos, state.resolve(pos, state.put_pos)?)
        };
        if target < current {
            return Err(BlfError::InvalidSeek(format!(
                "cannot move put position back from {} to {}",
                current, target
            )));
        }

        let zeros = vec![0u8; 4096];
        let mut gap = target - current;
        while gap > 0 {
            let n = gap.min(zeros.len() as u64) as usize;
            self.write(&zeros[..n])?;
            gap -= n as u64;
        }
        Ok(target)
    }

    pub fn tell_put(&self) -> Result<u64> {
        Ok(self.lock()?.put_pos)
    }

    /// Total uncompressed bytes in the stream.
    pub fn size(&self) -> Result<u64> {
        Ok(self.lock()?.put_pos)
    }

    /// Chunks in the file (read mode) or sealed so far (write mode).
    pub fn chunk_count(&self) -> Result<usize> {
        let state = self.lock()?;
        Ok(match state.mode {
            OpenMode::Read => state.index.len(),
            OpenMode::Write => state.sealed_chunks,
        })
    }

    pub fn chunk_index(&self) -> Result<Vec<ChunkIndexEntry>> {
        Ok(self.lock()?.index.clone())
    }

    pub fn mode(&self) -> Result<OpenMode> {
        Ok(self.lock()?.mode)
    }

    pub fn is_open(&self) -> bool {
        self.lock().map(|state| state.backend.is_some()).unwrap_or(false)
    }

    /// Snapshot of the header. In write mode the size fields are only
    /// final after [`close`](Self::close).
    pub fn statistics(&self) -> Result<FileStatistics> {
        Ok(self.lock()?.statistics.clone())
    }

    /// Edit the header fields that are persisted at close.
    pub fn update_statistics<F: FnOnce(&mut FileStatistics)>(&self, f: F) -> Result<()> {
        let mut state = self.lock()?;
        f(&mut state.statistics);
        Ok(())
    }

    /// Seal the final partial chunk, wait for background work, write the
    /// header and close the file. Errors are returned, never swallowed.
    pub fn close(&self) -> Result<()> {
        let mut state = self.lock()?;
        if state.backend.is_none() {
            return Ok(());
        }
        let sealed = if state.mode == OpenMode::Write { state.seal() } else { Ok(()) };

        let backend = state.backend.take().ok_or(BlfError::NotOpen)?;
        let mut store = backend.finish()?;
        sealed?;

        if state.mode == OpenMode::Write {
            let header = store.statistics_mut();
            let (file_size, uncompressed_file_size) = (header.file_size, header.uncompressed_file_size);
            *header = state.statistics.clone();
            header.file_size = file_size;
            header.uncompressed_file_size = uncompressed_file_size;
        }
        store.close()?;
        state.statistics = store.statistics().clone();
        state.cache.clear();
        debug!("stream closed at {} bytes", state.put_pos);
        Ok(())
    }
}

impl Drop for UncompressedStream {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!("failed to close stream: {}", e);
        }
    }
}
