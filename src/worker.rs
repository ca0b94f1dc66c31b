//! Chunk I/O backends for the uncompressed stream.
//!
//! The direct backend calls the [`ChunkStore`] on the caller's thread. The
//! background backends move the store onto a worker thread and talk to it
//! over `crossbeam-channel`:
//!
//! - read-ahead: the stream sends "chunk wanted" requests and receives
//!   decompressed buffers; after each demand fetch the next chunk is
//!   requested speculatively.
//! - write-behind: the stream sends sealed chunk buffers, which the worker
//!   compresses and appends strictly in the order they were sent.
//!
//! Either way [`Backend::finish`] joins the worker and hands the store back,
//! so the header is only finalized once all in-flight work is done.

use crate::byte_file::OpenMode;
use crate::chunk::Chunk;
use crate::codec::CompressionMethod;
use crate::config::BlfConfig;
use crate::error::{BlfError, Result};
use crate::store::ChunkStore;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::{debug, trace};
use std::collections::HashMap;
use std::thread::{self, JoinHandle};

/// Outstanding read-ahead requests: one demand fetch plus one speculative.
const READ_AHEAD_DEPTH: usize = 2;

/// Sealed chunks queued ahead of the write-behind worker.
const WRITE_BEHIND_DEPTH: usize = 4;

type Fetched = (usize, Result<Vec<u8>>);

pub(crate) enum Backend {
    Direct {
        store: ChunkStore,
        method: CompressionMethod,
        level: u16,
    },
    ReadAhead(ReadAhead),
    WriteBehind(WriteBehind),
}

impl Backend {
    /// Pick a backend for `store` according to its mode and `config`.
    pub fn start(store: ChunkStore, config: &BlfConfig) -> Result<Self> {
        let method = config.compression_method;
        let level = config.compression_level;
        if !config.background_io {
            return Ok(Backend::Direct { store, method, level });
        }
        match store.mode() {
            OpenMode::Read => Ok(Backend::ReadAhead(ReadAhead::spawn(store)?)),
            OpenMode::Write => Ok(Backend::WriteBehind(WriteBehind::spawn(store, method, level)?)),
        }
    }

    /// Decompressed bytes of chunk `index`. `prefetch` names a chunk worth
    /// decompressing ahead of time, if the backend supports it.
    pub fn fetch(&mut self, index: usize, prefetch: Option<usize>) -> Result<Vec<u8>> {
        match self {
            Backend::Direct { store, .. } => store.read_chunk(index)?.decompress(),
            Backend::ReadAhead(worker) => worker.fetch(index, prefetch),
            Backend::WriteBehind(_) => Err(BlfError::WrongMode(OpenMode::Write)),
        }
    }

    /// Compress and append a sealed chunk buffer.
    pub fn submit(&mut self, data: Vec<u8>) -> Result<()> {
        match self {
            Backend::Direct { store, method, level } => {
                let chunk = Chunk::compress(&data, *method, *level)?;
                store.write_chunk(&chunk)
            }
            Backend::WriteBehind(worker) => worker.submit(data),
            Backend::ReadAhead(_) => Err(BlfError::WrongMode(OpenMode::Read)),
        }
    }

    /// Wait for outstanding work and return the store.
    pub fn finish(self) -> Result<ChunkStore> {
        match self {
            Backend::Direct { store, .. } => Ok(store),
            Backend::ReadAhead(worker) => worker.finish(),
            Backend::WriteBehind(worker) => worker.finish(),
        }
    }
}

pub(crate) struct ReadAhead {
    requests: Sender<usize>,
    results: Receiver<Fetched>,
    handle: JoinHandle<ChunkStore>,
    in_flight: Vec<usize>,
    ready: HashMap<usize, Result<Vec<u8>>>,
    chunk_count: usize,
}

impl ReadAhead {
    fn spawn(mut store: ChunkStore) -> Result<Self> {
        let chunk_count = store.chunk_count();
        let (requests, request_rx) = bounded::<usize>(READ_AHEAD_DEPTH);
        let (result_tx, results) = bounded::<Fetched>(READ_AHEAD_DEPTH);

        let handle = thread::Builder::new()
            .name("blf-read-ahead".to_string())
            .spawn(move || {
                while let Ok(index) = request_rx.recv() {
                    let data = store.read_chunk(index).and_then(|chunk| chunk.decompress());
                    trace!("read-ahead decompressed chunk {}", index);
                    if result_tx.send((index, data)).is_err() {
                        break;
                    }
                }
                store
            })?;
        debug!("started read-ahead worker for {} chunks", chunk_count);

        Ok(Self {
            requests,
            results,
            handle,
            in_flight: Vec::with_capacity(READ_AHEAD_DEPTH),
            ready: HashMap::new(),
            chunk_count,
        })
    }

    fn request(&mut self, index: usize) -> Result<()> {
        self.requests
            .send(index)
            .map_err(|_| BlfError::Worker("read-ahead worker stopped".to_string()))?;
        self.in_flight.push(index);
        Ok(())
    }

    fn fetch(&mut self, index: usize, prefetch: Option<usize>) -> Result<Vec<u8>> {
        if !self.ready.contains_key(&index) && !self.in_flight.contains(&index) {
            // Make room for the demand fetch; a stale speculative request
            // will still be answered and parked in `ready`.
            while self.in_flight.len() >= READ_AHEAD_DEPTH {
                self.receive_one()?;
            }
            self.request(index)?;
        }
        while !self.ready.contains_key(&index) {
            self.receive_one()?;
        }
        let data = self
            .ready
            .remove(&index)
            .ok_or_else(|| BlfError::Worker(format!("chunk {} went missing", index)))?;

        self.ready.retain(|&ready, _| Some(ready) == prefetch);
        if let Some(next) = prefetch {
            if next < self.chunk_count
                && !self.ready.contains_key(&next)
                && !self.in_flight.contains(&next)
                && self.in_flight.len() < READ_AHEAD_DEPTH
            {
                self.request(next)?;
            }
        }
        data
    }

    fn receive_one(&mut self) -> Result<()> {
        let (index, data) = self
            .results
            .recv()
            .map_err(|_| BlfError::Worker("read-ahead worker stopped".to_string()))?;
        self.in_flight.retain(|&pending| pending != index);
        self.ready.insert(index, data);
        Ok(())
    }

    fn finish(self) -> Result<ChunkStore> {
        let Self { requests, results, handle, .. } = self;
        drop(requests);
        // Unblock a worker parked on a full result queue.
        drop(results);
        handle
            .join()
            .map_err(|_| BlfError::Worker("read-ahead worker panicked".to_string()))
    }
}

pub(crate) struct WriteBehind {
    sealed: Sender<Vec<u8>>,
    acks: Receiver<Result<()>>,
    handle: JoinHandle<ChunkStore>,
    submitted: usize,
    acknowledged: usize,
}

impl WriteBehind {
    pub(crate) fn spawn(mut store: ChunkStore, method: CompressionMethod, level: u16) -> Result<Self> {
        let (sealed, sealed_rx) = bounded::<Vec<u8>>(WRITE_BEHIND_DEPTH);
        let (ack_tx, acks) = unbounded::<Result<()>>();

        let handle = thread::Builder::new()
            .name("blf-write-behind".to_string())
            .spawn(move || {
                while let Ok(data) = sealed_rx.recv() {
                    let result = Chunk::compress(&data, method, level).and_then(|chunk| store.write_chunk(&chunk));
                    let failed = result.is_err();
                    if ack_tx.send(result).is_err() || failed {
                        break;
                    }
                }
                store
            })?;
        debug!("started write-behind worker ({}, level {})", method, level);

        Ok(Self { sealed, acks, handle, submitted: 0, acknowledged: 0 })
    }

    /// Surface the first failure reported since the last call.
    fn drain_acks(&mut self) -> Result<()> {
        for ack in self.acks.try_iter() {
            self.acknowledged += 1;
            ack?;
        }
        Ok(())
    }

    fn submit(&mut self, data: Vec<u8>) -> Result<()> {
        self.drain_acks()?;
        if self.sealed.send(data).is_err() {
            // The worker quit after a failure; report that failure.
            self.drain_acks()?;
            return Err(BlfError::Worker("write-behind worker stopped".to_string()));
        }
        self.submitted += 1;
        Ok(())
    }

    fn finish(self) -> Result<ChunkStore> {
        let Self { sealed, acks, handle, submitted, mut acknowledged } = self;
        drop(sealed);
        let store = handle
            .join()
            .map_err(|_| BlfError::Worker("write-behind worker panicked".to_string()))?;
        for ack in acks.try_iter() {
            acknowledged += 1;
            ack?;
        }
        if acknowledged != submitted {
            return Err(BlfError::Worker(format!(
                "write-behind flushed {} of {} chunks",
                acknowledged, submitted
            )));
        }
        Ok(store)
    }
}
