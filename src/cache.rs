//! Decompressed chunk cache, keyed by chunk ordinal.

use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;

/// At most one decompressed copy per chunk.
///
/// The unbounded variant keeps every chunk until the stream closes. The
/// bounded variant evicts the least recently read chunk once `limit` chunks
/// are held; an evicted chunk is simply decompressed again on its next read.
pub enum ChunkCache {
    Unbounded(HashMap<usize, Vec<u8>>),
    Bounded(LruCache<usize, Vec<u8>>),
}

impl ChunkCache {
    pub fn new(limit: Option<NonZeroUsize>) -> Self {
        match limit {
            Some(limit) => ChunkCache::Bounded(LruCache::new(limit)),
            None => ChunkCache::Unbounded(HashMap::new()),
        }
    }

    pub fn get(&mut self, chunk: usize) -> Option<&[u8]> {
        match self {
            ChunkCache::Unbounded(map) => map.get(&chunk).map(Vec::as_slice),
            ChunkCache::Bounded(lru) => lru.get(&chunk).map(Vec::as_slice),
        }
    }

    pub fn contains(&self, chunk: usize) -> bool {
        match self {
            ChunkCache::Unbounded(map) => map.contains_key(&chunk),
            ChunkCache::Bounded(lru) => lru.contains(&chunk),
        }
    }

    pub fn insert(&mut self, chunk: usize, data: Vec<u8>) {
        match self {
            ChunkCache::Unbounded(map) => {
                map.insert(chunk, data);
            }
            ChunkCache::Bounded(lru) => {
                lru.put(chunk, data);
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ChunkCache::Unbounded(map) => map.len(),
            ChunkCache::Bounded(lru) => lru.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        match self {
            ChunkCache::Unbounded(map) => map.clear(),
            ChunkCache::Bounded(lru) => lru.clear(),
        }
    }
}

impl std::fmt::Debug for ChunkCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            ChunkCache::Unbounded(_) => "unbounded",
            ChunkCache::Bounded(_) => "bounded",
        };
        f.debug_struct("ChunkCache").field("kind", &kind).field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_keeps_everything() {
        let mut cache = ChunkCache::new(None);
        for i in 0..10 {
            cache.insert(i, vec![i as u8; 4]);
        }
        assert_eq!(cache.len(), 10);
        assert_eq!(cache.get(3), Some(&[3u8; 4][..]));
    }

    #[test]
    fn test_bounded_evicts_least_recent() {
        let mut cache = ChunkCache::new(NonZeroUsize::new(2));
        cache.insert(0, vec![0]);
        cache.insert(1, vec![1]);
        assert!(cache.get(0).is_some());
        cache.insert(2, vec![2]);

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(0));
        assert!(!cache.contains(1));
        assert!(cache.contains(2));

        cache.clear();
        assert!(cache.is_empty());
    }
}
