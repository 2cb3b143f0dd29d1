//! Decoded document cache
//!
//! Holds documents that were already decoded so follow-up calls referencing a
//! `cache_key` skip fetching and PDFium work. Bounded by entry count and by a
//! byte budget; least recently used entries go first.

use crate::pdf::PdfReader;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

struct CacheInner {
    lru: LruCache<String, Arc<PdfReader>>,
    total_bytes: usize,
}

/// Documents are weighed by their decoded text size
pub struct CacheManager {
    inner: Mutex<CacheInner>,
    max_bytes: usize,
}

impl CacheManager {
    pub fn new(capacity: usize, max_bytes: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(CacheInner {
                lru: LruCache::new(capacity),
                total_bytes: 0,
            }),
            max_bytes,
        }
    }

    /// Store a document and return `true`, or return `false` if it alone
    /// exceeds the byte budget. Evicts LRU entries to make room.
    pub fn put(&self, key: String, value: Arc<PdfReader>) -> bool {
        let size = value.text_bytes();
        if size > self.max_bytes {
            tracing::debug!(size, max_bytes = self.max_bytes, "cache entry rejected");
            return false;
        }

        let mut inner = self.inner.lock();

        if let Some(old) = inner.lru.pop(&key) {
            inner.total_bytes = inner.total_bytes.saturating_sub(old.text_bytes());
        }

        while inner.total_bytes + size > self.max_bytes {
            let Some((_, evicted)) = inner.lru.pop_lru() else {
                break;
            };
            inner.total_bytes = inner.total_bytes.saturating_sub(evicted.text_bytes());
        }

        // Entry-count eviction happens inside the LRU itself
        if let Some((_, evicted)) = inner.lru.push(key, value) {
            inner.total_bytes = inner.total_bytes.saturating_sub(evicted.text_bytes());
        }
        inner.total_bytes += size;
        true
    }

    /// Store a document under a fresh key, returning the key when stored
    pub fn insert(&self, value: Arc<PdfReader>) -> Option<String> {
        let key = self.generate_unique_key();
        self.put(key.clone(), value).then_some(key)
    }

    pub fn get(&self, key: &str) -> Option<Arc<PdfReader>> {
        self.inner.lock().lru.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().lru.contains(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().lru.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.inner.lock().total_bytes
    }

    /// Generate a UUID key not currently in use
    pub fn generate_unique_key(&self) -> String {
        let inner = self.inner.lock();
        loop {
            let key = uuid::Uuid::new_v4().to_string();
            if !inner.lru.contains(&key) {
                return key;
            }
        }
    }
}
