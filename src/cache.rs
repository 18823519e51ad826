//! Bounded cache of published preview URLs.
//!
//! Maps a [`DestinationKey`] to the URL its preview was published at, so a
//! repeated request can skip transcoding. The cache holds at most `capacity`
//! entries and evicts the least recently used one when full.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::publish::DestinationKey;

/// Default number of cached URLs.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

struct CacheEntry {
    url: String,
    last_accessed: u64,
}

/// Thread-safe LRU map from destination keys to published URLs.
pub struct PreviewCache {
    entries: DashMap<DestinationKey, CacheEntry>,
    capacity: usize,
    /// Monotonic access stamp; ties between wall-clock instants cannot occur.
    clock: AtomicU64,
}

impl std::fmt::Debug for PreviewCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewCache")
            .field("len", &self.entries.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl PreviewCache {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            clock: AtomicU64::new(0),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Look up a URL, marking the entry as most recently used.
    pub fn get(&self, key: &DestinationKey) -> Option<String> {
        self.entries.get_mut(key).map(|mut entry| {
            entry.last_accessed = self.tick();
            entry.url.clone()
        })
    }

    /// Record `url` for `key`, evicting the least recently used entry if the
    /// cache is full.
    pub fn insert(&self, key: DestinationKey, url: String) {
        if !self.entries.contains_key(&key) {
            while self.entries.len() >= self.capacity && self.evict_oldest() {}
        }
        let entry = CacheEntry {
            url,
            last_accessed: self.tick(),
        };
        self.entries.insert(key, entry);
    }

    /// Remove an entry.
    pub fn remove(&self, key: &DestinationKey) -> Option<String> {
        self.entries.remove(key).map(|(_, entry)| entry.url)
    }

    pub fn contains(&self, key: &DestinationKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn evict_oldest(&self) -> bool {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.last_accessed)
            .map(|entry| entry.key().clone());

        match oldest {
            Some(key) => {
                log::debug!("Evicting cached preview {key}");
                self.entries.remove(&key);
                true
            }
            None => false,
        }
    }
}

impl Default for PreviewCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
