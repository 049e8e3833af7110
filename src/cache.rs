//! Response cache
//!
//! Maps a cache key (a resolved file path, optionally suffixed with a
//! compression marker) to the serialized response head and body built for
//! it. Entries are immutable once stored and shared by reference count, so a
//! hit costs two `Bytes` clones.
//!
//! Memory is bounded by a byte budget fixed at startup. Storing past the
//! budget silently evicts least-recently-used entries; callers never
//! invalidate anything and simply rebuild on a miss.
//!
//! All methods take `&self`; the cache is shared by every worker thread.

use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A cached response: head bytes and body bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub header: Bytes,
    pub body: Bytes,
}

/// Counters since startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub evictions: u64,
}

struct Slot {
    entry: CacheEntry,
    last_used: u64,
    cost: usize,
}

#[derive(Default)]
struct LruState {
    entries: HashMap<Arc<str>, Slot>,
    /// Recency index: `last_used` tick -> key, oldest first
    recency: BTreeMap<u64, Arc<str>>,
    clock: u64,
    size: usize,
    stats: CacheStats,
}

impl LruState {
    fn next_tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn remove(&mut self, key: &str) -> Option<Slot> {
        let slot = self.entries.remove(key)?;
        self.recency.remove(&slot.last_used);
        self.size -= slot.cost;
        Some(slot)
    }

    fn evict_oldest(&mut self) -> bool {
        let Some((_, key)) = self.recency.pop_first() else {
            return false;
        };
        if let Some(slot) = self.entries.remove(&key) {
            self.size -= slot.cost;
            self.stats.evictions += 1;
        }
        true
    }
}

/// Byte-budgeted LRU cache of built responses
pub struct ResponseCache {
    capacity: usize,
    state: Mutex<LruState>,
}

impl ResponseCache {
    /// Create a cache holding at most `capacity_bytes` of keys, heads and bodies.
    /// A capacity of 0 disables caching.
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            capacity: capacity_bytes,
            state: Mutex::new(LruState::default()),
        }
    }

    fn cost(key: &str, header: &Bytes, body: &Bytes) -> usize {
        key.len() + header.len() + body.len()
    }

    /// Look up an entry, marking it most recently used
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let mut state = self.state.lock();
        let tick = state.next_tick();
        let state = &mut *state;

        let Some(slot) = state.entries.get_mut(key) else {
            state.stats.misses += 1;
            return None;
        };
        if let Some(k) = state.recency.remove(&slot.last_used) {
            state.recency.insert(tick, k);
        }
        slot.last_used = tick;
        state.stats.hits += 1;
        Some(slot.entry.clone())
    }

    /// Store an entry; last write wins. Evicts older entries to fit the budget
    /// and silently skips entries larger than the whole budget.
    pub fn put(&self, key: &str, header: Bytes, body: Bytes) {
        let cost = Self::cost(key, &header, &body);
        let mut state = self.state.lock();
        state.remove(key);

        if cost > self.capacity {
            return;
        }
        while state.size + cost > self.capacity {
            if !state.evict_oldest() {
                break;
            }
        }

        let tick = state.next_tick();
        let key: Arc<str> = Arc::from(key);
        state.recency.insert(tick, Arc::clone(&key));
        state.entries.insert(
            key,
            Slot {
                entry: CacheEntry { header, body },
                last_used: tick,
                cost,
            },
        );
        state.size += cost;
        state.stats.inserts += 1;
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes currently charged against the budget
    pub fn size_bytes(&self) -> usize {
        self.state.lock().size
    }

    pub const fn capacity_bytes(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        self.state.lock().stats
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ResponseCache")
            .field("capacity", &self.capacity)
            .field("size", &state.size)
            .field("entries", &state.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn bytes(n: usize) -> Bytes {
        Bytes::from(vec![b'x'; n])
    }

    #[test]
    fn test_get_put() {
        let cache = ResponseCache::new(1024);
        assert!(cache.get("/a").is_none());

        cache.put("/a", Bytes::from_static(b"head"), Bytes::from_static(b"body"));
        let entry = cache.get("/a").unwrap();
        assert_eq!(&entry.header[..], b"head");
        assert_eq!(&entry.body[..], b"body");
        assert_eq!(cache.size_bytes(), 2 + 4 + 4);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.inserts, 1);
    }

    #[test]
    fn test_put_last_write_wins() {
        let cache = ResponseCache::new(1024);
        cache.put("/a", bytes(1), bytes(10));
        cache.put("/a", bytes(1), bytes(20));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("/a").unwrap().body.len(), 20);
        assert_eq!(cache.size_bytes(), 2 + 1 + 20);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        // Each entry costs 2 + 0 + 48 = 50 bytes; budget fits two
        let cache = ResponseCache::new(100);
        cache.put("/a", Bytes::new(), bytes(48));
        cache.put("/b", Bytes::new(), bytes(48));

        // Touch /a so /b becomes the eviction candidate
        assert!(cache.get("/a").is_some());
        cache.put("/c", Bytes::new(), bytes(48));

        assert!(cache.contains("/a"));
        assert!(!cache.contains("/b"));
        assert!(cache.contains("/c"));
        assert!(cache.size_bytes() <= cache.capacity_bytes());
        assert_eq!(cache.stats().evictions, 1);
        // An evicted key is an ordinary miss
        assert!(cache.get("/b").is_none());
    }

    #[test]
    fn test_oversized_entry_is_skipped() {
        let cache = ResponseCache::new(64);
        cache.put("/small", Bytes::new(), bytes(10));
        cache.put("/huge", Bytes::new(), bytes(1000));
        assert!(!cache.contains("/huge"));
        assert!(cache.contains("/small"));
    }

    #[test]
    fn test_oversized_rewrite_drops_stale_entry() {
        let cache = ResponseCache::new(64);
        cache.put("/a", Bytes::new(), bytes(10));
        cache.put("/a", Bytes::new(), bytes(1000));
        assert!(cache.get("/a").is_none());
        assert_eq!(cache.size_bytes(), 0);
    }

    #[test]
    fn test_zero_capacity_disables_cache() {
        let cache = ResponseCache::new(0);
        cache.put("/a", Bytes::new(), Bytes::new());
        assert!(cache.is_empty());
        assert!(cache.get("/a").is_none());
    }

    #[test]
    fn test_concurrent_distinct_keys() {
        let cache = Arc::new(ResponseCache::new(1 << 20));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..100 {
                        let key = format!("/t{t}/f{i}");
                        let body = Bytes::from(key.clone().into_bytes());
                        cache.put(&key, Bytes::from_static(b"h"), body);
                        let entry = cache.get(&key).unwrap();
                        assert_eq!(&entry.body[..], key.as_bytes());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 400);
        for t in 0..4 {
            let key = format!("/t{t}/f7");
            assert_eq!(&cache.get(&key).unwrap().body[..], key.as_bytes());
        }
    }
}
