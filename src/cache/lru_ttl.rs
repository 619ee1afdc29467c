//! LRU Cache with TTL Support
//!
//! A thread-safe, size-bounded cache whose entries also expire after a
//! fixed time-to-live.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// A cache entry with value and metadata
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_at: Instant,
    /// Recency stamp; larger is more recently used
    last_used: u64,
    pub access_count: u64,
}

impl<V> CacheEntry<V> {
    fn new(value: V, tick: u64) -> Self {
        Self {
            value,
            created_at: Instant::now(),
            last_used: tick,
            access_count: 1,
        }
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

struct Entries<K, V> {
    map: HashMap<K, CacheEntry<V>>,
    tick: u64,
}

impl<K: Eq + Hash + Clone, V> Entries<K, V> {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn evict_lru(&mut self) -> Option<K> {
        let oldest = self
            .map
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone())?;
        self.map.remove(&oldest);
        Some(oldest)
    }
}

/// Cache hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total > 0 {
            self.hits as f64 / total as f64
        } else {
            0.0
        }
    }
}

/// LRU Cache with TTL support
pub struct LruTtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    max_size: usize,
    ttl: Duration,
    entries: Mutex<Entries<K, V>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> LruTtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache holding at most `max_size` entries for `ttl` each
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            max_size: max_size.max(1),
            ttl,
            entries: Mutex::new(Entries {
                map: HashMap::with_capacity(max_size),
                tick: 0,
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up `key`; expired entries are dropped and count as misses
    pub fn get(&self, key: &K) -> Option<V> {
        self.get_if(key, |_| true)
    }

    /// Look up `key`, accepting the entry only when `valid` holds.
    /// Expired or rejected entries are dropped and count as misses.
    pub fn get_if<F>(&self, key: &K, valid: F) -> Option<V>
    where
        F: FnOnce(&V) -> bool,
    {
        let mut entries = self.entries.lock();
        let tick = entries.next_tick();

        let drop_entry = match entries.map.get_mut(key) {
            Some(entry) if !entry.is_expired(self.ttl) && valid(&entry.value) => {
                entry.last_used = tick;
                entry.access_count += 1;
                let value = entry.value.clone();
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(value);
            }
            Some(_) => true,
            None => false,
        };

        if drop_entry {
            entries.map.remove(key);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert or replace `key`, evicting the least recently used entry when full
    pub fn set(&self, key: K, value: V) {
        let mut entries = self.entries.lock();
        let tick = entries.next_tick();

        if !entries.map.contains_key(&key) && entries.map.len() >= self.max_size {
            entries.evict_lru();
        }
        entries.map.insert(key, CacheEntry::new(value, tick));
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.lock().map.remove(key).map(|entry| entry.value)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.lock().map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().map.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    /// Drop every expired entry, returning how many were removed
    pub fn prune_expired(&self) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.map.len();
        let ttl = self.ttl;
        entries.map.retain(|_, entry| !entry.is_expired(ttl));
        before - entries.map.len()
    }
}
