//! A W-TinyLFU cache with per-entry expiry.
//!
//! New entries land in a small LRU window. An entry pushed out of the window
//! only enters the main LRU segment if the frequency sketch rates it above
//! the main segment's own LRU victim. Expired and rejected values are kept
//! aside until [`TinyLfu::take_evicted`] so that the caller can release them
//! outside of any lock.

use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use xxhash_rust::xxh3::xxh3_64_with_seed;

use crate::util::time_seed_nanos;

/// Increments after which every sketch counter is halved.
const RESET_SAMPLES: usize = 100_000;
const SKETCH_DEPTH: usize = 4;
const SKETCH_SEEDS: [u64; SKETCH_DEPTH] = [
    0x9E37_79B9_7F4A_7C15,
    0xC2B2_AE3D_27D4_EB4F,
    0x1656_67B1_9E37_79F9,
    0x27D4_EB2F_1656_67C5,
];
/// Counters saturate like 4-bit counters.
const MAX_COUNT: u8 = 15;

/// Count-min sketch of access frequencies.
struct FrequencySketch {
    rows: [Vec<u8>; SKETCH_DEPTH],
    mask: usize,
    additions: usize,
    reset_at: usize,
}

impl FrequencySketch {
    fn new(capacity: usize) -> Self {
        let width = (capacity.max(1) * 16).next_power_of_two().max(64);
        Self {
            rows: std::array::from_fn(|_| vec![0; width]),
            mask: width - 1,
            additions: 0,
            reset_at: RESET_SAMPLES.max(width),
        }
    }

    fn slot(&self, row: usize, key: &str) -> usize {
        xxh3_64_with_seed(key.as_bytes(), SKETCH_SEEDS[row]) as usize & self.mask
    }

    fn increment(&mut self, key: &str) {
        for row in 0..SKETCH_DEPTH {
            let slot = self.slot(row, key);
            let counter = &mut self.rows[row][slot];
            *counter = (*counter + 1).min(MAX_COUNT);
        }
        self.additions += 1;
        if self.additions >= self.reset_at {
            self.halve();
        }
    }

    fn estimate(&self, key: &str) -> u8 {
        (0..SKETCH_DEPTH)
            .map(|row| self.rows[row][self.slot(row, key)])
            .min()
            .unwrap_or(0)
    }

    /// Age every counter so that old popularity fades.
    fn halve(&mut self) {
        for row in &mut self.rows {
            for counter in row.iter_mut() {
                *counter /= 2;
            }
        }
        self.additions /= 2;
    }
}

struct Entry<V> {
    value: Arc<V>,
    expires_at: Instant,
}

/// Random extra lifetime in `[0, min(ttl / 10, 10s)]`, so that entries
/// inserted together do not expire together.
pub fn ttl_jitter(ttl: Duration, key: &str) -> Duration {
    let max = (ttl / 10).min(Duration::from_secs(10));
    if max.is_zero() {
        return Duration::ZERO;
    }
    let random = xxh3_64_with_seed(key.as_bytes(), time_seed_nanos());
    let max_nanos = u64::try_from(max.as_nanos()).unwrap_or(u64::MAX);
    Duration::from_nanos(random % max_nanos.saturating_add(1))
}

pub struct TinyLfu<V> {
    window: LruCache<String, Entry<V>>,
    main: LruCache<String, Entry<V>>,
    window_capacity: usize,
    main_capacity: usize,
    sketch: FrequencySketch,
    ttl: Duration,
    evicted: Vec<(String, Arc<V>)>,
}

impl<V> TinyLfu<V> {
    /// Cache holding up to `capacity` values for `ttl` plus a random jitter.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = capacity.max(1);
        let window_capacity = (capacity / 100).max(1);
        Self {
            window: LruCache::unbounded(),
            main: LruCache::unbounded(),
            window_capacity,
            main_capacity: capacity - window_capacity,
            sketch: FrequencySketch::new(capacity),
            ttl,
            evicted: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.window.len() + self.main.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live value for `key`. An expired value is evicted.
    pub fn get(&mut self, key: &str, now: Instant) -> Option<Arc<V>> {
        self.sketch.increment(key);
        let segment = if self.window.contains(key) {
            &mut self.window
        } else {
            &mut self.main
        };
        let live = segment.get(key).map(|e| e.expires_at > now)?;
        if live {
            return segment.get(key).map(|e| Arc::clone(&e.value));
        }
        if let Some((key, entry)) = segment.pop_entry(key) {
            self.evicted.push((key, entry.value));
        }
        None
    }

    /// Store `value`, replacing any previous value for `key`.
    pub fn insert(&mut self, key: String, value: Arc<V>, now: Instant) {
        self.sketch.increment(&key);
        let expires_at = now + self.ttl + ttl_jitter(self.ttl, &key);
        let entry = Entry { value, expires_at };

        for segment in [&mut self.main, &mut self.window] {
            if let Some(slot) = segment.get_mut(&key) {
                let previous = std::mem::replace(slot, entry);
                if !Arc::ptr_eq(&previous.value, &slot.value) {
                    self.evicted.push((key, previous.value));
                }
                return;
            }
        }

        self.remove_expired(now);
        self.window.push(key, entry);
        while self.window.len() > self.window_capacity {
            let Some((candidate_key, candidate)) = self.window.pop_lru() else {
                break;
            };
            self.admit(candidate_key, candidate);
        }
    }

    /// Move a window candidate to the main segment if it is more popular
    /// than the main victim.
    fn admit(&mut self, key: String, entry: Entry<V>) {
        if self.main.len() < self.main_capacity {
            self.main.push(key, entry);
            return;
        }
        let Some((victim_key, _)) = self.main.peek_lru() else {
            self.evicted.push((key, entry.value));
            return;
        };
        if self.sketch.estimate(&key) > self.sketch.estimate(victim_key) {
            if let Some((victim_key, victim)) = self.main.pop_lru() {
                self.evicted.push((victim_key, victim.value));
            }
            self.main.push(key, entry);
        } else {
            self.evicted.push((key, entry.value));
        }
    }

    fn remove_expired(&mut self, now: Instant) {
        for segment in [&mut self.window, &mut self.main] {
            let expired: Vec<String> = segment
                .iter()
                .filter(|(_, e)| e.expires_at <= now)
                .map(|(k, _)| k.clone())
                .collect();
            for key in expired {
                if let Some((key, entry)) = segment.pop_entry(&key) {
                    self.evicted.push((key, entry.value));
                }
            }
        }
    }

    /// Drop `key` from the cache.
    pub fn remove(&mut self, key: &str) {
        for segment in [&mut self.window, &mut self.main] {
            if let Some((key, entry)) = segment.pop_entry(key) {
                self.evicted.push((key, entry.value));
            }
        }
    }

    /// Values evicted since the last call.
    pub fn take_evicted(&mut self) -> Vec<(String, Arc<V>)> {
        std::mem::take(&mut self.evicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys<V>(evicted: &[(String, Arc<V>)]) -> Vec<&str> {
        evicted.iter().map(|(k, _)| k.as_str()).collect()
    }

    #[test]
    fn test_get_and_expiry() {
        let now = Instant::now();
        let mut cache = TinyLfu::new(10, Duration::from_secs(600));
        cache.insert("a".into(), Arc::new(1), now);
        assert_eq!(cache.get("a", now).as_deref(), Some(&1));
        assert_eq!(cache.get("a", now + Duration::from_secs(599)).as_deref(), Some(&1));

        // Past the maximum jitter of 10 seconds.
        assert_eq!(cache.get("a", now + Duration::from_secs(611)), None);
        assert_eq!(keys(&cache.take_evicted()), ["a"]);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_is_bounded() {
        let now = Instant::now();
        let mut cache = TinyLfu::new(3, Duration::from_secs(600));
        for i in 0..10 {
            cache.insert(format!("k{i}"), Arc::new(i), now);
        }
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.take_evicted().len(), 7);
    }

    #[test]
    fn test_frequent_entries_survive_scans() {
        let now = Instant::now();
        let mut cache = TinyLfu::new(3, Duration::from_secs(600));
        cache.insert("hot".into(), Arc::new(0), now);
        for _ in 0..5 {
            assert!(cache.get("hot", now).is_some());
        }
        for i in 0..20 {
            cache.insert(format!("scan{i}"), Arc::new(i), now);
        }
        assert_eq!(cache.get("hot", now).as_deref(), Some(&0));
        assert!(!keys(&cache.take_evicted()).contains(&"hot"));
    }

    #[test]
    fn test_newest_entry_is_always_cached() {
        let now = Instant::now();
        let mut cache = TinyLfu::new(2, Duration::from_secs(600));
        cache.insert("a".into(), Arc::new(1), now);
        cache.insert("b".into(), Arc::new(2), now);
        cache.insert("c".into(), Arc::new(3), now);
        assert_eq!(cache.get("c", now).as_deref(), Some(&3));
    }

    #[test]
    fn test_replace_and_remove() {
        let now = Instant::now();
        let mut cache = TinyLfu::new(4, Duration::from_secs(600));
        cache.insert("a".into(), Arc::new(1), now);
        cache.insert("a".into(), Arc::new(2), now);
        assert_eq!(cache.get("a", now).as_deref(), Some(&2));
        assert_eq!(cache.len(), 1);
        assert_eq!(keys(&cache.take_evicted()), ["a"]);

        cache.remove("a");
        assert!(cache.is_empty());
        assert_eq!(keys(&cache.take_evicted()), ["a"]);
    }

    #[test]
    fn test_ttl_jitter_bounds() {
        for ttl in [600, 30, 0] {
            let ttl = Duration::from_secs(ttl);
            let max = (ttl / 10).min(Duration::from_secs(10));
            for i in 0..100 {
                assert!(ttl_jitter(ttl, &format!("key{i}")) <= max);
            }
        }
    }

    #[test]
    fn test_sketch_ages() {
        let mut sketch = FrequencySketch::new(1);
        for _ in 0..40 {
            sketch.increment("a");
        }
        assert_eq!(sketch.estimate("a"), MAX_COUNT);
        sketch.halve();
        assert_eq!(sketch.estimate("a"), MAX_COUNT / 2);
    }
}
