//! Bounded, age-limited cache for synthesized speech audio
//!
//! Keys are caller-chosen strings (the raw reply text by default). Entries
//! expire after a TTL and the live set is capped at a fixed capacity,
//! enforced by an eviction pass on every `put`. `get` never removes
//! anything; expired entries linger until the next `put` or `clear`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// One cached synthesis result
#[derive(Debug, Clone)]
struct CacheEntry {
    audio: Vec<u8>,
    created_at: Instant,
    /// Insertion order, breaking `created_at` ties during eviction
    seq: u64,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    next_seq: u64,
}

/// Bounded TTL cache for synthesized audio
///
/// Shared across cooperative tasks behind an internal mutex; the lock is
/// only held for map operations, never across await points.
#[derive(Debug)]
pub struct SpeechCache {
    ttl: Duration,
    capacity: usize,
    inner: Mutex<CacheInner>,
}

impl SpeechCache {
    /// Create a cache with the given entry TTL and capacity
    #[must_use]
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// Look up audio by key
    ///
    /// Returns the bytes only when an entry exists and is no older than the
    /// TTL. An expired entry reports a miss but stays in the map.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let inner = self.inner.lock().expect("cache lock poisoned");
        let entry = inner.entries.get(key)?;

        if entry.created_at.elapsed() > self.ttl {
            tracing::debug!(key, "cache entry expired");
            return None;
        }

        tracing::debug!(key, bytes = entry.audio.len(), "cache hit");
        Some(entry.audio.clone())
    }

    /// Insert or overwrite an entry, then run the eviction pass
    ///
    /// Eviction first drops every entry older than the TTL, then removes
    /// oldest-by-creation entries until the live count fits the capacity.
    pub fn put(&self, key: impl Into<String>, audio: Vec<u8>) {
        let key = key.into();
        let now = Instant::now();

        let mut inner = self.inner.lock().expect("cache lock poisoned");
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(
            key.clone(),
            CacheEntry {
                audio,
                created_at: now,
                seq,
            },
        );

        let ttl = self.ttl;
        inner
            .entries
            .retain(|_, entry| now.duration_since(entry.created_at) <= ttl);

        while inner.entries.len() > self.capacity {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| (entry.created_at, entry.seq))
                .map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    tracing::debug!(key = %k, "evicting oldest cache entry");
                    inner.entries.remove(&k);
                }
                None => break,
            }
        }

        tracing::debug!(key, live = inner.entries.len(), "cache store");
    }

    /// Drop all entries
    pub fn clear(&self) {
        self.inner
            .lock()
            .expect("cache lock poisoned")
            .entries
            .clear();
    }

    /// Number of stored entries, including any that have expired but not
    /// yet been evicted
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache lock poisoned").entries.len()
    }

    /// True when no entries are stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_cache() -> SpeechCache {
        SpeechCache::new(Duration::from_secs(3600), 3)
    }

    #[tokio::test(start_paused = true)]
    async fn roundtrip() {
        let cache = small_cache();
        cache.put("hej", vec![1, 2, 3]);
        assert_eq!(cache.get("hej"), Some(vec![1, 2, 3]));
    }

    #[tokio::test(start_paused = true)]
    async fn miss_on_unknown_key() {
        let cache = small_cache();
        assert_eq!(cache.get("hej"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn put_overwrites() {
        let cache = small_cache();
        cache.put("hej", vec![1]);
        cache.put("hej", vec![2]);
        assert_eq!(cache.get("hej"), Some(vec![2]));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_evicts_oldest_first() {
        let cache = small_cache();
        for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
            cache.put(*key, vec![i as u8]);
            tokio::time::advance(Duration::from_millis(1)).await;
        }

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(vec![1]));
        assert_eq!(cache.get("c"), Some(vec![2]));
        assert_eq!(cache.get("d"), Some(vec![3]));
    }

    #[tokio::test(start_paused = true)]
    async fn same_instant_ties_evict_in_insertion_order() {
        let cache = small_cache();
        cache.put("a", vec![0]);
        cache.put("b", vec![1]);
        cache.put("c", vec![2]);
        cache.put("d", vec![3]);

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("d"), Some(vec![3]));
    }

    #[tokio::test(start_paused = true)]
    async fn clear_drops_everything() {
        let cache = small_cache();
        cache.put("a", vec![1]);
        cache.put("b", vec![2]);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get("a"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_misses_but_is_not_removed_by_get() {
        let cache = SpeechCache::new(Duration::from_secs(60), 3);
        cache.put("hej", vec![1]);

        tokio::time::advance(Duration::from_secs(61)).await;

        assert_eq!(cache.get("hej"), None);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn put_evicts_expired_entries() {
        let cache = SpeechCache::new(Duration::from_secs(60), 3);
        cache.put("old", vec![1]);

        tokio::time::advance(Duration::from_secs(61)).await;
        cache.put("fresh", vec![2]);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("fresh"), Some(vec![2]));
    }

    #[tokio::test(start_paused = true)]
    async fn entry_within_ttl_still_served() {
        let cache = SpeechCache::new(Duration::from_secs(60), 3);
        cache.put("hej", vec![1]);

        tokio::time::advance(Duration::from_secs(59)).await;

        assert_eq!(cache.get("hej"), Some(vec![1]));
    }
}
