//! In-memory bounded result cache.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use routir_core::{traits::ResultCache, types::Scores, Result};

/// Cached value with its insertion time.
#[derive(Debug, Clone)]
struct CacheEntry {
    scores: Scores,
    inserted_at: Instant,
    /// Insertion sequence number; matches the live slot in the eviction queue.
    seq: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    /// Keys in insertion order. Slots whose `seq` no longer matches the entry
    /// are stale (key was refreshed or removed) and skipped on eviction.
    order: VecDeque<(String, u64)>,
    next_seq: u64,
}

impl CacheState {
    fn evict_oldest(&mut self) {
        while let Some((key, seq)) = self.order.pop_front() {
            if self.entries.get(&key).is_some_and(|e| e.seq == seq) {
                self.entries.remove(&key);
                tracing::trace!(key = %key, "Evicted cache entry");
                return;
            }
        }
    }

    /// Drop expired entries from the front of the queue. With one TTL for
    /// every entry, expired entries are always the oldest ones.
    fn drop_expired(&mut self, ttl: Duration) {
        while let Some((key, seq)) = self.order.front() {
            match self.entries.get(key) {
                Some(e) if e.seq == *seq && e.inserted_at.elapsed() <= ttl => return,
                Some(e) if e.seq == *seq => {
                    self.entries.remove(key);
                }
                _ => {}
            }
            self.order.pop_front();
        }
    }

    fn compact(&mut self) {
        let entries = &self.entries;
        self.order
            .retain(|(key, seq)| entries.get(key).is_some_and(|e| e.seq == *seq));
    }
}

/// Bounded FIFO cache with optional TTL.
///
/// Expired entries are dropped lazily on lookup and swept on insert; inserts
/// beyond `capacity` evict the oldest-inserted entry. The lock is never held
/// across an await.
#[derive(Debug)]
pub struct InMemoryCache {
    state: Mutex<CacheState>,
    capacity: usize,
    ttl: Option<Duration>,
}

impl InMemoryCache {
    /// Create a cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            capacity,
            ttl: None,
        }
    }

    /// Set the time-to-live of entries.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of stored entries, expired ones included until touched.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        self.ttl
            .is_some_and(|ttl| entry.inserted_at.elapsed() > ttl)
    }
}

#[async_trait]
impl ResultCache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Scores>> {
        let mut state = self.state.lock().unwrap();

        let expired = match state.entries.get(key) {
            None => return Ok(None),
            Some(entry) if self.is_expired(entry) => true,
            Some(entry) => return Ok(Some(entry.scores.clone())),
        };

        if expired {
            state.entries.remove(key);
            tracing::trace!(key = %key, "Dropped expired cache entry");
        }
        Ok(None)
    }

    async fn put(&self, key: &str, scores: &Scores) -> Result<()> {
        if self.capacity == 0 {
            return Ok(());
        }

        let mut state = self.state.lock().unwrap();
        if let Some(ttl) = self.ttl {
            state.drop_expired(ttl);
        }
        let seq = state.next_seq;
        state.next_seq += 1;

        state.entries.insert(
            key.to_string(),
            CacheEntry {
                scores: scores.clone(),
                inserted_at: Instant::now(),
                seq,
            },
        );
        state.order.push_back((key.to_string(), seq));

        while state.entries.len() > self.capacity {
            state.evict_oldest();
        }

        // Refreshed keys leave stale slots behind.
        if state.order.len() > 2 * self.capacity + 16 {
            state.compact();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(doc: &str, score: f64) -> Scores {
        Scores::from([(doc.to_string(), score)])
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let cache = InMemoryCache::new(4);
        cache.put("k", &scores("d1", 0.9)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(scores("d1", 0.9)));
        assert_eq!(cache.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_evicts_oldest_inserted() {
        let cache = InMemoryCache::new(2);
        cache.put("a", &scores("d", 1.0)).await.unwrap();
        cache.put("b", &scores("d", 2.0)).await.unwrap();
        // Reading `a` does not protect it: eviction is by insertion order.
        assert!(cache.get("a").await.unwrap().is_some());
        cache.put("c", &scores("d", 3.0)).await.unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a").await.unwrap(), None);
        assert!(cache.get("b").await.unwrap().is_some());
        assert!(cache.get("c").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_refresh_moves_key_to_back() {
        let cache = InMemoryCache::new(2);
        cache.put("a", &scores("d", 1.0)).await.unwrap();
        cache.put("b", &scores("d", 2.0)).await.unwrap();
        cache.put("a", &scores("d", 10.0)).await.unwrap();
        cache.put("c", &scores("d", 3.0)).await.unwrap();

        assert_eq!(cache.get("b").await.unwrap(), None);
        assert_eq!(cache.get("a").await.unwrap(), Some(scores("d", 10.0)));
    }

    #[tokio::test]
    async fn test_zero_capacity_stores_nothing() {
        let cache = InMemoryCache::new(0);
        cache.put("a", &scores("d", 1.0)).await.unwrap();
        assert!(cache.is_empty());
        assert_eq!(cache.get("a").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry() {
        let cache = InMemoryCache::new(8).with_ttl(Duration::from_secs(10));
        cache.put("a", &scores("d", 1.0)).await.unwrap();

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(cache.get("a").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cache.get("a").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_insert_sweeps_expired() {
        let cache = InMemoryCache::new(8).with_ttl(Duration::from_secs(1));
        cache.put("a", &scores("d", 1.0)).await.unwrap();
        cache.put("b", &scores("d", 1.0)).await.unwrap();
        // Stale slot for `a` stays at the front of the queue.
        cache.put("a", &scores("d", 2.0)).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;

        cache.put("c", &scores("d", 1.0)).await.unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("c").await.unwrap(), Some(scores("d", 1.0)));
    }

    #[tokio::test]
    async fn test_many_refreshes_stay_bounded() {
        let cache = InMemoryCache::new(3);
        for i in 0..100 {
            cache.put("hot", &scores("d", i as f64)).await.unwrap();
        }
        assert_eq!(cache.len(), 1);
        assert!(cache.state.lock().unwrap().order.len() <= 2 * 3 + 16 + 1);
        assert_eq!(cache.get("hot").await.unwrap(), Some(scores("d", 99.0)));
    }
}
