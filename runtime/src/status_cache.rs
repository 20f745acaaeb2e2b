//! Recently seen transaction ids.
//!
//! A best-effort front filter for admission: bounded, and entries expire
//! after a while. The committed transaction column stays the source of
//! truth.

use {
    lru::LruCache,
    std::{
        sync::Mutex,
        time::{Duration, Instant},
    },
    strata_sdk::transaction::TransactionId,
};

pub const DEFAULT_STATUS_CACHE_CAPACITY: usize = 100_000;
pub const DEFAULT_STATUS_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

pub struct StatusCache {
    entries: Mutex<LruCache<TransactionId, Instant>>,
    ttl: Duration,
}

impl Default for StatusCache {
    fn default() -> Self {
        Self::new(DEFAULT_STATUS_CACHE_CAPACITY, DEFAULT_STATUS_CACHE_TTL)
    }
}

impl StatusCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity.max(1))),
            ttl,
        }
    }

    pub fn insert(&self, id: TransactionId) {
        self.insert_at(id, Instant::now());
    }

    fn insert_at(&self, id: TransactionId, now: Instant) {
        self.entries.lock().unwrap().put(id, now);
    }

    pub fn contains(&self, id: &TransactionId) -> bool {
        self.contains_at(id, Instant::now())
    }

    fn contains_at(&self, id: &TransactionId, now: Instant) -> bool {
        let mut entries = self.entries.lock().unwrap();
        match entries.peek(id) {
            Some(inserted) if now.saturating_duration_since(*inserted) < self.ttl => true,
            Some(_) => {
                entries.pop(id);
                false
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use {super::*, strata_sdk::hash::Hash};

    #[test]
    fn test_entries_expire() {
        let cache = StatusCache::new(8, Duration::from_secs(10));
        let id = Hash::new_unique();
        let start = Instant::now();
        cache.insert_at(id, start);
        assert!(cache.contains_at(&id, start + Duration::from_secs(9)));
        assert!(!cache.contains_at(&id, start + Duration::from_secs(10)));
        // expired entries are evicted on lookup
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_evicts_least_recent() {
        let cache = StatusCache::new(2, DEFAULT_STATUS_CACHE_TTL);
        let ids = [Hash::new_unique(), Hash::new_unique(), Hash::new_unique()];
        for id in ids {
            cache.insert(id);
        }
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&ids[0]));
        assert!(cache.contains(&ids[1]));
        assert!(cache.contains(&ids[2]));
    }
}
