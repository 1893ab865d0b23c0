//! Short-lived idempotency cache for bus deliveries.
//!
//! The bus guarantees at-least-once delivery, so events carrying an
//! `event_id` are remembered here for a short TTL and repeats are
//! dropped at the bridge boundary. Bounded by entry count as well, so a
//! publisher storm cannot grow it without limit.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Bounded, TTL'd set of recently seen event ids.
#[derive(Debug)]
pub struct DedupCache {
    ttl: Duration,
    capacity: usize,
    seen: HashMap<String, Instant>,
    order: VecDeque<String>,
}

impl DedupCache {
    /// Creates a cache retaining at most `capacity` ids for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity,
            seen: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Records an event id. Returns `true` if it was not seen within the
    /// TTL (i.e. the event should be processed).
    pub fn insert(&mut self, event_id: &str) -> bool {
        self.evict();
        if let Some(first_seen) = self.seen.get(event_id) {
            if first_seen.elapsed() < self.ttl {
                return false;
            }
            // Expired after the eviction sweep ran; drop the stale
            // order entry so the refresh below keeps both indexes
            // paired one-to-one.
            self.order.retain(|id| id != event_id);
        }
        self.seen.insert(event_id.to_string(), Instant::now());
        self.order.push_back(event_id.to_string());
        true
    }

    fn evict(&mut self) {
        while let Some(oldest) = self.order.front() {
            let expired = self
                .seen
                .get(oldest)
                .is_none_or(|t| t.elapsed() >= self.ttl);
            if expired || self.order.len() > self.capacity {
                if let Some(id) = self.order.pop_front() {
                    self.seen.remove(&id);
                }
            } else {
                break;
            }
        }
    }

    /// Number of ids currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Returns `true` if no ids are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn first_sight_passes_repeat_drops() {
        let mut cache = DedupCache::new(Duration::from_secs(60), 16);
        assert!(cache.insert("evt-1"));
        assert!(!cache.insert("evt-1"));
        assert!(cache.insert("evt-2"));
    }

    #[test]
    fn expired_id_passes_again() {
        let mut cache = DedupCache::new(Duration::ZERO, 16);
        assert!(cache.insert("evt-1"));
        assert!(cache.insert("evt-1"));
    }

    #[test]
    fn capacity_bounds_tracked_ids() {
        let mut cache = DedupCache::new(Duration::from_secs(60), 4);
        for n in 0..100 {
            cache.insert(&format!("evt-{n}"));
        }
        assert!(cache.len() <= 5);
    }

    #[test]
    fn refreshing_expired_id_keeps_indexes_paired() {
        let mut cache = DedupCache::new(Duration::from_secs(60), 16);
        cache.insert("evt-1");
        cache.insert("evt-2");
        // Backdate evt-2 past the TTL while evt-1 stays fresh at the
        // front, modeling an entry that expires between the eviction
        // sweep and the freshness check.
        if let Some(first_seen) = cache.seen.get_mut("evt-2") {
            *first_seen = Instant::now() - Duration::from_secs(120);
        }

        assert!(cache.insert("evt-2"));
        assert_eq!(cache.order.len(), cache.seen.len());
        assert!(!cache.insert("evt-2"));
    }

    #[test]
    fn oldest_evicted_first() {
        let mut cache = DedupCache::new(Duration::from_secs(60), 2);
        cache.insert("evt-1");
        cache.insert("evt-2");
        cache.insert("evt-3");
        cache.insert("evt-4");
        // evt-1 fell out, so it passes again.
        assert!(cache.insert("evt-1"));
    }
}
