//! Lazy per-key counter storage.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

use super::counter::{Consumption, WindowCounter};
use super::key::RateKey;

/// Owns the window counters for one limiter instance.
///
/// Counters are created lazily on the first consumption for a key and are
/// dropped by a periodic sweep once their window has lapsed, so the store
/// does not accumulate a counter per distinct key ever seen. The store is
/// encapsulated within its limiter; the only mutation path from outside
/// this module is [`CounterStore::try_consume`].
pub struct CounterStore {
    /// Window counters indexed by rate key
    counters: DashMap<RateKey, WindowCounter>,
    /// Maximum units per window, applied to every counter
    max: u64,
    /// Window duration, applied to every counter
    window: Duration,
    /// When expired counters were last swept out
    last_sweep: Mutex<Instant>,
}

impl CounterStore {
    /// Create a new store. All counters share the same limit and window.
    pub fn new(max: u64, window: Duration) -> Self {
        Self {
            counters: DashMap::new(),
            max,
            window,
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    /// Consume one admission unit for the given key.
    ///
    /// The compare-and-increment happens under the counter's own lock, so
    /// concurrent requests for the same key are serialized at that point.
    pub fn try_consume(&self, key: &RateKey) -> Consumption {
        self.sweep_expired();

        let counter = self.counters.entry(key.clone()).or_insert_with(|| {
            debug!(
                key = %key,
                max = self.max,
                window_ms = self.window.as_millis() as u64,
                "Creating new window counter"
            );
            WindowCounter::new(self.max, self.window)
        });

        counter.try_consume()
    }

    /// Drop counters whose window has lapsed, at most once per window.
    ///
    /// A counter that lapses between sweeps resets in place on its next
    /// consumption, so eviction cadence never affects admission decisions.
    fn sweep_expired(&self) {
        {
            let mut last_sweep = self.last_sweep.lock();
            if last_sweep.elapsed() < self.window {
                return;
            }
            *last_sweep = Instant::now();
        }

        let before = self.counters.len();
        self.counters.retain(|_, counter| !counter.is_expired());

        let evicted = before.saturating_sub(self.counters.len());
        if evicted > 0 {
            debug!(evicted, "Evicted expired window counters");
        }
    }

    /// Get the number of active counters.
    pub fn counter_count(&self) -> usize {
        self.counters.len()
    }

    /// Clear all counters.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.counters.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn key(value: &str) -> RateKey {
        RateKey::new(
            "GET",
            "/topics",
            vec![("query.userId".to_string(), value.to_string())],
        )
    }

    #[test]
    fn test_counter_created_lazily() {
        let store = CounterStore::new(2, Duration::from_secs(1));
        assert_eq!(store.counter_count(), 0);

        store.try_consume(&key("abc"));
        assert_eq!(store.counter_count(), 1);

        store.try_consume(&key("abc"));
        assert_eq!(store.counter_count(), 1);
    }

    #[test]
    fn test_keys_are_independent() {
        let store = CounterStore::new(1, Duration::from_secs(1));

        assert!(store.try_consume(&key("abc")).admitted);
        assert!(!store.try_consume(&key("abc")).admitted);

        // Exhausting one key does not affect another
        assert!(store.try_consume(&key("xyz")).admitted);
        assert_eq!(store.counter_count(), 2);
    }

    #[test]
    fn test_expired_counters_are_evicted() {
        let store = CounterStore::new(2, Duration::from_millis(50));

        for i in 0..100 {
            store.try_consume(&key(&format!("user{}", i)));
        }
        assert_eq!(store.counter_count(), 100);

        thread::sleep(Duration::from_millis(120));

        // The next consumption sweeps out every lapsed counter
        store.try_consume(&key("fresh"));
        assert_eq!(store.counter_count(), 1);
    }

    #[test]
    fn test_live_counters_survive_the_sweep() {
        let store = CounterStore::new(5, Duration::from_millis(100));

        store.try_consume(&key("abc"));
        thread::sleep(Duration::from_millis(20));

        // Force a sweep by pretending a window has passed since the last one
        *store.last_sweep.lock() = Instant::now() - Duration::from_millis(200);
        store.try_consume(&key("xyz"));

        // "abc" is mid-window and keeps its count
        assert_eq!(store.counter_count(), 2);
        assert!(store.try_consume(&key("abc")).admitted);
    }

    #[test]
    fn test_clear_counters() {
        let store = CounterStore::new(2, Duration::from_secs(1));
        store.try_consume(&key("abc"));
        assert_eq!(store.counter_count(), 1);

        store.clear();
        assert_eq!(store.counter_count(), 0);
    }
}
