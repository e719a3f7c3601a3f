//! Per-key window counter implementation.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Outcome of attempting to consume one admission unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Consumption {
    /// Whether the unit was granted
    pub admitted: bool,
    /// Units left in the current window after this attempt
    pub remaining: u64,
    /// Time until the current window resets
    pub retry_after: Duration,
}

/// A counter that tracks admission units within a fixed time window.
///
/// The window starts at the first consumption of a period and resets once
/// the window duration has elapsed. Consumption is compare-then-increment
/// under a single lock, so concurrent consumers for the same key cannot
/// jointly overshoot the limit; a denied attempt leaves the count unchanged.
pub struct WindowCounter {
    /// Maximum units per window
    max: u64,
    /// Window duration
    window: Duration,
    /// Current count and window start, guarded together
    state: Mutex<WindowState>,
}

struct WindowState {
    count: u64,
    window_start: Instant,
}

impl WindowCounter {
    /// Create a new window counter.
    pub fn new(max: u64, window: Duration) -> Self {
        Self {
            max,
            window,
            state: Mutex::new(WindowState {
                count: 0,
                window_start: Instant::now(),
            }),
        }
    }

    /// Attempt to consume one admission unit.
    pub fn try_consume(&self) -> Consumption {
        let mut state = self.state.lock();
        let now = Instant::now();

        if now.duration_since(state.window_start) >= self.window {
            state.count = 0;
            state.window_start = now;
        }

        let admitted = state.count < self.max;
        if admitted {
            state.count += 1;
        }

        Consumption {
            admitted,
            remaining: self.max.saturating_sub(state.count),
            retry_after: self
                .window
                .saturating_sub(now.duration_since(state.window_start)),
        }
    }

    /// Get the current count within the active window.
    pub fn current_count(&self) -> u64 {
        let state = self.state.lock();
        if state.window_start.elapsed() >= self.window {
            0
        } else {
            state.count
        }
    }

    /// Whether the current window has lapsed without a new consumption.
    ///
    /// An expired counter holds no live state; the store drops it on its
    /// next sweep.
    pub(super) fn is_expired(&self) -> bool {
        self.state.lock().window_start.elapsed() >= self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_consume_within_limit() {
        let counter = WindowCounter::new(10, Duration::from_secs(1));

        let consumption = counter.try_consume();
        assert!(consumption.admitted);
        assert_eq!(consumption.remaining, 9);
        assert_eq!(counter.current_count(), 1);
    }

    #[test]
    fn test_consume_exceeds_limit() {
        let counter = WindowCounter::new(5, Duration::from_secs(1));

        for _ in 0..5 {
            assert!(counter.try_consume().admitted);
        }

        // The 6th attempt is denied
        let consumption = counter.try_consume();
        assert!(!consumption.admitted);
        assert_eq!(consumption.remaining, 0);
    }

    #[test]
    fn test_denied_attempt_does_not_advance_count() {
        let counter = WindowCounter::new(2, Duration::from_secs(1));

        counter.try_consume();
        counter.try_consume();
        counter.try_consume();
        counter.try_consume();

        // Denied attempts leave the counter pinned at the limit
        assert_eq!(counter.current_count(), 2);
    }

    #[test]
    fn test_window_reset_after_expiry() {
        let counter = WindowCounter::new(2, Duration::from_millis(50));

        assert!(counter.try_consume().admitted);
        assert!(counter.try_consume().admitted);
        assert!(!counter.try_consume().admitted);

        thread::sleep(Duration::from_millis(60));

        // A fresh window: the next attempt is the 1st of the new period
        let consumption = counter.try_consume();
        assert!(consumption.admitted);
        assert_eq!(counter.current_count(), 1);
    }

    #[test]
    fn test_retry_after_shrinks_as_window_ages() {
        let counter = WindowCounter::new(5, Duration::from_millis(100));

        let first = counter.try_consume().retry_after;
        thread::sleep(Duration::from_millis(20));
        let second = counter.try_consume().retry_after;

        assert!(second < first);
        assert!(first <= Duration::from_millis(100));
    }

    #[test]
    fn test_expiry_check() {
        let counter = WindowCounter::new(1, Duration::from_millis(10));
        counter.try_consume();
        assert!(!counter.is_expired());

        thread::sleep(Duration::from_millis(20));
        assert!(counter.is_expired());
    }

    #[test]
    fn test_concurrent_consumption_respects_limit() {
        use std::sync::Arc;

        let counter = Arc::new(WindowCounter::new(50, Duration::from_secs(5)));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let counter = Arc::clone(&counter);
            handles.push(thread::spawn(move || {
                let mut admitted = 0u64;
                for _ in 0..20 {
                    if counter.try_consume().admitted {
                        admitted += 1;
                    }
                }
                admitted
            }));
        }

        let total: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 50);
    }
}
