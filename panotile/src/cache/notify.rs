//! Coalesced "tile loaded" notifications.
//!
//! Many tiles tend to arrive within a few milliseconds of each other. Raising
//! one redraw per tile would waste frames, so arrivals are folded into a
//! single notification per interval. The notification fires immediately when
//! the last outstanding request settles.

use std::fmt;
use std::time::{Duration, Instant};

/// Default coalescing window (50ms).
pub const DEFAULT_NOTIFY_INTERVAL: Duration = Duration::from_millis(50);

/// Listener invoked when new tile data is available.
pub type LoadListener = Box<dyn FnMut() + Send>;

/// Rate limiter for tile-arrival notifications.
pub struct LoadNotifier {
    interval: Duration,
    last_fired: Option<Instant>,
    pending: bool,
    fired: u64,
    listener: Option<LoadListener>,
}

impl fmt::Debug for LoadNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadNotifier")
            .field("interval", &self.interval)
            .field("last_fired", &self.last_fired)
            .field("pending", &self.pending)
            .field("fired", &self.fired)
            .finish()
    }
}

impl Default for LoadNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFY_INTERVAL)
    }
}

impl LoadNotifier {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_fired: None,
            pending: false,
            fired: 0,
            listener: None,
        }
    }

    pub fn set_listener(&mut self, listener: LoadListener) {
        self.listener = Some(listener);
    }

    /// Note that new data arrived.
    pub fn record_arrival(&mut self) {
        self.pending = true;
    }

    /// Fire the notification if data is pending and either nothing is left in
    /// flight or the interval since the last notification has elapsed.
    ///
    /// # Arguments
    ///
    /// * `outstanding` - Number of requests still in flight
    /// * `now` - Current time
    ///
    /// # Returns
    ///
    /// `true` if the notification fired.
    pub fn poll(&mut self, outstanding: usize, now: Instant) -> bool {
        if !self.pending {
            return false;
        }
        let window_elapsed = match self.last_fired {
            Some(last) => now > last + self.interval,
            None => true,
        };
        if outstanding > 0 && !window_elapsed {
            return false;
        }

        self.pending = false;
        self.last_fired = Some(now);
        self.fired += 1;
        if let Some(listener) = self.listener.as_mut() {
            listener();
        }
        true
    }

    /// Whether arrivals are waiting for the window to elapse.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Number of notifications raised so far.
    pub fn fired(&self) -> u64 {
        self.fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_nothing_pending_never_fires() {
        let mut notifier = LoadNotifier::default();
        assert!(!notifier.poll(0, Instant::now()));
    }

    #[test]
    fn test_burst_within_window_fires_once() {
        let mut notifier = LoadNotifier::default();
        let start = Instant::now();

        notifier.record_arrival();
        assert!(notifier.poll(5, start));
        for ms in [5, 10, 20, 40] {
            notifier.record_arrival();
            assert!(!notifier.poll(5, start + Duration::from_millis(ms)));
        }
        assert_eq!(notifier.fired(), 1);
        assert!(notifier.is_pending());

        assert!(notifier.poll(5, start + Duration::from_millis(51)));
        assert_eq!(notifier.fired(), 2);
    }

    #[test]
    fn test_last_outstanding_request_fires_immediately() {
        let mut notifier = LoadNotifier::default();
        let start = Instant::now();

        notifier.record_arrival();
        assert!(notifier.poll(3, start));
        notifier.record_arrival();
        assert!(notifier.poll(0, start + Duration::from_millis(1)));
    }

    #[test]
    fn test_listener_is_invoked() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut notifier = LoadNotifier::default();
        let seen = Arc::clone(&count);
        notifier.set_listener(Box::new(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        notifier.record_arrival();
        notifier.poll(0, Instant::now());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
