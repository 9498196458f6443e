//! Time-window coalescing of repeated requests.

use std::time::{Duration, Instant};

/// Holds the latest scheduled value until it has been quiet for `window`.
///
/// Every [`schedule`](Self::schedule) replaces the pending value and pushes
/// the deadline out, so a burst of events yields one value: the last.
/// A window too large to add to the clock never expires; only
/// [`flush`](Self::flush) releases such a value.
#[derive(Clone, Debug)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<(T, Option<Instant>)>,
}

impl<T> Debouncer<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn schedule(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now.checked_add(self.window)));
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending value becomes ready.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().and_then(|(_, deadline)| *deadline)
    }

    /// Take the pending value once its deadline has passed.
    pub fn take_ready(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, Some(deadline))) if now >= *deadline => self.pending.take().map(|(value, _)| value),
            _ => None,
        }
    }

    /// Take the pending value regardless of its deadline.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|(value, _)| value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_collapses_to_last_value() {
        let start = Instant::now();
        let ms = Duration::from_millis;
        let mut debounce = Debouncer::new(ms(40));
        debounce.schedule(1, start);
        debounce.schedule(2, start + ms(10));
        debounce.schedule(3, start + ms(30));

        assert_eq!(debounce.take_ready(start + ms(60)), None);
        assert_eq!(debounce.deadline(), Some(start + ms(70)));
        assert_eq!(debounce.take_ready(start + ms(70)), Some(3));
        assert!(!debounce.is_pending());
        assert_eq!(debounce.take_ready(start + ms(200)), None);
    }

    #[test]
    fn flush_ignores_deadline() {
        let mut debounce = Debouncer::new(Duration::from_secs(60));
        debounce.schedule("resize", Instant::now());
        assert_eq!(debounce.flush(), Some("resize"));
        assert_eq!(debounce.flush(), None);
    }

    #[test]
    fn unbounded_window_waits_for_flush() {
        let now = Instant::now();
        let mut debounce = Debouncer::new(Duration::MAX);
        debounce.schedule(7, now);
        assert!(debounce.is_pending());
        assert_eq!(debounce.deadline(), None);
        assert_eq!(debounce.take_ready(now + Duration::from_secs(3600)), None);
        assert_eq!(debounce.flush(), Some(7));
    }
}
