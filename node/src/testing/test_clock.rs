//! Testing clock
//!
//! A controllable clock for testing.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::{
    components::consensus::Clock,
    types::{TimeDiff, Timestamp},
};

/// A rewindable and forwardable clock for testing that does not tick on its own.
#[derive(Debug)]
pub(crate) struct TestClock {
    /// The current time set on the clock, in milliseconds since the epoch.
    now: AtomicU64,
}

impl TestClock {
    /// Creates a new testing clock showing `now`.
    ///
    /// Testing clocks will not advance unless prompted to do so.
    pub(crate) fn new(now: Timestamp) -> Self {
        TestClock {
            now: AtomicU64::new(now.millis()),
        }
    }

    /// Advances the clock by `duration`.
    pub(crate) fn advance(&self, duration: TimeDiff) {
        self.now.fetch_add(duration.millis(), Ordering::SeqCst);
    }

    /// Turns the clock back by `duration`.
    pub(crate) fn rewind(&self, duration: TimeDiff) {
        self.now.fetch_sub(duration.millis(), Ordering::SeqCst);
    }

    /// Sets the clock to `now`.
    pub(crate) fn set(&self, now: Timestamp) {
        self.now.store(now.millis(), Ordering::SeqCst);
    }
}

impl Clock for TestClock {
    fn now(&self) -> Timestamp {
        Timestamp::from(self.now.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use std::{thread, time::Duration};

    use super::*;

    #[test]
    fn test_clock_operation() {
        let clock = TestClock::new(Timestamp::from(10_000));
        let initial = clock.now();

        // Ensure the clock does not advance on its own.
        thread::sleep(Duration::from_millis(10));
        assert_eq!(initial, clock.now());

        // Ensure the clock can go forwards and backwards.
        clock.advance(TimeDiff::from_seconds(2));
        assert_eq!(clock.now().saturating_diff(initial), TimeDiff::from_seconds(2));

        clock.rewind(TimeDiff::from_seconds(3));
        assert_eq!(initial.saturating_diff(clock.now()), TimeDiff::from_seconds(1));

        clock.set(Timestamp::from(42));
        assert_eq!(clock.now(), Timestamp::from(42));
    }
}
