use std::thread;
use std::time::{Duration, Instant};

/// Time source for every periodic loop in the stack.
///
/// Loops measure how long a tick took with `elapsed_since` and suspend for
/// the remainder of the period with `sleep`. Swapping the clock makes the
/// pacing logic testable without wall-clock flakiness.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, d: Duration);

    /// Time elapsed since `start`, zero if `start` lies in the future.
    fn elapsed_since(&self, start: Instant) -> Duration {
        self.now().saturating_duration_since(start)
    }

    /// Microseconds elapsed since `epoch`, saturating.
    fn us_since(&self, epoch: Instant) -> u64 {
        u64::try_from(self.elapsed_since(epoch).as_micros()).unwrap_or(u64::MAX)
    }
}

/// Wall clock backed by `std::time::Instant` and `thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if !d.is_zero() {
            thread::sleep(d);
        }
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
    fn sleep(&self, d: Duration) {
        (**self).sleep(d);
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_clock {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct State {
        offset: Duration,
        sleeps: Vec<Duration>,
    }

    /// Virtual clock: `sleep` advances time instantly and is recorded.
    ///
    /// Clones share the same timeline, so a loop under test and the test
    /// body can both move time forward (the body simulating work, the loop
    /// sleeping out the period).
    #[derive(Debug, Clone)]
    pub struct TestClock {
        origin: Instant,
        state: Arc<Mutex<State>>,
    }

    impl Default for TestClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TestClock {
        pub fn new() -> Self {
            Self {
                origin: Instant::now(),
                state: Arc::new(Mutex::new(State::default())),
            }
        }

        /// Move time forward without recording a sleep (simulated work).
        pub fn advance(&self, d: Duration) {
            if let Ok(mut st) = self.state.lock() {
                st.offset = st.offset.saturating_add(d);
            }
        }

        /// Total virtual time since construction.
        pub fn offset(&self) -> Duration {
            self.state.lock().map(|st| st.offset).unwrap_or_default()
        }

        /// Every non-zero sleep requested so far, in order.
        pub fn sleeps(&self) -> Vec<Duration> {
            self.state
                .lock()
                .map(|st| st.sleeps.clone())
                .unwrap_or_default()
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> Instant {
            self.origin + self.offset()
        }

        fn sleep(&self, d: Duration) {
            if d.is_zero() {
                return;
            }
            if let Ok(mut st) = self.state.lock() {
                st.offset = st.offset.saturating_add(d);
                st.sleeps.push(d);
            }
        }
    }

}
