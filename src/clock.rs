//! Time source for rental bookkeeping
//!
//! Session timestamps come from an injected clock so expiry and inactivity
//! rules can be exercised without waiting hours.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// The real monotonic clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    #[cfg(test)]
    pub fn advance(&self, by: Duration) {
        *self.elapsed.lock() += by;
    }

    /// Jump to a point measured from the clock's creation. Never goes backwards.
    pub fn set_elapsed(&self, to: Duration) {
        let mut elapsed = self.elapsed.lock();
        if to > *elapsed {
            *elapsed = to;
        }
    }

    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }

    pub fn origin(&self) -> Instant {
        self.origin
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.elapsed.lock()
    }
}
