//! Manually driven clock
//!
//! Tests pin the wall clock to known instants and advance it explicitly,
//! making soft and hard expiry decisions deterministic.

use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use swrcache_core::Clock;

/// Clock whose time only moves when the test says so
pub struct ManualClock {
    now: Mutex<SystemTime>,
}

impl ManualClock {
    /// Start at the given number of seconds past the epoch.
    pub fn at_epoch_secs(secs: u64) -> Self {
        Self {
            now: Mutex::new(UNIX_EPOCH + Duration::from_secs(secs)),
        }
    }

    /// Start at an arbitrary instant.
    pub fn at(instant: SystemTime) -> Self {
        Self {
            now: Mutex::new(instant),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }

    /// Jump to an absolute instant.
    pub fn set(&self, instant: SystemTime) {
        *self.now.lock().unwrap() = instant;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock().unwrap()
    }
}
