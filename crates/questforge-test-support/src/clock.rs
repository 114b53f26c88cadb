//! Deterministic `Clock` implementations for tests.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use questforge_core::clock::Clock;

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// A clock that advances by a fixed step on every reading.
///
/// Useful when a test needs log entries with distinct, ordered timestamps.
#[derive(Debug)]
pub struct StepClock {
    current: Mutex<DateTime<Utc>>,
    step: Duration,
}

impl StepClock {
    /// Starts at `start` and advances by `step` per `now()` call.
    #[must_use]
    pub fn new(start: DateTime<Utc>, step: Duration) -> Self {
        Self {
            current: Mutex::new(start),
            step,
        }
    }
}

impl Clock for StepClock {
    fn now(&self) -> DateTime<Utc> {
        let mut current = self.current.lock().expect("step clock mutex poisoned");
        let instant = *current;
        *current = instant + self.step;
        instant
    }
}
