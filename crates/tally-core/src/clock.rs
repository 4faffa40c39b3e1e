//! Wall-clock capability.
//!
//! Everything that needs "now" takes a `&dyn Clock` so tests and the
//! `TALLY_NOW` override can pin time without touching global state.

use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current time in Unix epoch seconds.
pub trait Clock {
    fn now(&self) -> i64;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
    }
}

/// A clock frozen at a fixed instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock {
    frozen_at: i64,
}

impl FixedClock {
    #[must_use]
    pub const fn new(frozen_at: i64) -> Self {
        Self { frozen_at }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.frozen_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_is_frozen() {
        let clock = FixedClock::new(1_000);
        assert_eq!(clock.now(), 1_000);
        assert_eq!(clock.now(), 1_000);
        assert_eq!(FixedClock::new(-61).now(), -61);
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now() > 1_577_836_800);
    }
}
