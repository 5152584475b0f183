//! Clock source for expiry comparisons.

use std::sync::RwLock;

use time::{Duration, OffsetDateTime};

/// Source of the current time.
///
/// Every expiry check in the crate goes through a `Clock` so that tests can
/// pin time instead of sleeping.
pub trait Clock: Send + Sync {
    /// Returns the current UTC time.
    fn now(&self) -> OffsetDateTime;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<OffsetDateTime>,
}

impl FixedClock {
    /// Creates a clock frozen at `now`.
    #[must_use]
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    /// Creates a clock frozen at the current wall-clock second.
    #[must_use]
    pub fn at_now() -> Self {
        let now = OffsetDateTime::now_utc();
        Self::new(now.replace_nanosecond(0).unwrap_or(now))
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.write() {
            *now += by;
        }
    }

    /// Sets the clock to an absolute instant.
    pub fn set(&self, to: OffsetDateTime) {
        if let Ok(mut now) = self.now.write() {
            *now = to;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        match self.now.read() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_fixed_clock_advance() {
        let clock = FixedClock::new(datetime!(2025-01-01 00:00 UTC));
        assert_eq!(clock.now(), datetime!(2025-01-01 00:00 UTC));

        clock.advance(Duration::hours(2));
        assert_eq!(clock.now(), datetime!(2025-01-01 02:00 UTC));

        clock.set(datetime!(2030-06-15 12:00 UTC));
        assert_eq!(clock.now(), datetime!(2030-06-15 12:00 UTC));
    }

    #[test]
    fn test_system_clock_is_utc() {
        let now = SystemClock.now();
        assert!(now.offset().is_utc());
    }
}
