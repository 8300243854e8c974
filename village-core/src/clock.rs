//! Simulated time.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::warn;

/// Display format used for tick headers and logs.
pub const CLOCK_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A monotonically advancing simulated timestamp.
///
/// The only way to move time is [`Clock::advance`], which takes an unsigned
/// duration, so the clock never runs backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clock {
    current: DateTime<Utc>,
}

impl Clock {
    /// A clock starting at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { current: start }
    }

    /// A clock starting at the current wall-clock time.
    #[must_use]
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    /// The current simulated time.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.current
    }

    /// Move time forward by `delta` and return the new time.
    ///
    /// An advance that would overflow the representable range leaves the
    /// clock where it is.
    pub fn advance(&mut self, delta: Duration) -> DateTime<Utc> {
        let next = TimeDelta::from_std(delta)
            .ok()
            .and_then(|d| self.current.checked_add_signed(d));
        match next {
            Some(next) => self.current = next,
            None => warn!(delta_secs = delta.as_secs(), "Clock advance out of range; ignored"),
        }
        self.current
    }

    /// The current time as `YYYY-MM-DD HH:MM:SS`.
    #[must_use]
    pub fn formatted(&self) -> String {
        self.current.format(CLOCK_FORMAT).to_string()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::starting_now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).single().expect("valid date")
    }

    #[test]
    fn advance_moves_forward_by_delta() {
        let mut clock = Clock::new(start());
        clock.advance(Duration::from_secs(60));
        clock.advance(Duration::from_secs(60));
        assert_eq!(clock.formatted(), "2024-05-01 08:02:00");
    }

    #[test]
    fn zero_advance_is_allowed() {
        let mut clock = Clock::new(start());
        assert_eq!(clock.advance(Duration::ZERO), start());
    }

    #[test]
    fn overflowing_advance_is_ignored() {
        let mut clock = Clock::new(start());
        let after = clock.advance(Duration::from_secs(u64::MAX));
        assert_eq!(after, start());
    }
}
