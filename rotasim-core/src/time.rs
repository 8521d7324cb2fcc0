//! Simulation time with nanosecond resolution.

use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::time::Duration;

const NANOS_PER_SEC: i64 = 1_000_000_000;
const NANOS_PER_MILLI: i64 = 1_000_000;

/// Point or span on the simulated timeline.
///
/// Signed so that pre-pull actions can sit before the encounter start at zero.
/// `SimTime::NEVER` marks "never expires"; addition saturates so that
/// `NEVER + x` stays `NEVER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimTime(i64);

impl SimTime {
    /// Encounter start.
    pub const ZERO: SimTime = SimTime(0);
    /// Sentinel for effects and schedules that never come due.
    pub const NEVER: SimTime = SimTime(i64::MAX);

    /// Creates time from raw nanoseconds.
    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    /// Creates time from milliseconds.
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis.saturating_mul(NANOS_PER_MILLI))
    }

    /// Creates time from whole seconds.
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs.saturating_mul(NANOS_PER_SEC))
    }

    /// Creates time from fractional seconds, rounding to the nearest nanosecond.
    pub fn from_secs_f64(secs: f64) -> Self {
        Self((secs * NANOS_PER_SEC as f64).round() as i64)
    }

    /// Raw nanoseconds.
    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    /// Fractional seconds.
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / NANOS_PER_SEC as f64
    }

    /// True for the never-expires sentinel.
    pub const fn is_never(self) -> bool {
        self.0 == i64::MAX
    }

    /// Scales a span by a factor, rounding to the nearest nanosecond.
    ///
    /// `NEVER` is left untouched.
    pub fn mul_f64(self, factor: f64) -> Self {
        if self.is_never() {
            return self;
        }
        Self((self.0 as f64 * factor).round() as i64)
    }

    /// Converts a non-negative span into a std duration. Negative spans clamp to zero.
    pub fn to_duration(self) -> Duration {
        Duration::from_nanos(self.0.max(0) as u64)
    }
}

impl From<Duration> for SimTime {
    fn from(duration: Duration) -> Self {
        Self(i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX))
    }
}

impl Add for SimTime {
    type Output = SimTime;

    fn add(self, rhs: SimTime) -> SimTime {
        if self.is_never() || rhs.is_never() {
            return SimTime::NEVER;
        }
        SimTime(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for SimTime {
    fn add_assign(&mut self, rhs: SimTime) {
        *self = *self + rhs;
    }
}

impl Sub for SimTime {
    type Output = SimTime;

    fn sub(self, rhs: SimTime) -> SimTime {
        if self.is_never() {
            return SimTime::NEVER;
        }
        SimTime(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign for SimTime {
    fn sub_assign(&mut self, rhs: SimTime) {
        *self = *self - rhs;
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_never() {
            write!(f, "never")
        } else {
            write!(f, "{:.3}s", self.as_secs_f64())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_saturates() {
        assert_eq!(SimTime::NEVER + SimTime::from_secs(5), SimTime::NEVER);
        assert_eq!(SimTime::from_secs(5) + SimTime::NEVER, SimTime::NEVER);
        assert_eq!(SimTime::NEVER - SimTime::from_secs(5), SimTime::NEVER);
        assert!(SimTime::NEVER.mul_f64(0.5).is_never());
    }

    #[test]
    fn test_conversions() {
        assert_eq!(SimTime::from_millis(1500), SimTime::from_secs_f64(1.5));
        assert_eq!(SimTime::from(Duration::from_secs(3)), SimTime::from_secs(3));
        assert_eq!(SimTime::from_secs(-2).to_duration(), Duration::ZERO);
        assert_eq!(SimTime::from_secs(10).mul_f64(0.1), SimTime::from_secs(1));
    }

    #[test]
    fn test_ordering_and_display() {
        assert!(SimTime::from_secs(-1) < SimTime::ZERO);
        assert!(SimTime::from_secs(1_000_000) < SimTime::NEVER);
        assert_eq!(SimTime::from_millis(2500).to_string(), "2.500s");
        assert_eq!(SimTime::NEVER.to_string(), "never");
    }
}
