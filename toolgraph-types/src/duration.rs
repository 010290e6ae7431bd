//! Stable duration type for telemetry and history records.
//!
//! [`DurationMs`] serializes as a plain integer (milliseconds), not as
//! serde's internal `{"secs": N, "nanos": N}` format, so history records
//! round-trip to JSON in a shape callers can read without pulling in a
//! `Duration` deserializer of their own.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Duration in milliseconds with a stable JSON serialization format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DurationMs(u64);

impl DurationMs {
    /// Zero duration.
    pub const ZERO: Self = Self(0);

    /// Create from milliseconds.
    pub fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// Get the value in milliseconds.
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Convert to `std::time::Duration`.
    pub fn to_std(&self) -> Duration {
        Duration::from_millis(self.0)
    }
}

impl From<Duration> for DurationMs {
    fn from(d: Duration) -> Self {
        Self(d.as_millis() as u64)
    }
}

impl From<DurationMs> for Duration {
    fn from(d: DurationMs) -> Self {
        Duration::from_millis(d.0)
    }
}

impl Default for DurationMs {
    fn default() -> Self {
        Self::ZERO
    }
}

impl std::fmt::Display for DurationMs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

impl std::ops::Add for DurationMs {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_as_plain_integer() {
        let d = DurationMs::from_millis(1500);
        assert_eq!(serde_json::to_string(&d).unwrap(), "1500");
        let back: DurationMs = serde_json::from_str("1500").unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn converts_from_std_duration() {
        let d: DurationMs = Duration::from_millis(42).into();
        assert_eq!(d.as_millis(), 42);
    }

    #[test]
    fn add_saturates() {
        let a = DurationMs::from_millis(u64::MAX - 1);
        let b = DurationMs::from_millis(10);
        assert_eq!((a + b).as_millis(), u64::MAX);
    }
}
