// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::MICROS_PER_MILLI;
use crate::errors::TaskError;
use std::fmt;

/// Packet timestamp in the graph engine's unit (microseconds).
///
/// The extreme ends of the `i64` range are reserved for sentinel values, mirroring
/// how dataflow engines mark packets that live outside of a stream's regular range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    /// A packet that has never been stamped.
    pub const UNSET: Timestamp = Timestamp(i64::MIN);
    pub const UNSTARTED: Timestamp = Timestamp(i64::MIN + 1);
    /// Marks data available before any stream packet, e.g. headers.
    pub const PRE_STREAM: Timestamp = Timestamp(i64::MIN + 2);
    /// Smallest timestamp a stream packet may carry.
    pub const MIN: Timestamp = Timestamp(i64::MIN + 3);
    /// Largest timestamp a stream packet may carry.
    pub const MAX: Timestamp = Timestamp(i64::MAX - 2);
    pub const POST_STREAM: Timestamp = Timestamp(i64::MAX - 1);
    pub const DONE: Timestamp = Timestamp(i64::MAX);

    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// Convert a caller-facing millisecond value into engine microseconds.
    ///
    /// The conversion is exact; values whose product overflows are rejected instead
    /// of saturating so that monotonicity checks agree in both units.
    pub fn from_millis(millis: i64) -> Result<Self, TaskError> {
        millis
            .checked_mul(MICROS_PER_MILLI)
            .map(Self)
            .ok_or_else(|| {
                TaskError::invalid_argument(format!(
                    "timestamp {millis} ms cannot be represented in microseconds"
                ))
            })
    }

    pub const fn micros(self) -> i64 {
        self.0
    }

    /// Milliseconds, truncated toward zero.
    pub const fn millis(self) -> i64 {
        self.0 / MICROS_PER_MILLI
    }

    pub fn is_set(self) -> bool {
        self != Self::UNSET
    }

    /// Whether a packet with this timestamp may be sent into a stream.
    pub fn is_allowed_in_stream(self) -> bool {
        (Self::MIN..=Self::MAX).contains(&self)
    }

    /// Next timestamp, saturating at `MAX`.
    pub fn next_allowed(self) -> Self {
        if self >= Self::MAX {
            Self::MAX
        } else {
            Self(self.0 + 1)
        }
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::UNSET
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::UNSET => write!(f, "Timestamp::Unset"),
            Self::UNSTARTED => write!(f, "Timestamp::Unstarted"),
            Self::PRE_STREAM => write!(f, "Timestamp::PreStream"),
            Self::MIN => write!(f, "Timestamp::Min"),
            Self::MAX => write!(f, "Timestamp::Max"),
            Self::POST_STREAM => write!(f, "Timestamp::PostStream"),
            Self::DONE => write!(f, "Timestamp::Done"),
            Self(micros) => write!(f, "{micros}us"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_conversion_is_exact() {
        let ts = Timestamp::from_millis(33).unwrap();
        assert_eq!(ts.micros(), 33_000);
        assert_eq!(ts.millis(), 33);

        let negative = Timestamp::from_millis(-5).unwrap();
        assert_eq!(negative.micros(), -5_000);
    }

    #[test]
    fn test_millis_conversion_rejects_overflow() {
        let err = Timestamp::from_millis(i64::MAX / 10).unwrap_err();
        assert!(matches!(err, TaskError::InvalidArgument(_)));
    }

    #[test]
    fn test_sentinel_ordering() {
        assert!(Timestamp::UNSET < Timestamp::PRE_STREAM);
        assert!(Timestamp::PRE_STREAM < Timestamp::MIN);
        assert!(Timestamp::MAX < Timestamp::POST_STREAM);
        assert!(!Timestamp::PRE_STREAM.is_allowed_in_stream());
        assert!(Timestamp::from_micros(0).is_allowed_in_stream());
        assert!(!Timestamp::default().is_set());
    }

    #[test]
    fn test_display() {
        assert_eq!(Timestamp::from_micros(1500).to_string(), "1500us");
        assert_eq!(Timestamp::PRE_STREAM.to_string(), "Timestamp::PreStream");
    }
}
