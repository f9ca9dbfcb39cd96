//! Freshness-tagged readings.

use serde::{Deserialize, Serialize};

/// Display sentinel for "no usable reading this tick".
pub const NO_DATA: i64 = -1;

/// Display sentinel for "cached, not newly sampled this tick".
pub const SAME_DATA: i64 = -2;

/// Freshness of a reading, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    Unavailable,
    Unchanged,
    Fresh,
}

/// Result of asking a source for data.
///
/// `Unchanged` always carries the value of the last `Fresh` reading,
/// unmodified. `Unavailable` carries nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reading<T> {
    /// No usable value: the source is dead or the last sample failed.
    Unavailable,
    /// The poll interval has not elapsed; this is the cached value.
    Unchanged(T),
    /// A new sample taken during this call.
    Fresh(T),
}

impl<T> Reading<T> {
    /// Returns the freshness tag.
    pub fn freshness(&self) -> Freshness {
        match self {
            Self::Unavailable => Freshness::Unavailable,
            Self::Unchanged(_) => Freshness::Unchanged,
            Self::Fresh(_) => Freshness::Fresh,
        }
    }

    /// Returns the carried value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Unavailable => None,
            Self::Unchanged(v) | Self::Fresh(v) => Some(v),
        }
    }

    /// Returns true for a newly sampled reading.
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }

    /// Maps the carried value, keeping the freshness tag.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reading<U> {
        match self {
            Self::Unavailable => Reading::Unavailable,
            Self::Unchanged(v) => Reading::Unchanged(f(v)),
            Self::Fresh(v) => Reading::Fresh(f(v)),
        }
    }

    /// Maps the carried value through a fallible projection.
    ///
    /// A projection returning `None` degrades the reading to `Unavailable`.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Option<U>) -> Reading<U> {
        match self {
            Self::Unavailable => Reading::Unavailable,
            Self::Unchanged(v) => f(v).map_or(Reading::Unavailable, Reading::Unchanged),
            Self::Fresh(v) => f(v).map_or(Reading::Unavailable, Reading::Fresh),
        }
    }
}

impl Reading<u64> {
    /// Converts to the sentinel-coded integer consumed by display layers.
    ///
    /// Fresh byte counts above `i64::MAX` saturate so that the result is
    /// never a negative value other than the two sentinels.
    pub fn to_sentinel(&self) -> i64 {
        match self {
            Self::Unavailable => NO_DATA,
            Self::Unchanged(_) => SAME_DATA,
            Self::Fresh(bytes) => i64::try_from(*bytes).unwrap_or(i64::MAX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels() {
        assert_eq!(Reading::<u64>::Unavailable.to_sentinel(), -1);
        assert_eq!(Reading::Unchanged(5u64).to_sentinel(), -2);
        assert_eq!(Reading::Fresh(0u64).to_sentinel(), 0);
        assert_eq!(Reading::Fresh(4096u64).to_sentinel(), 4096);
    }

    #[test]
    fn test_fresh_saturates_instead_of_going_negative() {
        assert_eq!(Reading::Fresh(u64::MAX).to_sentinel(), i64::MAX);
    }

    #[test]
    fn test_map_keeps_freshness() {
        let r = Reading::Unchanged(2u64).map(|v| v * 10);
        assert_eq!(r, Reading::Unchanged(20));
        assert_eq!(r.freshness(), Freshness::Unchanged);
    }

    #[test]
    fn test_and_then_none_degrades() {
        let r: Reading<u64> = Reading::Fresh(1u64).and_then(|_| None);
        assert_eq!(r, Reading::Unavailable);
    }

    #[test]
    fn test_value_accessor() {
        assert_eq!(Reading::Fresh(3u64).value(), Some(&3));
        assert_eq!(Reading::<u64>::Unavailable.value(), None);
        assert!(Reading::Fresh(3u64).is_fresh());
        assert!(!Reading::Unchanged(3u64).is_fresh());
    }
}
