use chrono::NaiveDateTime;
use std::fmt::{Display, Formatter};
use std::ops::{Add, Sub};

/// A point in time, in whole seconds since the unix epoch (UTC).
///
/// This is the only notion of time used on the hot path : the engine never
/// manipulates calendar datetimes, only these unambiguous integers.
#[derive(Debug, Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    seconds: u64,
}

/// A non-negative duration in whole seconds.
#[derive(Debug, Eq, PartialEq, Clone, Copy, Ord, PartialOrd)]
pub struct PositiveDuration {
    pub(crate) seconds: u32,
}

impl Timestamp {
    pub fn from_unix_seconds(seconds: u64) -> Self {
        Self { seconds }
    }

    pub fn unix_seconds(&self) -> u64 {
        self.seconds
    }

    /// Returns `None` when `datetime` is before the unix epoch.
    pub fn from_datetime(datetime: &NaiveDateTime) -> Option<Self> {
        let seconds = datetime.and_utc().timestamp();
        if seconds < 0 {
            None
        } else {
            Some(Self {
                seconds: seconds as u64,
            })
        }
    }

    pub fn to_datetime(&self) -> Option<NaiveDateTime> {
        chrono::DateTime::from_timestamp(self.seconds as i64, 0).map(|dt| dt.naive_utc())
    }

    pub fn duration_since(&self, earlier: &Timestamp) -> Option<PositiveDuration> {
        let diff = self.seconds.checked_sub(earlier.seconds)?;
        u32::try_from(diff)
            .ok()
            .map(|seconds| PositiveDuration { seconds })
    }

    /// |self - other| in seconds.
    pub fn abs_diff(&self, other: &Timestamp) -> u64 {
        self.seconds.abs_diff(other.seconds)
    }

    pub fn checked_sub(&self, duration: PositiveDuration) -> Option<Timestamp> {
        self.seconds
            .checked_sub(u64::from(duration.seconds))
            .map(|seconds| Timestamp { seconds })
    }
}

impl Add<PositiveDuration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: PositiveDuration) -> Timestamp {
        Timestamp {
            seconds: self.seconds + u64::from(rhs.seconds),
        }
    }
}

impl Sub<PositiveDuration> for Timestamp {
    type Output = Timestamp;

    /// Saturates at the epoch.
    fn sub(self, rhs: PositiveDuration) -> Timestamp {
        Timestamp {
            seconds: self.seconds.saturating_sub(u64::from(rhs.seconds)),
        }
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.to_datetime() {
            Some(datetime) => write!(f, "{}", datetime),
            None => write!(f, "{}s", self.seconds),
        }
    }
}

impl PositiveDuration {
    pub fn zero() -> Self {
        Self { seconds: 0 }
    }

    pub const fn from_seconds(seconds: u32) -> Self {
        Self { seconds }
    }

    pub const fn from_hms(hours: u32, minutes: u32, seconds: u32) -> PositiveDuration {
        let total_seconds = seconds + 60 * minutes + 60 * 60 * hours;
        PositiveDuration {
            seconds: total_seconds,
        }
    }

    pub fn total_seconds(&self) -> u64 {
        self.seconds as u64
    }
}

impl Display for PositiveDuration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let hours = self.seconds / (60 * 60);
        let minutes_in_secs = self.seconds % (60 * 60);
        let minutes = minutes_in_secs / 60;
        let seconds = minutes_in_secs % 60;
        if hours != 0 {
            write!(f, "{}h{:02}m{:02}s", hours, minutes, seconds)
        } else if minutes != 0 {
            write!(f, "{}m{:02}s", minutes, seconds)
        } else {
            write!(f, "{}s", seconds)
        }
    }
}

impl Add for PositiveDuration {
    type Output = PositiveDuration;

    fn add(self, rhs: PositiveDuration) -> PositiveDuration {
        PositiveDuration {
            seconds: self.seconds + rhs.seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datetime_round_trip() {
        let datetime =
            NaiveDateTime::parse_from_str("2018-12-04 09:30:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let timestamp = Timestamp::from_datetime(&datetime).unwrap();
        assert_eq!(timestamp.to_datetime(), Some(datetime));
    }

    #[test]
    fn subtraction_saturates_at_epoch() {
        let timestamp = Timestamp::from_unix_seconds(10);
        let result = timestamp - PositiveDuration::from_seconds(30);
        assert_eq!(result.unix_seconds(), 0);
    }
}
