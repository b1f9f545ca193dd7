//! Temporal data types and time handling

use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Naive layouts accepted by [`Timestamp::parse`]; all are read as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Timestamp representing a UTC instant with nanosecond precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    /// Nanoseconds since Unix epoch
    nanos: i64,
}

impl Timestamp {
    /// Create a timestamp from nanoseconds since Unix epoch
    pub fn from_nanos(nanos: i64) -> Self {
        Self { nanos }
    }

    /// Create a timestamp from milliseconds since Unix epoch, clamped to the
    /// representable range
    pub fn from_millis(millis: i64) -> Self {
        Self {
            nanos: millis.saturating_mul(1_000_000),
        }
    }

    /// Create a timestamp from seconds since Unix epoch, clamped to the
    /// representable range
    pub fn from_secs(secs: i64) -> Self {
        Self {
            nanos: secs.saturating_mul(1_000_000_000),
        }
    }

    /// Like [`Timestamp::from_millis`], failing outside the representable range
    pub fn try_from_millis(millis: i64) -> Result<Self> {
        millis
            .checked_mul(1_000_000)
            .map(Self::from_nanos)
            .ok_or_else(|| Error::Temporal(format!("timestamp out of range: {millis} ms")))
    }

    /// Like [`Timestamp::from_secs`], failing outside the representable range
    pub fn try_from_secs(secs: i64) -> Result<Self> {
        secs.checked_mul(1_000_000_000)
            .map(Self::from_nanos)
            .ok_or_else(|| Error::Temporal(format!("timestamp out of range: {secs} s")))
    }

    /// Get current timestamp
    pub fn now() -> Self {
        let now = Utc::now();
        Self {
            nanos: now.timestamp_nanos_opt().unwrap_or(i64::MAX),
        }
    }

    /// Convert a chrono instant, failing outside the representable range
    /// (roughly years 1677 to 2262).
    pub fn from_datetime<Tz>(dt: &DateTime<Tz>) -> Result<Self>
    where
        Tz: chrono::TimeZone,
        Tz::Offset: fmt::Display,
    {
        dt.timestamp_nanos_opt()
            .map(Self::from_nanos)
            .ok_or_else(|| Error::Temporal(format!("timestamp out of range: {}", dt.to_rfc3339())))
    }

    /// Parse a textual timestamp and normalize it to UTC.
    ///
    /// Accepts RFC 3339 with an offset, `YYYY-MM-DD HH:MM:SS[.f]` and its
    /// `T`-separated form (read as UTC), and a bare `YYYY-MM-DD` (UTC midnight).
    pub fn parse(input: &str) -> Result<Self> {
        let s = input.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Self::from_datetime(&dt);
        }
        if let Ok(dt) = DateTime::<FixedOffset>::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
            return Self::from_datetime(&dt);
        }
        for format in NAIVE_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                return Self::from_datetime(&naive.and_utc());
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                return Self::from_datetime(&naive.and_utc());
            }
        }

        Err(Error::Temporal(format!("unparseable timestamp: {input:?}")))
    }

    /// Get nanoseconds since Unix epoch
    pub fn as_nanos(&self) -> i64 {
        self.nanos
    }

    /// Get seconds since Unix epoch
    pub fn as_secs(&self) -> i64 {
        self.nanos.div_euclid(1_000_000_000)
    }

    /// Convert to chrono DateTime
    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.nanos)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_datetime().to_rfc3339())
    }
}

impl FromStr for Timestamp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Any caller-side representation of an instant, resolved to a [`Timestamp`]
/// at the engine boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeInput {
    /// Already-normalized instant
    Instant(Timestamp),
    /// Timezone-aware chrono instant
    DateTime(DateTime<FixedOffset>),
    /// Text to be parsed with [`Timestamp::parse`]
    Text(String),
}

impl TimeInput {
    /// Resolve to a UTC timestamp
    pub fn resolve(&self) -> Result<Timestamp> {
        match self {
            Self::Instant(ts) => Ok(*ts),
            Self::DateTime(dt) => Timestamp::from_datetime(dt),
            Self::Text(s) => Timestamp::parse(s),
        }
    }
}

impl From<Timestamp> for TimeInput {
    fn from(ts: Timestamp) -> Self {
        Self::Instant(ts)
    }
}

impl From<DateTime<Utc>> for TimeInput {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt.fixed_offset())
    }
}

impl From<DateTime<FixedOffset>> for TimeInput {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Self::DateTime(dt)
    }
}

impl From<&str> for TimeInput {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for TimeInput {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Validity interval `[from, to)`; `to == None` means open ("still valid")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub from: Timestamp,
    pub to: Option<Timestamp>,
}

impl Interval {
    /// Interval with an explicit upper bound
    pub fn closed(from: Timestamp, to: Timestamp) -> Self {
        Self { from, to: Some(to) }
    }

    /// Open-ended interval starting at `from`
    pub fn open(from: Timestamp) -> Self {
        Self { from, to: None }
    }

    /// Whether the interval has no upper bound
    pub fn is_open(&self) -> bool {
        self.to.is_none()
    }

    /// Check if a timestamp is within this interval
    pub fn contains(&self, ts: Timestamp) -> bool {
        self.from <= ts && self.to.map(|end| end > ts).unwrap_or(true)
    }

    /// Half-open intersection test, open bounds treated as +infinity
    pub fn overlaps(&self, other: &Interval) -> bool {
        let starts_before_other_ends = other.to.map(|end| self.from < end).unwrap_or(true);
        let ends_after_other_starts = self.to.map(|end| end > other.from).unwrap_or(true);
        starts_before_other_ends && ends_after_other_starts
    }

    /// `from < to` whenever `to` is set
    pub fn is_well_formed(&self) -> bool {
        self.to.map(|end| self.from < end).unwrap_or(true)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to {
            Some(end) => write!(f, "[{}, {})", self.from, end),
            None => write!(f, "[{}, open)", self.from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_creation() {
        let ts = Timestamp::now();
        assert!(ts.as_nanos() > 0);

        let ts2 = Timestamp::from_secs(1000);
        assert_eq!(ts2.as_secs(), 1000);
        assert_eq!(Timestamp::from_millis(1_000_000), ts2);
    }

    #[test]
    fn test_unit_constructors_respect_range() {
        assert_eq!(Timestamp::try_from_secs(1000).unwrap(), Timestamp::from_secs(1000));
        assert_eq!(Timestamp::try_from_millis(-5).unwrap().as_nanos(), -5_000_000);
        assert!(matches!(Timestamp::try_from_secs(i64::MAX), Err(Error::Temporal(_))));
        assert!(matches!(Timestamp::try_from_millis(i64::MIN), Err(Error::Temporal(_))));

        assert_eq!(Timestamp::from_secs(i64::MAX).as_nanos(), i64::MAX);
        assert_eq!(Timestamp::from_millis(i64::MIN).as_nanos(), i64::MIN);
    }

    #[test]
    fn test_parse_normalizes_to_utc() {
        let date_only = Timestamp::parse("2024-01-01").unwrap();
        let naive = Timestamp::parse("2024-01-01 00:00:00").unwrap();
        let iso = Timestamp::parse("2024-01-01T00:00:00Z").unwrap();
        let offset = Timestamp::parse("2024-01-01T02:00:00+02:00").unwrap();

        assert_eq!(date_only, naive);
        assert_eq!(date_only, iso);
        assert_eq!(date_only, offset);
        assert_eq!(date_only.as_secs(), 1_704_067_200);
    }

    #[test]
    fn test_parse_fractional_seconds() {
        let ts = Timestamp::parse("2024-01-01T00:00:00.5").unwrap();
        assert_eq!(ts.as_nanos(), 1_704_067_200_500_000_000);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(Timestamp::parse("yesterday"), Err(Error::Temporal(_))));
        assert!(matches!(Timestamp::parse("2024-13-01"), Err(Error::Temporal(_))));
    }

    #[test]
    fn test_display_round_trips() {
        let ts = Timestamp::parse("2024-03-01T12:30:00Z").unwrap();
        assert_eq!(ts.to_string().parse::<Timestamp>().unwrap(), ts);
    }

    #[test]
    fn test_time_input_resolution() {
        let expected = Timestamp::parse("2024-01-01").unwrap();
        let from_chrono: TimeInput = expected.to_datetime().into();
        assert_eq!(from_chrono.resolve().unwrap(), expected);
        assert_eq!(TimeInput::from("2024-01-01").resolve().unwrap(), expected);
        assert!(TimeInput::from("not a date").resolve().is_err());
    }

    #[test]
    fn test_interval_contains() {
        let start = Timestamp::from_secs(1000);
        let end = Timestamp::from_secs(2000);
        let interval = Interval::closed(start, end);

        assert!(interval.contains(start));
        assert!(interval.contains(Timestamp::from_secs(1500)));
        assert!(!interval.contains(end));
        assert!(!interval.contains(Timestamp::from_secs(500)));

        let open = Interval::open(start);
        assert!(open.contains(Timestamp::from_secs(10_000)));
    }

    #[test]
    fn test_interval_overlap_is_half_open() {
        let a = Interval::closed(Timestamp::from_secs(0), Timestamp::from_secs(10));
        let adjacent = Interval::open(Timestamp::from_secs(10));
        let inside = Interval::open(Timestamp::from_secs(5));
        let before = Interval::closed(Timestamp::from_secs(-5), Timestamp::from_secs(0));

        assert!(!a.overlaps(&adjacent));
        assert!(!adjacent.overlaps(&a));
        assert!(a.overlaps(&inside));
        assert!(inside.overlaps(&a));
        assert!(!a.overlaps(&before));
        assert!(Interval::open(Timestamp::from_secs(0)).overlaps(&adjacent));
    }

    #[test]
    fn test_interval_well_formed() {
        let t = Timestamp::from_secs(1);
        assert!(Interval::open(t).is_well_formed());
        assert!(!Interval::closed(t, t).is_well_formed());
        assert!(Interval::closed(t, Timestamp::from_secs(2)).is_well_formed());
    }
}
