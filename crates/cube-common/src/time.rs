//! Time parsing for cube time ranges and resampling periods.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use std::fmt;
use std::str::FromStr;

/// Parse an ISO 8601 date or date-time, assuming UTC when no zone is given.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    let s = s.trim();

    // Full datetime with timezone
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    // Date only
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(ndt) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    Err(TimeParseError::InvalidFormat(s.to_string()))
}

/// Render a timestamp the way cube attributes store it.
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// A time range with optionally open bounds. Both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    /// Parse a `[start?, end?]` pair of ISO 8601 strings.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, TimeParseError> {
        let start = start.map(parse_datetime).transpose()?;
        let end = end.map(parse_datetime).transpose()?;
        let range = Self { start, end };
        if range.is_inverted() {
            return Err(TimeParseError::InvertedRange(
                start.map(|t| format_datetime(&t)).unwrap_or_default(),
                end.map(|t| format_datetime(&t)).unwrap_or_default(),
            ));
        }
        Ok(range)
    }

    pub fn contains(&self, dt: &DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| dt >= &s) && self.end.map_or(true, |e| dt <= &e)
    }

    fn is_inverted(&self) -> bool {
        matches!((self.start, self.end), (Some(s), Some(e)) if s > e)
    }
}

/// Unit of a [`TimePeriod`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodUnit {
    Hour,
    Day,
    Week,
}

impl PeriodUnit {
    fn suffix(&self) -> char {
        match self {
            PeriodUnit::Hour => 'H',
            PeriodUnit::Day => 'D',
            PeriodUnit::Week => 'W',
        }
    }
}

/// A resampling period such as `8D` or `6H`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimePeriod {
    pub count: u32,
    pub unit: PeriodUnit,
}

impl TimePeriod {
    pub fn new(count: u32, unit: PeriodUnit) -> Self {
        Self { count, unit }
    }

    pub fn duration(&self) -> Duration {
        let n = i64::from(self.count);
        match self.unit {
            PeriodUnit::Hour => Duration::hours(n),
            PeriodUnit::Day => Duration::days(n),
            PeriodUnit::Week => Duration::weeks(n),
        }
    }
}

impl FromStr for TimePeriod {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || TimeParseError::InvalidPeriod(s.to_string());

        let split = s.len().checked_sub(1).ok_or_else(invalid)?;
        if !s.is_char_boundary(split) {
            return Err(invalid());
        }
        let (count, unit) = s.split_at(split);

        let unit = match unit.to_ascii_uppercase().as_str() {
            "H" => PeriodUnit::Hour,
            "D" => PeriodUnit::Day,
            "W" => PeriodUnit::Week,
            _ => return Err(invalid()),
        };
        let count: u32 = if count.is_empty() {
            1
        } else {
            count.parse().map_err(|_| invalid())?
        };
        if count == 0 {
            return Err(invalid());
        }
        Ok(Self { count, unit })
    }
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.count, self.unit.suffix())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),

    #[error("Invalid time period: {0}. Expected '<n>H', '<n>D' or '<n>W'")]
    InvalidPeriod(String),

    #[error("Time range start {0} is after end {1}")]
    InvertedRange(String, String),
}
