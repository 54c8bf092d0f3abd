//! Instants and half-open time windows.
//!
//! Instants are naive (zone-less) nanoseconds since the Unix epoch, which is
//! how the upstream store records sample times.

use std::fmt;
use std::time::Duration;

use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};

use crate::error::{ExportError, Result};

pub const NANOS_PER_SEC: i64 = 1_000_000_000;
pub const NANOS_PER_DAY: i64 = 86_400 * NANOS_PER_SEC;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    pub fn from_datetime(dt: PrimitiveDateTime) -> Option<Self> {
        i64::try_from(dt.assume_utc().unix_timestamp_nanos())
            .ok()
            .map(Self)
    }

    pub fn from_date(date: Date) -> Option<Self> {
        Self::from_datetime(PrimitiveDateTime::new(date, Time::MIDNIGHT))
    }

    pub fn to_datetime(self) -> PrimitiveDateTime {
        // Every i64 nanosecond value is inside the range `time` supports.
        let dt = OffsetDateTime::from_unix_timestamp_nanos(self.0 as i128)
            .unwrap_or(OffsetDateTime::UNIX_EPOCH);
        PrimitiveDateTime::new(dt.date(), dt.time())
    }

    /// Parses a form-style instant.
    ///
    /// Accepts `YYYY-MM-DD HH:MM:SS[.fff]`, the HTML `datetime-local` shape
    /// `YYYY-MM-DDTHH:MM[:SS]`, and a bare `YYYY-MM-DD` (midnight).
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        let invalid = || ExportError::InvalidTimestamp {
            value: value.to_string(),
        };
        let formats = [
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
            format_description!("[year]-[month]-[day] [hour]:[minute]"),
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
            format_description!("[year]-[month]-[day]T[hour]:[minute]"),
        ];
        if let Some(dt) = formats
            .iter()
            .find_map(|fmt| PrimitiveDateTime::parse(value, *fmt).ok())
        {
            return Self::from_datetime(dt).ok_or_else(invalid);
        }
        let date = Date::parse(value, format_description!("[year]-[month]-[day]"))
            .map_err(|_| invalid())?;
        Self::from_date(date).ok_or_else(invalid)
    }

    /// Midnight of the day containing this instant.
    pub fn floor_day(self) -> Self {
        Self(self.0 - self.0.rem_euclid(NANOS_PER_DAY))
    }

    pub fn saturating_add(self, span: Duration) -> Self {
        let nanos = i64::try_from(span.as_nanos()).unwrap_or(i64::MAX);
        Self(self.0.saturating_add(nanos))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dt = self.to_datetime();
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            dt.year(),
            dt.month() as u8,
            dt.day(),
            dt.hour(),
            dt.minute(),
            dt.second()
        )?;
        let nanos = dt.nanosecond();
        if nanos == 0 {
            Ok(())
        } else if nanos % 1_000 == 0 {
            write!(f, ".{:06}", nanos / 1_000)
        } else {
            write!(f, ".{:09}", nanos)
        }
    }
}

/// Half-open window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: Timestamp,
    end: Timestamp,
}

impl TimeWindow {
    pub fn new(start: Timestamp, end: Timestamp) -> Result<Self> {
        if start >= end {
            return Err(ExportError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Self::new(Timestamp::parse(start)?, Timestamp::parse(end)?)
    }

    /// Whole days `first..=last`, i.e. `[first 00:00, last + 1 day 00:00)`.
    pub fn from_dates(first: Date, last: Date) -> Result<Self> {
        let invalid = |date: Date| ExportError::InvalidTimestamp {
            value: date.to_string(),
        };
        let start = Timestamp::from_date(first).ok_or_else(|| invalid(first))?;
        let after_last = last.next_day().ok_or_else(|| invalid(last))?;
        let end = Timestamp::from_date(after_last).ok_or_else(|| invalid(last))?;
        Self::new(start, end)
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn end(&self) -> Timestamp {
        self.end
    }

    pub fn contains(&self, ts: Timestamp) -> bool {
        ts >= self.start && ts < self.end
    }

    /// True if `[from, until)` shares at least one instant with the window.
    pub fn overlaps(&self, from: Timestamp, until: Timestamp) -> bool {
        from < self.end && until > self.start
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn parses_form_shapes() {
        let a = Timestamp::parse("2024-03-01 12:30:00").unwrap();
        let b = Timestamp::parse("2024-03-01T12:30").unwrap();
        let c = Timestamp::parse("2024-03-01T12:30:00").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);

        let midnight = Timestamp::parse("2024-03-01").unwrap();
        assert_eq!(a.floor_day(), midnight);
        assert_eq!(midnight.to_string(), "2024-03-01 00:00:00");
    }

    #[test]
    fn rejects_garbage() {
        let err = Timestamp::parse("yesterday").unwrap_err();
        assert!(matches!(err, ExportError::InvalidTimestamp { .. }));
        assert!(Timestamp::parse("2024-13-01").is_err());
    }

    #[test]
    fn display_keeps_subseconds_only_when_present() {
        let base = Timestamp::parse("2024-03-01 00:00:01").unwrap();
        assert_eq!(base.to_string(), "2024-03-01 00:00:01");
        let micros = Timestamp::from_nanos(base.as_nanos() + 250_000_000);
        assert_eq!(micros.to_string(), "2024-03-01 00:00:01.250000");
        let nanos = Timestamp::from_nanos(base.as_nanos() + 7);
        assert_eq!(nanos.to_string(), "2024-03-01 00:00:01.000000007");
    }

    #[test]
    fn window_requires_start_before_end() {
        let t = Timestamp::parse("2024-03-01 00:00:00").unwrap();
        assert!(matches!(
            TimeWindow::new(t, t),
            Err(ExportError::InvalidWindow { .. })
        ));
        let later = t.saturating_add(Duration::from_secs(1));
        assert!(TimeWindow::new(later, t).is_err());
        assert!(TimeWindow::new(t, later).is_ok());
    }

    #[test]
    fn window_is_half_open() {
        let window = TimeWindow::parse("2024-03-01 00:00:00", "2024-03-02 00:00:00").unwrap();
        assert!(window.contains(window.start()));
        assert!(!window.contains(window.end()));

        let second = Duration::from_secs(1);
        assert!(!window.overlaps(window.end(), window.end().saturating_add(second)));
        let before = Timestamp::parse("2024-02-29 00:00:00").unwrap();
        assert!(!window.overlaps(before, window.start()));
        assert!(window.overlaps(before, window.start().saturating_add(second)));
    }

    #[test]
    fn whole_day_window_covers_last_day() {
        let window = TimeWindow::from_dates(date!(2024 - 03 - 01), date!(2024 - 03 - 02)).unwrap();
        assert_eq!(window.start().to_string(), "2024-03-01 00:00:00");
        assert_eq!(window.end().to_string(), "2024-03-03 00:00:00");

        let single = TimeWindow::from_dates(date!(2024 - 03 - 01), date!(2024 - 03 - 01)).unwrap();
        assert_eq!(single.end().as_nanos() - single.start().as_nanos(), NANOS_PER_DAY);

        assert!(TimeWindow::from_dates(date!(2024 - 03 - 02), date!(2024 - 03 - 01)).is_err());
    }
}
