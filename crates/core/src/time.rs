use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TimeError {
    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("invalid calendar day (expected YYYY-MM-DD): {0}")]
    InvalidCalendarDay(String),
}

/// A simple clock abstraction for deterministic time in services and tests.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock that uses the current system time.
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// If this is a fixed clock, advance it by the given duration.
    ///
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }

    /// The calendar day "now" falls on in the given IANA timezone (UTC when `None`).
    ///
    /// # Errors
    ///
    /// Returns `TimeError::UnknownTimezone` if the identifier is not a known zone.
    pub fn today_in(&self, timezone: Option<&str>) -> Result<CalendarDay, TimeError> {
        CalendarDay::today_in(timezone, self.now())
    }
}

//
// ─── CALENDAR DAY ──────────────────────────────────────────────────────────────
//

/// A whole calendar day, written and compared as `YYYY-MM-DD`.
///
/// Day-level logic (challenge dates, streaks, history cut-offs) works on this
/// type rather than on instants, so a daylight-saving shift can never move a
/// challenge onto another day.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CalendarDay(NaiveDate);

impl CalendarDay {
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    #[must_use]
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.0
    }

    #[must_use]
    pub fn weekday(&self) -> Weekday {
        self.0.weekday()
    }

    #[must_use]
    pub fn is_weekend(&self) -> bool {
        matches!(self.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// The day before, or `None` at the bottom of the representable range.
    #[must_use]
    pub fn previous(&self) -> Option<Self> {
        self.0.pred_opt().map(Self)
    }

    #[must_use]
    pub fn next(&self) -> Option<Self> {
        self.0.succ_opt().map(Self)
    }

    #[must_use]
    pub fn days_back(&self, days: u32) -> Option<Self> {
        self.0.checked_sub_days(Days::new(u64::from(days))).map(Self)
    }

    /// Whole days from `earlier` to `self` (negative when `earlier` is later).
    #[must_use]
    pub fn days_since(&self, earlier: CalendarDay) -> i64 {
        (self.0 - earlier.0).num_days()
    }

    /// Resolves the calendar day of `now` in an IANA timezone.
    ///
    /// A missing or blank identifier falls back to UTC.
    ///
    /// # Errors
    ///
    /// Returns `TimeError::UnknownTimezone` if the identifier is not a known zone.
    pub fn today_in(timezone: Option<&str>, now: DateTime<Utc>) -> Result<Self, TimeError> {
        match timezone.map(str::trim).filter(|tz| !tz.is_empty()) {
            None => Ok(Self(now.date_naive())),
            Some(name) => {
                let tz: Tz = name
                    .parse()
                    .map_err(|_| TimeError::UnknownTimezone(name.to_owned()))?;
                Ok(Self(now.with_timezone(&tz).date_naive()))
            }
        }
    }
}

impl fmt::Display for CalendarDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl fmt::Debug for CalendarDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CalendarDay({self})")
    }
}

impl FromStr for CalendarDay {
    type Err = TimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        let shaped = bytes.len() == 10
            && bytes[4] == b'-'
            && bytes[7] == b'-'
            && bytes
                .iter()
                .enumerate()
                .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
        if !shaped {
            return Err(TimeError::InvalidCalendarDay(s.to_owned()));
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Self)
            .map_err(|_| TimeError::InvalidCalendarDay(s.to_owned()))
    }
}

impl Serialize for CalendarDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CalendarDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

//
// ─── TEST HELPERS ──────────────────────────────────────────────────────────────
//

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

/// Parses a `YYYY-MM-DD` literal in tests.
///
/// # Panics
///
/// Panics if the literal is not a valid calendar day.
#[must_use]
pub fn day(raw: &str) -> CalendarDay {
    raw.parse().expect("valid calendar day literal")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calendar_day_round_trips_through_display() {
        let d = day("2024-01-09");
        assert_eq!(d.to_string(), "2024-01-09");
        assert_eq!(d.previous().unwrap().to_string(), "2024-01-08");
        assert_eq!(d.next().unwrap().to_string(), "2024-01-10");
    }

    #[test]
    fn calendar_day_rejects_loose_formats() {
        assert!("2024-1-09".parse::<CalendarDay>().is_err());
        assert!("2024/01/09".parse::<CalendarDay>().is_err());
        assert!("2024-02-30".parse::<CalendarDay>().is_err());
        assert!("2024-01-09T00:00".parse::<CalendarDay>().is_err());
    }

    #[test]
    fn ordering_matches_string_ordering() {
        let a = day("2023-12-31");
        let b = day("2024-01-01");
        assert!(a < b);
        assert!(a.to_string() < b.to_string());
    }

    #[test]
    fn arithmetic_crosses_month_and_leap_boundaries() {
        assert_eq!(day("2024-03-01").previous().unwrap(), day("2024-02-29"));
        assert_eq!(day("2024-01-01").days_back(1).unwrap(), day("2023-12-31"));
        assert_eq!(day("2024-03-10").days_since(day("2024-03-01")), 9);
    }

    #[test]
    fn dst_transition_does_not_skip_a_day() {
        // US spring-forward happened on 2024-03-10.
        assert_eq!(day("2024-03-11").previous().unwrap(), day("2024-03-10"));
        assert_eq!(day("2024-03-11").days_since(day("2024-03-09")), 2);
    }

    #[test]
    fn today_falls_back_to_utc() {
        // 2023-11-14T22:13:20Z
        let now = fixed_now();
        assert_eq!(CalendarDay::today_in(None, now).unwrap(), day("2023-11-14"));
        assert_eq!(CalendarDay::today_in(Some("  "), now).unwrap(), day("2023-11-14"));
    }

    #[test]
    fn today_respects_timezone() {
        let now = fixed_now();
        assert_eq!(
            CalendarDay::today_in(Some("Asia/Tokyo"), now).unwrap(),
            day("2023-11-15")
        );
        assert_eq!(
            CalendarDay::today_in(Some("America/New_York"), now).unwrap(),
            day("2023-11-14")
        );
    }

    #[test]
    fn today_rejects_unknown_timezone() {
        let err = CalendarDay::today_in(Some("Mars/Olympus"), fixed_now()).unwrap_err();
        assert_eq!(err, TimeError::UnknownTimezone("Mars/Olympus".into()));
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&day("2024-01-10")).unwrap();
        assert_eq!(json, "\"2024-01-10\"");
        let back: CalendarDay = serde_json::from_str(&json).unwrap();
        assert_eq!(back, day("2024-01-10"));
    }

    #[test]
    fn fixed_clock_advances() {
        let mut clock = fixed_clock();
        clock.advance(Duration::days(1));
        assert_eq!(clock.today_in(None).unwrap(), day("2023-11-15"));
    }
}
