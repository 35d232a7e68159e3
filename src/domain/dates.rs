//! Calendar-date helpers shared by the recurrence generator, the calendar
//! aggregator and the persistence adapters.
//!
//! The engine works in calendar dates, not instants. Everything here is
//! expressed with `chrono`'s naive types.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Months, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Wire format for calendar dates (`YYYY-MM-DD`).
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Wire format for times of day (`HH:MM`).
pub const TIME_FORMAT: &str = "%H:%M";

/// Number of days in the given month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let first = NaiveDate::from_ymd_opt(year, month, 1);
    let next = first.and_then(|d| d.checked_add_months(Months::new(1)));
    match (first, next) {
        (Some(first), Some(next)) => (next - first).num_days() as u32,
        _ => 31,
    }
}

/// Move `date` forward by `months`, placing the result on `day_of_month`
/// clamped to the last day of the target month.
///
/// `day_of_month` is passed separately so callers can keep clamping against an
/// original anchor day rather than a previously clamped one.
pub fn add_months_clamped(date: NaiveDate, months: u32, day_of_month: u32) -> Option<NaiveDate> {
    let first = date.with_day(1)?.checked_add_months(Months::new(months))?;
    let day = day_of_month.min(days_in_month(first.year(), first.month()));
    first.with_day(day)
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
}

/// Parse an `HH:MM` time of day.
pub fn parse_time(s: &str) -> Result<NaiveTime, chrono::ParseError> {
    NaiveTime::parse_from_str(s.trim(), TIME_FORMAT)
}

/// Format as `YYYY-MM-DD`.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Format as `HH:MM`.
pub fn format_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// Serde adapter for `Option<NaiveTime>` in `HH:MM` form.
pub mod hh_mm_opt {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Write `Some` as an `HH:MM` string.
    pub fn serialize<S: Serializer>(value: &Option<NaiveTime>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(t) => s.serialize_some(&super::format_time(*t)),
            None => s.serialize_none(),
        }
    }

    /// Read an optional `HH:MM` string.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        raw.map(|s| super::parse_time(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// Error returned when a `YYYY-MM` month string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid month '{0}': expected YYYY-MM")]
pub struct InvalidMonth(pub String);

/// A visible calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CalendarMonth {
    /// Calendar year
    pub year: i32,
    /// Month number, 1 to 12
    pub month: u32,
}

impl CalendarMonth {
    /// `None` when `month` is out of range.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { year, month })
    }

    /// Month containing `date`.
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// First day of the month.
    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Last day of the month, leap years included.
    pub fn last_day(&self) -> NaiveDate {
        let last = days_in_month(self.year, self.month);
        NaiveDate::from_ymd_opt(self.year, self.month, last).unwrap_or(NaiveDate::MAX)
    }

    /// Whether `date` falls in this month.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// Every date in the month, in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let last = self.last_day();
        self.first_day().iter_days().take_while(move |d| *d <= last)
    }

    /// The following month.
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    /// The preceding month.
    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self { year: self.year - 1, month: 12 }
        } else {
            Self { year: self.year, month: self.month - 1 }
        }
    }
}

impl fmt::Display for CalendarMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for CalendarMonth {
    type Err = InvalidMonth;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| InvalidMonth(s.to_string()))?;
        let year: i32 = year.parse().map_err(|_| InvalidMonth(s.to_string()))?;
        let month: u32 = month.parse().map_err(|_| InvalidMonth(s.to_string()))?;
        Self::new(year, month).ok_or_else(|| InvalidMonth(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(2024, 4), 30);
        assert_eq!(days_in_month(2024, 12), 31);
    }

    #[test]
    fn test_add_months_clamped_uses_anchor_day() {
        let start = d("2024-01-31");
        assert_eq!(add_months_clamped(start, 1, 31), Some(d("2024-02-29")));
        // Clamped February date still lands on the 31st when anchored to 31.
        assert_eq!(add_months_clamped(d("2024-02-29"), 1, 31), Some(d("2024-03-31")));
        assert_eq!(add_months_clamped(start, 3, 31), Some(d("2024-04-30")));
        assert_eq!(add_months_clamped(d("2024-11-15"), 2, 15), Some(d("2025-01-15")));
    }

    #[test]
    fn test_calendar_month_parse_and_navigation() {
        let month: CalendarMonth = "2024-12".parse().unwrap();
        assert_eq!(month.next(), CalendarMonth { year: 2025, month: 1 });
        assert_eq!(month.previous().to_string(), "2024-11");
        assert_eq!(month.days().count(), 31);
        assert!("2024-13".parse::<CalendarMonth>().is_err());
        assert!("garbage".parse::<CalendarMonth>().is_err());
    }

    #[test]
    fn test_time_round_trip_format() {
        let t = parse_time("09:05").unwrap();
        assert_eq!(format_time(t), "09:05");
        assert!(parse_time("25:00").is_err());
    }
}
