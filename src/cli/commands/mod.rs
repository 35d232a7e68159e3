//! CLI command implementations.

pub mod calendar;
pub mod daemon;
pub mod sweep;
pub mod task;

use chrono::{NaiveDate, NaiveTime};

use crate::domain::dates::{parse_date, parse_time, CalendarMonth};
use crate::domain::models::{RepeatFrequency, TaskStatus};

pub(crate) fn parse_date_arg(s: &str) -> Result<NaiveDate, String> {
    parse_date(s).map_err(|e| format!("expected YYYY-MM-DD ({e})"))
}

pub(crate) fn parse_time_arg(s: &str) -> Result<NaiveTime, String> {
    parse_time(s).map_err(|e| format!("expected HH:MM ({e})"))
}

pub(crate) fn parse_repeat_arg(s: &str) -> Result<RepeatFrequency, String> {
    RepeatFrequency::from_str(s)
        .ok_or_else(|| format!("unknown repeat '{s}', expected none, daily, weekly or monthly"))
}

pub(crate) fn parse_status_arg(s: &str) -> Result<TaskStatus, String> {
    TaskStatus::from_str(s).ok_or_else(|| format!("unknown status '{s}', expected upcoming, completed or missed"))
}

/// Accepts `YYYY-MM`.
pub(crate) fn parse_month_arg(s: &str) -> Result<CalendarMonth, String> {
    s.parse::<CalendarMonth>()
        .map_err(|_| format!("expected an existing month as YYYY-MM, got '{s}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        assert_eq!(parse_date_arg("2024-02-29").unwrap(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert!(parse_date_arg("2023-02-29").is_err());
        assert_eq!(parse_time_arg("07:30").unwrap(), NaiveTime::from_hms_opt(7, 30, 0).unwrap());
        assert!(parse_time_arg("25:00").is_err());
        assert_eq!(parse_repeat_arg("weekly").unwrap(), RepeatFrequency::Weekly);
        assert!(parse_status_arg("pending").is_err());
    }

    #[test]
    fn test_parse_month() {
        assert_eq!(parse_month_arg("2024-03").unwrap(), CalendarMonth { year: 2024, month: 3 });
        assert!(parse_month_arg("2024-13").is_err());
        assert!(parse_month_arg("march").is_err());
    }
}
