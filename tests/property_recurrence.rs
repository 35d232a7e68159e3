use almanac::domain::dates::days_in_month;
use almanac::domain::models::RepeatFrequency;
use almanac::services::{RecurrenceGenerator, MONTHLY_HARD_CAP, WEEKLY_HARD_CAP};
use chrono::{Datelike, Duration, NaiveDate};
use proptest::prelude::*;

fn any_date() -> impl Strategy<Value = NaiveDate> {
    (1990i32..2100, 1u32..=12, 1u32..=31).prop_map(|(y, m, day)| {
        let day = day.min(days_in_month(y, m));
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    })
}

fn any_frequency() -> impl Strategy<Value = RepeatFrequency> {
    prop_oneof![
        Just(RepeatFrequency::None),
        Just(RepeatFrequency::Daily),
        Just(RepeatFrequency::Weekly),
        Just(RepeatFrequency::Monthly),
    ]
}

/// Due date anywhere from a few days to a few years after the start, or none.
fn any_due(start: NaiveDate) -> impl Strategy<Value = Option<NaiveDate>> {
    prop::option::of((0i64..2000).prop_map(move |days| start + Duration::days(days)))
}

fn any_generator() -> impl Strategy<Value = RecurrenceGenerator> {
    (0u32..60, 0usize..100, 0usize..100).prop_map(|(lookahead, weekly, monthly)| RecurrenceGenerator::new(lookahead, weekly, monthly))
}

proptest! {
    /// Property: output is never empty and always starts at the scheduled date
    #[test]
    fn prop_starts_at_scheduled_date(
        generator in any_generator(),
        (start, due) in any_date().prop_flat_map(|s| (Just(s), any_due(s))),
        frequency in any_frequency(),
    ) {
        let dates = generator.dates_for(start, frequency, due);
        prop_assert!(!dates.is_empty());
        prop_assert_eq!(dates[0], start);
    }

    /// Property: hard caps hold for any configuration
    #[test]
    fn prop_caps_are_never_exceeded(
        generator in any_generator(),
        (start, due) in any_date().prop_flat_map(|s| (Just(s), any_due(s))),
    ) {
        prop_assert!(generator.dates_for(start, RepeatFrequency::Weekly, due).len() <= WEEKLY_HARD_CAP);
        prop_assert!(generator.dates_for(start, RepeatFrequency::Monthly, due).len() <= MONTHLY_HARD_CAP);
        prop_assert!(generator.dates_for(start, RepeatFrequency::Weekly, due).len() <= generator.weekly_cap());
        prop_assert!(generator.dates_for(start, RepeatFrequency::Monthly, due).len() <= generator.monthly_cap());
    }

    /// Property: dates strictly increase and stay within the horizon
    #[test]
    fn prop_dates_increase_within_horizon(
        generator in any_generator(),
        (start, due) in any_date().prop_flat_map(|s| (Just(s), any_due(s))),
        frequency in prop_oneof![Just(RepeatFrequency::Weekly), Just(RepeatFrequency::Monthly)],
    ) {
        let dates = generator.dates_for(start, frequency, due);
        let horizon = generator.horizon(start, due);

        for pair in dates.windows(2) {
            prop_assert!(pair[0] < pair[1]);
        }
        for date in dates.iter().skip(1) {
            prop_assert!(*date <= horizon);
        }
    }

    /// Property: weekly dates are exactly seven days apart
    #[test]
    fn prop_weekly_step_is_seven_days(
        generator in any_generator(),
        (start, due) in any_date().prop_flat_map(|s| (Just(s), any_due(s))),
    ) {
        let dates = generator.dates_for(start, RepeatFrequency::Weekly, due);
        for pair in dates.windows(2) {
            prop_assert_eq!(pair[1] - pair[0], Duration::days(7));
        }
    }

    /// Property: monthly dates keep the original day unless the month is too short
    #[test]
    fn prop_monthly_clamps_to_original_day(
        generator in any_generator(),
        (start, due) in any_date().prop_flat_map(|s| (Just(s), any_due(s))),
    ) {
        let anchor = start.day();
        for date in generator.dates_for(start, RepeatFrequency::Monthly, due) {
            let expected = anchor.min(days_in_month(date.year(), date.month()));
            prop_assert_eq!(date.day(), expected);
        }
    }

    /// Property: non-repeating and daily tasks occur exactly once
    #[test]
    fn prop_single_occurrence_without_expansion(
        generator in any_generator(),
        start in any_date(),
        frequency in prop_oneof![Just(RepeatFrequency::None), Just(RepeatFrequency::Daily)],
    ) {
        prop_assert_eq!(generator.dates_for(start, frequency, None), vec![start]);
    }
}

#[test]
fn test_monthly_from_month_end_in_leap_year() {
    let generator = RecurrenceGenerator::default();
    let start = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
    let dates: Vec<String> = generator
        .dates_for(start, RepeatFrequency::Monthly, None)
        .iter()
        .map(|d| d.to_string())
        .collect();
    assert_eq!(dates, vec!["2024-01-31", "2024-02-29", "2024-03-31", "2024-04-30"]);
}
