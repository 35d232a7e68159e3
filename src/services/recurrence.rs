//! Recurrence generator.
//!
//! Maps a task definition to the bounded, ordered list of calendar dates it
//! occurs on. Pure and synchronous: no store access, no clock.
//!
//! The horizon is the task's due date when set, otherwise the scheduled date
//! plus a lookahead window. A date equal to the horizon is still produced.

use chrono::{Datelike, Duration, NaiveDate};

use crate::domain::dates::add_months_clamped;
use crate::domain::models::{RecurrenceConfig, RepeatFrequency, ScheduledTask};

/// Hard limit on weekly occurrences, whatever the configuration says.
pub const WEEKLY_HARD_CAP: usize = 52;
/// Hard limit on monthly occurrences, whatever the configuration says.
pub const MONTHLY_HARD_CAP: usize = 24;

/// Expands a task's repeat rule into concrete dates within a bounded horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecurrenceGenerator {
    lookahead_months: u32,
    weekly_cap: usize,
    monthly_cap: usize,
}

impl Default for RecurrenceGenerator {
    fn default() -> Self {
        Self::from_config(&RecurrenceConfig::default())
    }
}

impl RecurrenceGenerator {
    /// Generator with caps clamped to 1 and the hard limits.
    pub fn new(lookahead_months: u32, weekly_cap: usize, monthly_cap: usize) -> Self {
        Self {
            lookahead_months,
            weekly_cap: weekly_cap.clamp(1, WEEKLY_HARD_CAP),
            monthly_cap: monthly_cap.clamp(1, MONTHLY_HARD_CAP),
        }
    }

    /// Generator from the `recurrence` config section.
    pub fn from_config(config: &RecurrenceConfig) -> Self {
        Self::new(config.lookahead_months, config.weekly_cap, config.monthly_cap)
    }

    /// Effective weekly cap.
    pub fn weekly_cap(&self) -> usize {
        self.weekly_cap
    }

    /// Effective monthly cap.
    pub fn monthly_cap(&self) -> usize {
        self.monthly_cap
    }

    /// Last date an occurrence may fall on.
    pub fn horizon(&self, scheduled: NaiveDate, due: Option<NaiveDate>) -> NaiveDate {
        due.unwrap_or_else(|| {
            add_months_clamped(scheduled, self.lookahead_months, scheduled.day()).unwrap_or(NaiveDate::MAX)
        })
    }

    /// Occurrence dates for `task`. Never empty; the first element is always
    /// the task's scheduled date.
    pub fn generate(&self, task: &ScheduledTask) -> Vec<NaiveDate> {
        self.dates_for(task.scheduled_date, task.repeat_frequency, task.due_date)
    }

    /// Occurrence dates for a schedule given as parts.
    pub fn dates_for(
        &self,
        scheduled: NaiveDate,
        frequency: RepeatFrequency,
        due: Option<NaiveDate>,
    ) -> Vec<NaiveDate> {
        match frequency {
            RepeatFrequency::None => vec![scheduled],
            RepeatFrequency::Daily => {
                tracing::debug!(date = %scheduled, "daily repetition is not expanded");
                vec![scheduled]
            }
            RepeatFrequency::Weekly => self.weekly(scheduled, self.horizon(scheduled, due)),
            RepeatFrequency::Monthly => self.monthly(scheduled, self.horizon(scheduled, due)),
        }
    }

    fn weekly(&self, start: NaiveDate, horizon: NaiveDate) -> Vec<NaiveDate> {
        let mut dates = vec![start];
        let mut current = start;
        while dates.len() < self.weekly_cap {
            match current.checked_add_signed(Duration::days(7)) {
                Some(next) if next <= horizon => {
                    dates.push(next);
                    current = next;
                }
                _ => break,
            }
        }
        dates
    }

    fn monthly(&self, start: NaiveDate, horizon: NaiveDate) -> Vec<NaiveDate> {
        // Clamp against the original day every step, never the previous result.
        let anchor_day = start.day();
        let mut dates = vec![start];
        let mut step = 1;
        while dates.len() < self.monthly_cap {
            match add_months_clamped(start, step, anchor_day) {
                Some(next) if next <= horizon => dates.push(next),
                _ => break,
            }
            step += 1;
        }
        dates
    }
}
