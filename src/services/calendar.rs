//! Calendar aggregation.
//!
//! `CalendarIndex` groups every task into a date -> occurrences map in one
//! pass, expanding repeating tasks through the recurrence generator. The index
//! is rebuilt from scratch for every snapshot and never patched in place.
//!
//! Direct occurrences and due dates are counted in separate buckets. A task
//! that occurs and is due on the same date shows up in both.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::dates::CalendarMonth;
use crate::domain::models::{Occurrence, ScheduledTask, TaskStatus};
use crate::services::recurrence::RecurrenceGenerator;

/// Status counts among the direct occurrences of a date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusBreakdown {
    /// Still upcoming
    pub upcoming: usize,
    /// Completed
    pub completed: usize,
    /// Missed
    pub missed: usize,
}

impl StatusBreakdown {
    /// Count one more task in `status`.
    pub fn record(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Upcoming => self.upcoming += 1,
            TaskStatus::Completed => self.completed += 1,
            TaskStatus::Missed => self.missed += 1,
        }
    }

    /// All statuses together.
    pub fn total(&self) -> usize {
        self.upcoming + self.completed + self.missed
    }

    fn merge(&mut self, other: &Self) {
        self.upcoming += other.upcoming;
        self.completed += other.completed;
        self.missed += other.missed;
    }
}

/// Aggregated counts for one calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DaySummary {
    /// The date summarized
    pub date: NaiveDate,
    /// Occurrences on this date, generated repeats included
    pub direct_count: usize,
    /// Stored tasks due on this date
    pub due_count: usize,
    /// Statuses of the direct occurrences
    pub statuses: StatusBreakdown,
}

impl DaySummary {
    /// Summary with nothing on `date`.
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            direct_count: 0,
            due_count: 0,
            statuses: StatusBreakdown::default(),
        }
    }

    /// Sum of both buckets, not deduplicated.
    pub fn total(&self) -> usize {
        self.direct_count + self.due_count
    }

    /// Whether nothing happens or falls due on this date.
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Per-day summaries for a whole month plus month totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthView {
    /// Month shown
    pub month: CalendarMonth,
    /// One summary per day, first to last
    pub days: Vec<DaySummary>,
    /// Direct occurrences across the month
    pub total_direct: usize,
    /// Due tasks across the month
    pub total_due: usize,
    /// Statuses across the month
    pub statuses: StatusBreakdown,
}

impl MonthView {
    /// Summary for `date`, if it is in this month.
    pub fn day(&self, date: NaiveDate) -> Option<&DaySummary> {
        self.days.iter().find(|d| d.date == date)
    }

    /// Days with at least one occurrence or due task.
    pub fn busy_days(&self) -> impl Iterator<Item = &DaySummary> {
        self.days.iter().filter(|d| !d.is_empty())
    }
}

/// Date-keyed index of occurrences and due dates, built once per task list.
#[derive(Debug, Clone, Default)]
pub struct CalendarIndex {
    occurrences: BTreeMap<NaiveDate, Vec<Occurrence>>,
    due: BTreeMap<NaiveDate, Vec<Arc<ScheduledTask>>>,
}

impl CalendarIndex {
    /// Expand every task through `generator` and group the results by date.
    pub fn build<'a>(tasks: impl IntoIterator<Item = &'a ScheduledTask>, generator: &RecurrenceGenerator) -> Self {
        let mut index = Self::default();

        for task in tasks {
            let task = Arc::new(task.clone());

            for date in generator.generate(&task) {
                let occurrence = if date == task.scheduled_date {
                    Occurrence::persisted(Arc::clone(&task))
                } else {
                    Occurrence::virtual_on(Arc::clone(&task), date)
                };
                index.occurrences.entry(date).or_default().push(occurrence);
            }

            if let Some(due) = task.due_date {
                index.due.entry(due).or_default().push(task);
            }
        }

        index
    }

    /// Occurrences on `date`, persisted first then generated, in task order.
    pub fn occurrences_on(&self, date: NaiveDate) -> &[Occurrence] {
        self.occurrences.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Stored tasks whose due date is `date`.
    pub fn due_on(&self, date: NaiveDate) -> &[Arc<ScheduledTask>] {
        self.due.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Counts for `date`. Dates with nothing on them get zeros.
    pub fn day_summary(&self, date: NaiveDate) -> DaySummary {
        let occurrences = self.occurrences_on(date);
        let mut statuses = StatusBreakdown::default();
        for occurrence in occurrences {
            statuses.record(occurrence.status());
        }

        DaySummary {
            date,
            direct_count: occurrences.len(),
            due_count: self.due_on(date).len(),
            statuses,
        }
    }

    /// Summaries for every day of `month`.
    pub fn month_view(&self, month: CalendarMonth) -> MonthView {
        let days: Vec<DaySummary> = month.days().map(|d| self.day_summary(d)).collect();

        let mut statuses = StatusBreakdown::default();
        for day in &days {
            statuses.merge(&day.statuses);
        }

        MonthView {
            month,
            total_direct: days.iter().map(|d| d.direct_count).sum(),
            total_due: days.iter().map(|d| d.due_count).sum(),
            statuses,
            days,
        }
    }

    /// Dates carrying an occurrence or a due task, ascending.
    pub fn marked_dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<_> = self.occurrences.keys().chain(self.due.keys()).copied().collect();
        dates.sort_unstable();
        dates.dedup();
        dates
    }

    /// Total occurrences held by the index.
    pub fn occurrence_count(&self) -> usize {
        self.occurrences.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::RepeatFrequency;
    use chrono::Utc;
    use uuid::Uuid;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn task(date: &str, due: Option<&str>, repeat: RepeatFrequency, status: TaskStatus) -> ScheduledTask {
        let now = Utc::now();
        ScheduledTask {
            id: Uuid::new_v4(),
            user_id: "u".to_string(),
            title: "task".to_string(),
            description: None,
            scheduled_date: d(date),
            scheduled_time: None,
            due_date: due.map(d),
            repeat_frequency: repeat,
            notification_enabled: false,
            status,
            notification_handle: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_empty_date_counts_zero() {
        let index = CalendarIndex::build(Vec::<ScheduledTask>::new().iter(), &RecurrenceGenerator::default());
        let summary = index.day_summary(d("2024-05-05"));
        assert_eq!(summary, DaySummary::empty(d("2024-05-05")));
    }

    #[test]
    fn test_occurring_and_due_counted_separately() {
        let tasks = vec![task("2024-05-10", Some("2024-05-10"), RepeatFrequency::None, TaskStatus::Upcoming)];
        let index = CalendarIndex::build(&tasks, &RecurrenceGenerator::default());

        let summary = index.day_summary(d("2024-05-10"));
        assert_eq!(summary.direct_count, 1);
        assert_eq!(summary.due_count, 1);
        assert_eq!(summary.total(), 2);
    }

    #[test]
    fn test_repeats_are_virtual_and_share_status() {
        let tasks = vec![task("2024-01-15", Some("2024-02-05"), RepeatFrequency::Weekly, TaskStatus::Completed)];
        let index = CalendarIndex::build(&tasks, &RecurrenceGenerator::default());

        let first = index.occurrences_on(d("2024-01-15"));
        assert_eq!(first.len(), 1);
        assert!(!first[0].is_virtual());

        let later = index.occurrences_on(d("2024-01-29"));
        assert_eq!(later.len(), 1);
        assert!(later[0].is_virtual());
        assert_eq!(index.day_summary(d("2024-01-29")).statuses.completed, 1);

        assert_eq!(index.occurrence_count(), 4);
        // The due date is also an occurrence date, so it is counted twice.
        let due_day = index.day_summary(d("2024-02-05"));
        assert_eq!((due_day.direct_count, due_day.due_count), (1, 1));
    }

    #[test]
    fn test_month_view_totals() {
        let tasks = vec![
            task("2024-02-01", None, RepeatFrequency::Weekly, TaskStatus::Upcoming),
            task("2024-02-10", Some("2024-03-02"), RepeatFrequency::None, TaskStatus::Missed),
        ];
        let index = CalendarIndex::build(&tasks, &RecurrenceGenerator::default());
        let view = index.month_view(CalendarMonth::new(2024, 2).unwrap());

        assert_eq!(view.days.len(), 29);
        // Weekly on 1, 8, 15, 22, 29 plus the one-off on the 10th.
        assert_eq!(view.total_direct, 6);
        assert_eq!(view.total_due, 0);
        assert_eq!(view.statuses.missed, 1);
        assert_eq!(view.busy_days().count(), 6);
        assert_eq!(index.marked_dates().last().copied(), Some(d("2024-04-25")));
    }
}
