//! Benchmarks for recurrence expansion and calendar aggregation.

use chrono::{Duration, NaiveDate, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use uuid::Uuid;

use almanac::domain::dates::CalendarMonth;
use almanac::domain::models::{RepeatFrequency, ScheduledTask, TaskStatus};
use almanac::services::{CalendarIndex, RecurrenceGenerator};

fn tasks(count: usize) -> Vec<ScheduledTask> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default();
    let now = Utc::now();
    (0..count)
        .map(|i| ScheduledTask {
            id: Uuid::new_v4(),
            user_id: "bench".to_string(),
            title: format!("task {i}"),
            description: None,
            scheduled_date: start + Duration::days((i % 90) as i64),
            scheduled_time: None,
            due_date: (i % 5 == 0).then(|| start + Duration::days(120)),
            repeat_frequency: match i % 3 {
                0 => RepeatFrequency::None,
                1 => RepeatFrequency::Weekly,
                _ => RepeatFrequency::Monthly,
            },
            notification_enabled: false,
            status: TaskStatus::Upcoming,
            notification_handle: None,
            created_at: now,
            updated_at: now,
        })
        .collect()
}

fn bench_generate(c: &mut Criterion) {
    let generator = RecurrenceGenerator::default();
    let start = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap_or_default();
    let due = Some(start + Duration::days(730));

    c.bench_function("generate_weekly_capped", |b| {
        b.iter(|| black_box(generator.dates_for(start, RepeatFrequency::Weekly, due)))
    });
    c.bench_function("generate_monthly_capped", |b| {
        b.iter(|| black_box(generator.dates_for(start, RepeatFrequency::Monthly, due)))
    });
}

fn bench_build_index(c: &mut Criterion) {
    let generator = RecurrenceGenerator::default();
    let mut group = c.benchmark_group("calendar_build");
    for count in [100, 1_000, 5_000] {
        let tasks = tasks(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &tasks, |b, tasks| {
            b.iter(|| black_box(CalendarIndex::build(tasks.iter(), &generator)))
        });
    }
    group.finish();
}

fn bench_month_view(c: &mut Criterion) {
    let generator = RecurrenceGenerator::default();
    let tasks = tasks(1_000);
    let index = CalendarIndex::build(tasks.iter(), &generator);
    let month = CalendarMonth { year: 2024, month: 2 };

    c.bench_function("month_view_1k", |b| b.iter(|| black_box(index.month_view(month))));
}

criterion_group!(benches, bench_generate, bench_build_index, bench_month_view);
criterion_main!(benches);
