//! Common test utilities for integration tests
//!
//! Provides shared fixtures, clocks and store builders used across
//! multiple integration test files.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use almanac::adapters::{InMemoryTaskStore, LoggingNotificationScheduler};
use almanac::domain::dates::{parse_date, parse_time};
use almanac::domain::models::{RepeatFrequency, ScheduledTask, TaskStatus};
use almanac::domain::ports::FixedClock;
use almanac::services::TaskLifecycleService;
use chrono::{NaiveDate, NaiveTime, Utc};
use tempfile::TempDir;
use uuid::Uuid;

pub const USER: &str = "test-user";

pub fn d(s: &str) -> NaiveDate {
    parse_date(s).expect("valid test date")
}

pub fn t(s: &str) -> NaiveTime {
    parse_time(s).expect("valid test time")
}

/// Clock pinned at `date` `time` local wall-clock.
pub fn clock_at(date: &str, time: &str) -> Arc<FixedClock> {
    Arc::new(FixedClock::new(d(date).and_time(t(time))))
}

/// Create a temporary test database
///
/// Returns the path to a SQLite database file in a temporary directory.
/// The TempDir must be kept alive for the duration of the test.
pub fn temp_db_path() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("almanac.db");
    (dir, db_path)
}

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// A persisted-looking task without going through a store.
pub fn task(title: &str, scheduled: &str) -> ScheduledTask {
    let now = Utc::now();
    ScheduledTask {
        id: Uuid::new_v4(),
        user_id: USER.to_string(),
        title: title.to_string(),
        description: None,
        scheduled_date: d(scheduled),
        scheduled_time: None,
        due_date: None,
        repeat_frequency: RepeatFrequency::None,
        notification_enabled: false,
        status: TaskStatus::Upcoming,
        notification_handle: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn repeating(title: &str, scheduled: &str, frequency: RepeatFrequency, due: Option<&str>) -> ScheduledTask {
    ScheduledTask {
        repeat_frequency: frequency,
        due_date: due.map(d),
        ..task(title, scheduled)
    }
}

pub fn with_status(mut task: ScheduledTask, status: TaskStatus) -> ScheduledTask {
    task.status = status;
    task
}

pub struct Harness {
    pub store: Arc<InMemoryTaskStore>,
    pub clock: Arc<FixedClock>,
    pub notifier: Arc<LoggingNotificationScheduler>,
    pub service: TaskLifecycleService<InMemoryTaskStore>,
}

/// Lifecycle service over an in-memory store, pinned at `date` `time`.
pub fn harness(date: &str, time: &str) -> Harness {
    harness_with(InMemoryTaskStore::new(), date, time)
}

pub fn harness_with(store: InMemoryTaskStore, date: &str, time: &str) -> Harness {
    let store = Arc::new(store);
    let clock = clock_at(date, time);
    let notifier = Arc::new(LoggingNotificationScheduler::new());
    let service = TaskLifecycleService::new(store.clone(), clock.clone(), notifier.clone());
    Harness {
        store,
        clock,
        notifier,
        service,
    }
}
