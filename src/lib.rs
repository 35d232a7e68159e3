//! Almanac - scheduled task engine
//!
//! Almanac keeps a per-user list of dated tasks. Tasks can repeat weekly or
//! monthly up to a bounded horizon, carry an optional reminder, and move
//! through an `upcoming -> completed | missed` lifecycle. A sweeper marks
//! overdue tasks missed, and a calendar index answers "what is on this day"
//! and "how busy is this month".
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, date helpers, errors and port traits
//! - **Adapters** (`adapters`): SQLite and in-memory stores, notification scheduler
//! - **Service Layer** (`services`): Recurrence, lifecycle, sweeping, calendar and live board
//! - **Infrastructure Layer** (`infrastructure`): Configuration and logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use almanac::adapters::{InMemoryTaskStore, LoggingNotificationScheduler};
//! use almanac::domain::models::{RepeatFrequency, TaskDraft};
//! use almanac::domain::ports::SystemClock;
//! use almanac::services::TaskLifecycleService;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let service = TaskLifecycleService::new(
//!         Arc::new(InMemoryTaskStore::new()),
//!         Arc::new(SystemClock),
//!         Arc::new(LoggingNotificationScheduler::new()),
//!     );
//!     let date = chrono::Local::now().date_naive();
//!     service
//!         .create(TaskDraft::new("me", "Water plants", date).with_repeat(RepeatFrequency::Weekly))
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult, ValidationError};
pub use domain::models::{
    Config, Occurrence, RepeatFrequency, ScheduledTask, TaskDraft, TaskEdit, TaskStatus,
};
pub use domain::ports::{Clock, NotificationScheduler, TaskFilter, TaskStore};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    CalendarIndex, MissedTaskSweeper, RecurrenceGenerator, TaskBoard, TaskLifecycleService,
};
