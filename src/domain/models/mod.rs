//! Domain models for the scheduling engine.

pub mod config;
pub mod occurrence;
pub mod scheduled_task;

pub use config::{
    Config, DatabaseConfig, LifecycleConfig, LoggingConfig, NotificationConfig, RecurrenceConfig,
    SweeperConfig,
};
pub use occurrence::{Occurrence, OccurrenceKey};
pub use scheduled_task::{
    default_reminder_time, NotificationHandle, RepeatFrequency, ScheduledTask, TaskDraft,
    TaskEdit, TaskPatch, TaskStatus,
};
