//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the interfaces the engine needs from the outside world:
//! - Clock: current date and wall-clock time
//! - TaskStore: persistence, atomic batches, and live snapshots
//! - NotificationScheduler: reminder scheduling and cancellation

pub mod clock;
pub mod notification_scheduler;
pub mod task_store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use notification_scheduler::{
    NotificationRequest, NotificationScheduler, NullNotificationScheduler,
};
pub use task_store::{
    sort_tasks, SnapshotFeed, TaskFilter, TaskSnapshot, TaskStore, TaskSubscription,
};
