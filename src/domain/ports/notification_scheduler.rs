//! Notification scheduler port.
//!
//! The engine decides *when* a reminder should fire; delivery belongs to the
//! adapter. Callers never depend on delivery succeeding.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::NotificationHandle;

/// Reminder request handed to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    /// Task the reminder belongs to
    pub task_id: Uuid,
    /// Reminder title
    pub title: String,
    /// Optional reminder body
    pub body: Option<String>,
    /// Local wall-clock instant to fire at
    pub fire_at: NaiveDateTime,
}

/// Port for scheduling and cancelling task reminders.
#[async_trait]
pub trait NotificationScheduler: Send + Sync {
    /// Schedule a reminder. `None` means the scheduler declined it.
    async fn schedule(&self, request: &NotificationRequest) -> DomainResult<Option<NotificationHandle>>;

    /// Cancel a previously scheduled reminder. Unknown handles are not an error.
    async fn cancel(&self, handle: &NotificationHandle) -> DomainResult<()>;
}

/// A scheduler that never schedules anything.
///
/// Use this when reminders are disabled or not needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotificationScheduler;

#[async_trait]
impl NotificationScheduler for NullNotificationScheduler {
    async fn schedule(&self, _request: &NotificationRequest) -> DomainResult<Option<NotificationHandle>> {
        Ok(None)
    }

    async fn cancel(&self, _handle: &NotificationHandle) -> DomainResult<()> {
        Ok(())
    }
}
