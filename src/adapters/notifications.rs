//! Notification scheduler that records reminders and logs them.
//!
//! Push delivery is handled elsewhere; this adapter keeps the pending set in
//! memory so the CLI and tests can see what would fire and when.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::NotificationHandle;
use crate::domain::ports::{NotificationRequest, NotificationScheduler};

/// Scheduler that keeps pending reminders in memory and logs each change.
#[derive(Debug, Default)]
pub struct LoggingNotificationScheduler {
    pending: RwLock<HashMap<NotificationHandle, NotificationRequest>>,
}

impl LoggingNotificationScheduler {
    /// Scheduler with nothing pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reminders scheduled and not yet cancelled, ordered by fire time.
    pub async fn pending(&self) -> Vec<(NotificationHandle, NotificationRequest)> {
        let mut pending: Vec<_> = self
            .pending
            .read()
            .await
            .iter()
            .map(|(h, r)| (h.clone(), r.clone()))
            .collect();
        pending.sort_by_key(|(_, r)| r.fire_at);
        pending
    }

    /// Fire time of the pending reminder for `task_id`, if any.
    pub async fn pending_for(&self, task_id: Uuid) -> Option<NaiveDateTime> {
        self.pending
            .read()
            .await
            .values()
            .find(|r| r.task_id == task_id)
            .map(|r| r.fire_at)
    }
}

#[async_trait]
impl NotificationScheduler for LoggingNotificationScheduler {
    async fn schedule(&self, request: &NotificationRequest) -> DomainResult<Option<NotificationHandle>> {
        let handle = NotificationHandle::new(format!("notif-{}", Uuid::new_v4()));
        tracing::info!(
            task_id = %request.task_id,
            handle = %handle,
            fire_at = %request.fire_at,
            title = %request.title,
            "reminder scheduled"
        );
        self.pending.write().await.insert(handle.clone(), request.clone());
        Ok(Some(handle))
    }

    async fn cancel(&self, handle: &NotificationHandle) -> DomainResult<()> {
        match self.pending.write().await.remove(handle) {
            Some(request) => tracing::info!(task_id = %request.task_id, handle = %handle, "reminder cancelled"),
            None => tracing::debug!(handle = %handle, "cancel for unknown reminder ignored"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_schedule_then_cancel() {
        let scheduler = LoggingNotificationScheduler::new();
        let task_id = Uuid::new_v4();
        let fire_at = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();

        let handle = scheduler
            .schedule(&NotificationRequest {
                task_id,
                title: "Renew passport".to_string(),
                body: None,
                fire_at,
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(scheduler.pending_for(task_id).await, Some(fire_at));

        scheduler.cancel(&handle).await.unwrap();
        assert!(scheduler.pending().await.is_empty());
        // Cancelling twice is harmless.
        scheduler.cancel(&handle).await.unwrap();
    }
}
