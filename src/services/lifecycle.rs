//! Status lifecycle controller.
//!
//! Gates every user-triggered write: input validation, the legal status
//! transitions, reminder bookkeeping and the duplicate-submission guard.
//! The controller never marks a task missed; only the sweeper does that.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use crate::domain::dates::parse_time;
use crate::domain::errors::{DomainError, DomainResult, ValidationError};
use crate::domain::models::{
    default_reminder_time, Config, NotificationHandle, Occurrence, ScheduledTask, TaskDraft, TaskEdit,
    TaskPatch, TaskStatus,
};
use crate::domain::ports::{Clock, NotificationRequest, NotificationScheduler, TaskStore};

#[derive(Debug, Default)]
struct GuardState {
    in_flight: bool,
    cooldown_until: Option<Instant>,
}

/// Explicit "operation in flight" flag.
///
/// Acquiring returns a ticket; dropping the ticket clears the flag and starts
/// the cooldown, whether the operation succeeded or not.
#[derive(Debug)]
pub struct InFlightGuard {
    state: Mutex<GuardState>,
    cooldown: Duration,
}

impl InFlightGuard {
    /// Guard whose cooldown starts when each ticket is dropped.
    pub fn new(cooldown: Duration) -> Self {
        Self {
            state: Mutex::new(GuardState::default()),
            cooldown,
        }
    }

    fn lock(&self) -> MutexGuard<'_, GuardState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim the guard, or fail with `OperationInFlight` while busy or cooling down.
    pub fn try_acquire(&self) -> DomainResult<InFlightTicket<'_>> {
        let mut state = self.lock();
        let cooling = state.cooldown_until.is_some_and(|until| Instant::now() < until);
        if state.in_flight || cooling {
            return Err(DomainError::OperationInFlight);
        }
        state.in_flight = true;
        state.cooldown_until = None;
        Ok(InFlightTicket { guard: self })
    }

    /// Whether an operation is running or the cooldown has not expired.
    pub fn is_busy(&self) -> bool {
        let state = self.lock();
        state.in_flight || state.cooldown_until.is_some_and(|until| Instant::now() < until)
    }
}

/// Proof of a claimed guard; releases it on drop.
#[derive(Debug)]
pub struct InFlightTicket<'a> {
    guard: &'a InFlightGuard,
}

impl Drop for InFlightTicket<'_> {
    fn drop(&mut self) {
        let mut state = self.guard.lock();
        state.in_flight = false;
        state.cooldown_until = Some(Instant::now() + self.guard.cooldown);
    }
}

/// Validated create, edit and status changes for scheduled tasks, with reminder upkeep.
pub struct TaskLifecycleService<S: TaskStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn NotificationScheduler>,
    guard: InFlightGuard,
    reminder_time: NaiveTime,
}

impl<S: TaskStore> TaskLifecycleService<S> {
    /// Service with no cooldown and a 09:00 default reminder time.
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, notifier: Arc<dyn NotificationScheduler>) -> Self {
        Self {
            store,
            clock,
            notifier,
            guard: InFlightGuard::new(Duration::ZERO),
            reminder_time: default_reminder_time(),
        }
    }

    /// Service configured from the `lifecycle` and `notifications` sections.
    pub fn from_config(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn NotificationScheduler>,
        config: &Config,
    ) -> Self {
        let reminder_time = parse_time(&config.notifications.default_time).unwrap_or_else(|_| {
            tracing::warn!(
                value = %config.notifications.default_time,
                "invalid default reminder time, using 09:00"
            );
            default_reminder_time()
        });
        Self::new(store, clock, notifier)
            .with_cooldown(Duration::from_millis(config.lifecycle.submit_cooldown_ms))
            .with_reminder_time(reminder_time)
    }

    /// Replace the submission cooldown.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.guard = InFlightGuard::new(cooldown);
        self
    }

    /// Reminder time used for tasks with no time of day.
    pub fn with_reminder_time(mut self, time: NaiveTime) -> Self {
        self.reminder_time = time;
        self
    }

    /// The duplicate-submission guard.
    pub fn guard(&self) -> &InFlightGuard {
        &self.guard
    }

    /// Validation rules in order; the first failure wins.
    ///
    /// `check_past` disables rules 2 and 3 for edits that leave the schedule alone.
    fn check_schedule(
        &self,
        title: &str,
        scheduled: NaiveDate,
        time: Option<NaiveTime>,
        due: Option<NaiveDate>,
        check_past: bool,
    ) -> Result<(), ValidationError> {
        if title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }

        if check_past {
            let now = self.clock.now();
            let today = now.date();
            if scheduled < today {
                return Err(ValidationError::PastDate { scheduled, today });
            }
            if scheduled == today {
                if let Some(time) = time {
                    if time < now.time() {
                        return Err(ValidationError::PastTime { time, now: now.time() });
                    }
                }
            }
        }

        if let Some(due) = due {
            if due < scheduled {
                return Err(ValidationError::DueBeforeScheduled { due, scheduled });
            }
        }
        Ok(())
    }

    /// Validate a new task against the clock.
    pub fn validate_draft(&self, draft: &TaskDraft) -> Result<(), ValidationError> {
        self.check_schedule(&draft.title, draft.scheduled_date, draft.scheduled_time, draft.due_date, true)
    }

    /// Validate `edit` against the record it would produce.
    pub fn validate_edit(&self, current: &ScheduledTask, edit: &TaskEdit) -> Result<(), ValidationError> {
        let merged = edit.apply_to(current);
        self.check_schedule(
            &merged.title,
            merged.scheduled_date,
            merged.scheduled_time,
            merged.due_date,
            edit.touches_schedule(),
        )
    }

    async fn load(&self, id: Uuid) -> DomainResult<ScheduledTask> {
        self.store.get(id).await?.ok_or(DomainError::TaskNotFound(id))
    }

    /// Validate and store a new task, scheduling its reminder when asked.
    pub async fn create(&self, draft: TaskDraft) -> DomainResult<ScheduledTask> {
        self.validate_draft(&draft)?;
        let _ticket = self.guard.try_acquire()?;

        let task = self.store.create(&draft).await?;
        tracing::info!(task_id = %task.id, date = %task.scheduled_date, repeat = %task.repeat_frequency, "task created");

        let Some(handle) = self.schedule_reminder(&task).await else {
            return Ok(task);
        };

        let patch = TaskPatch::default().with_notification_handle(Some(handle.clone()));
        match self.store.update(task.id, &patch).await {
            Ok(updated) => Ok(updated),
            Err(e) => {
                tracing::warn!(task_id = %task.id, error = %e, "failed to record reminder handle");
                self.cancel_reminder(task.id, Some(&handle)).await;
                Ok(task)
            }
        }
    }

    /// Apply a user edit. Reminders are replaced when the edit changes what
    /// or when the task fires.
    pub async fn update(&self, id: Uuid, edit: TaskEdit) -> DomainResult<ScheduledTask> {
        let _ticket = self.guard.try_acquire()?;
        let current = self.load(id).await?;
        if edit.is_empty() {
            return Ok(current);
        }
        self.validate_edit(&current, &edit)?;

        let reschedule_reminder = edit.affects_notification();
        let merged = edit.apply_to(&current);
        let mut patch = edit.into_patch();

        let new_handle = if reschedule_reminder {
            let handle = self.schedule_reminder(&merged).await;
            patch.notification_handle = Some(handle.clone());
            handle
        } else {
            None
        };

        match self.store.update(id, &patch).await {
            Ok(updated) => {
                if reschedule_reminder {
                    self.cancel_reminder(id, current.notification_handle.as_ref()).await;
                }
                tracing::info!(task_id = %id, "task updated");
                Ok(updated)
            }
            Err(e) => {
                self.cancel_reminder(id, new_handle.as_ref()).await;
                Err(e)
            }
        }
    }

    /// Delete a task and cancel its reminder.
    pub async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let _ticket = self.guard.try_acquire()?;
        let current = self.load(id).await?;
        self.store.delete(id).await?;
        self.cancel_reminder(id, current.notification_handle.as_ref()).await;
        tracing::info!(task_id = %id, "task deleted");
        Ok(())
    }

    /// Mark an upcoming task completed and cancel its reminder.
    pub async fn complete(&self, id: Uuid) -> DomainResult<ScheduledTask> {
        let _ticket = self.guard.try_acquire()?;
        let current = self.load(id).await?;

        if current.status != TaskStatus::Upcoming {
            return Err(invalid_transition(current.status, TaskStatus::Completed, "only upcoming tasks can be completed"));
        }

        let patch = TaskPatch::transition(TaskStatus::Upcoming, TaskStatus::Completed).with_notification_handle(None);
        let updated = self.store.update(id, &patch).await?;
        self.cancel_reminder(id, current.notification_handle.as_ref()).await;
        tracing::info!(task_id = %id, "task completed");
        Ok(updated)
    }

    /// Put a completed or missed task back to upcoming, keeping its dates.
    pub async fn reset(&self, id: Uuid) -> DomainResult<ScheduledTask> {
        let _ticket = self.guard.try_acquire()?;
        let current = self.load(id).await?;
        self.ensure_resettable(&current)?;

        let mut target = current.clone();
        target.status = TaskStatus::Upcoming;
        self.write_reset(&current, &target, TaskPatch::transition(current.status, TaskStatus::Upcoming))
            .await
    }

    /// Move a missed or completed task to a new date and make it upcoming
    /// again in a single write. `time` and `due` replace the stored values.
    pub async fn reschedule(
        &self,
        id: Uuid,
        date: NaiveDate,
        time: Option<NaiveTime>,
        due: Option<NaiveDate>,
    ) -> DomainResult<ScheduledTask> {
        let _ticket = self.guard.try_acquire()?;
        let current = self.load(id).await?;
        self.ensure_resettable(&current)?;
        self.check_schedule(&current.title, date, time, due, true)?;

        let mut target = current.clone();
        target.status = TaskStatus::Upcoming;
        target.scheduled_date = date;
        target.scheduled_time = time;
        target.due_date = due;

        let patch = TaskPatch {
            scheduled_date: Some(date),
            scheduled_time: Some(time),
            due_date: Some(due),
            ..TaskPatch::transition(current.status, TaskStatus::Upcoming)
        };
        self.write_reset(&current, &target, patch).await
    }

    /// Complete the stored task behind `occurrence`; generated repeats are rejected.
    pub async fn complete_occurrence(&self, occurrence: &Occurrence) -> DomainResult<ScheduledTask> {
        let id = occurrence.writable_id()?;
        self.complete(id).await
    }

    /// Reset the stored task behind `occurrence`; generated repeats are rejected.
    pub async fn reset_occurrence(&self, occurrence: &Occurrence) -> DomainResult<ScheduledTask> {
        let id = occurrence.writable_id()?;
        self.reset(id).await
    }

    fn ensure_resettable(&self, task: &ScheduledTask) -> DomainResult<()> {
        if task.status.can_transition_to(TaskStatus::Upcoming) {
            Ok(())
        } else {
            Err(invalid_transition(task.status, TaskStatus::Upcoming, "task is already upcoming"))
        }
    }

    async fn write_reset(
        &self,
        current: &ScheduledTask,
        target: &ScheduledTask,
        patch: TaskPatch,
    ) -> DomainResult<ScheduledTask> {
        let handle = self.schedule_reminder(target).await;
        let patch = patch.with_notification_handle(handle.clone());

        match self.store.update(current.id, &patch).await {
            Ok(updated) => {
                self.cancel_reminder(current.id, current.notification_handle.as_ref()).await;
                tracing::info!(task_id = %current.id, from = %current.status, date = %updated.scheduled_date, "task reset to upcoming");
                Ok(updated)
            }
            Err(e) => {
                self.cancel_reminder(current.id, handle.as_ref()).await;
                Err(e)
            }
        }
    }

    /// Ask the scheduler for a reminder when one is wanted and still in the future.
    async fn schedule_reminder(&self, task: &ScheduledTask) -> Option<NotificationHandle> {
        if !task.notification_enabled || task.status != TaskStatus::Upcoming {
            return None;
        }

        let fire_at = task.reminder_at(self.reminder_time);
        if fire_at <= self.clock.now() {
            tracing::debug!(task_id = %task.id, %fire_at, "reminder time already passed");
            return None;
        }

        let request = NotificationRequest {
            task_id: task.id,
            title: task.title.clone(),
            body: task.description.clone(),
            fire_at,
        };
        match self.notifier.schedule(&request).await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(task_id = %task.id, error = %e, "failed to schedule reminder");
                None
            }
        }
    }

    async fn cancel_reminder(&self, task_id: Uuid, handle: Option<&NotificationHandle>) {
        let Some(handle) = handle else { return };
        if let Err(e) = self.notifier.cancel(handle).await {
            tracing::warn!(%task_id, handle = %handle, error = %e, "failed to cancel reminder");
        }
    }
}

fn invalid_transition(from: TaskStatus, to: TaskStatus, reason: &str) -> DomainError {
    DomainError::InvalidStateTransition {
        from: from.to_string(),
        to: to.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryTaskStore;
    use crate::adapters::notifications::LoggingNotificationScheduler;
    use crate::domain::ports::{FixedClock, NullNotificationScheduler};

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    struct Fixture {
        store: Arc<InMemoryTaskStore>,
        clock: Arc<FixedClock>,
        notifier: Arc<LoggingNotificationScheduler>,
        service: TaskLifecycleService<InMemoryTaskStore>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryTaskStore::new());
        let clock = Arc::new(FixedClock::new(d("2024-06-10").and_time(t("10:30"))));
        let notifier = Arc::new(LoggingNotificationScheduler::new());
        let service = TaskLifecycleService::new(store.clone(), clock.clone(), notifier.clone());
        Fixture { store, clock, notifier, service }
    }

    #[test]
    fn test_validation_order_first_failure_wins() {
        let f = fixture();
        // Empty title beats the past date.
        let draft = TaskDraft::new("u", "   ", d("2024-06-01"));
        assert_eq!(f.service.validate_draft(&draft), Err(ValidationError::EmptyTitle));

        // Past date beats due-before-scheduled.
        let draft = TaskDraft::new("u", "x", d("2024-06-09")).with_due_date(d("2024-06-01"));
        assert!(matches!(f.service.validate_draft(&draft), Err(ValidationError::PastDate { .. })));

        let draft = TaskDraft::new("u", "x", d("2024-06-12")).with_due_date(d("2024-06-11"));
        assert!(matches!(f.service.validate_draft(&draft), Err(ValidationError::DueBeforeScheduled { .. })));
    }

    #[test]
    fn test_past_time_only_checked_today_against_full_instant() {
        let f = fixture();
        let today = d("2024-06-10");

        let earlier = TaskDraft::new("u", "x", today).with_time(t("10:29"));
        assert!(matches!(f.service.validate_draft(&earlier), Err(ValidationError::PastTime { .. })));

        // Seconds count: 10:30 is already behind 10:30:45.
        let same_minute = TaskDraft::new("u", "x", today).with_time(t("10:30"));
        f.clock.set(today.and_hms_opt(10, 30, 45).unwrap());
        assert_eq!(
            f.service.validate_draft(&same_minute),
            Err(ValidationError::PastTime {
                time: t("10:30"),
                now: NaiveTime::from_hms_opt(10, 30, 45).unwrap(),
            })
        );

        // Exactly now is not strictly before now.
        f.clock.set(today.and_hms_opt(10, 30, 0).unwrap());
        assert_eq!(f.service.validate_draft(&same_minute), Ok(()));

        let tomorrow_early = TaskDraft::new("u", "x", d("2024-06-11")).with_time(t("06:00"));
        assert_eq!(f.service.validate_draft(&tomorrow_early), Ok(()));
    }

    #[tokio::test]
    async fn test_create_schedules_reminder_and_stores_handle() {
        let f = fixture();
        let draft = TaskDraft::new("u", "Pick up parcel", d("2024-06-11")).with_notification(true);

        let task = f.service.create(draft).await.unwrap();
        assert!(task.notification_handle.is_some());
        assert_eq!(
            f.notifier.pending_for(task.id).await,
            Some(d("2024-06-11").and_time(t("09:00")))
        );
    }

    #[tokio::test]
    async fn test_create_today_without_time_skips_past_reminder() {
        let f = fixture();
        // 09:00 today is already behind the 10:30 clock.
        let draft = TaskDraft::new("u", "Stretch", d("2024-06-10")).with_notification(true);
        let task = f.service.create(draft).await.unwrap();
        assert!(task.notification_handle.is_none());
        assert!(f.notifier.pending().await.is_empty());
    }

    #[tokio::test]
    async fn test_complete_then_reset_keeps_dates() {
        let f = fixture();
        let draft = TaskDraft::new("u", "Report", d("2024-06-12"))
            .with_due_date(d("2024-06-14"))
            .with_notification(true);
        let task = f.service.create(draft).await.unwrap();

        let completed = f.service.complete(task.id).await.unwrap();
        assert_eq!(completed.status, TaskStatus::Completed);
        assert!(completed.notification_handle.is_none());
        assert!(f.notifier.pending().await.is_empty());

        let reset = f.service.reset(task.id).await.unwrap();
        assert_eq!(reset.status, TaskStatus::Upcoming);
        assert_eq!(reset.scheduled_date, task.scheduled_date);
        assert_eq!(reset.due_date, task.due_date);
        assert!(reset.notification_handle.is_some());
    }

    #[tokio::test]
    async fn test_illegal_transitions_are_rejected() {
        let f = fixture();
        let task = f.service.create(TaskDraft::new("u", "x", d("2024-06-12"))).await.unwrap();

        assert!(matches!(
            f.service.reset(task.id).await,
            Err(DomainError::InvalidStateTransition { .. })
        ));
        f.service.complete(task.id).await.unwrap();
        assert!(matches!(
            f.service.complete(task.id).await,
            Err(DomainError::InvalidStateTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_validation_failure_makes_no_store_call() {
        let f = fixture();
        let result = f.service.create(TaskDraft::new("u", "x", d("2024-06-09"))).await;
        assert!(matches!(result, Err(DomainError::Validation(ValidationError::PastDate { .. }))));
        assert_eq!(f.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_rename_of_stale_task_is_allowed() {
        let f = fixture();
        let task = f.service.create(TaskDraft::new("u", "Old", d("2024-06-11"))).await.unwrap();
        f.clock.set(d("2024-06-20").and_time(t("08:00")));

        let edit = TaskEdit {
            title: Some("Renamed".to_string()),
            ..TaskEdit::default()
        };
        assert_eq!(f.service.update(task.id, edit).await.unwrap().title, "Renamed");

        let moved_back = TaskEdit {
            scheduled_date: Some(d("2024-06-19")),
            ..TaskEdit::default()
        };
        assert!(matches!(
            f.service.update(task.id, moved_back).await,
            Err(DomainError::Validation(ValidationError::PastDate { .. }))
        ));
    }

    #[tokio::test]
    async fn test_declined_reminder_still_creates_task() {
        let f = fixture();
        let service = TaskLifecycleService::new(f.store.clone(), f.clock.clone(), Arc::new(NullNotificationScheduler));

        let task = service
            .create(TaskDraft::new("u", "Quiet", d("2024-06-11")).with_notification(true))
            .await
            .unwrap();
        assert!(task.notification_enabled);
        assert_eq!(task.notification_handle, None);
        assert!(f.store.get(task.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_guard_blocks_during_cooldown() {
        let f = fixture();
        let service = f.service.with_cooldown(Duration::from_secs(60));

        service.create(TaskDraft::new("u", "First", d("2024-06-11"))).await.unwrap();
        assert!(service.guard().is_busy());
        assert!(matches!(
            service.create(TaskDraft::new("u", "Second", d("2024-06-11"))).await,
            Err(DomainError::OperationInFlight)
        ));
    }

    #[test]
    fn test_ticket_release_clears_in_flight() {
        let guard = InFlightGuard::new(Duration::ZERO);
        let ticket = guard.try_acquire().unwrap();
        assert!(matches!(guard.try_acquire(), Err(DomainError::OperationInFlight)));
        drop(ticket);
        assert!(guard.try_acquire().is_ok());
    }
}
