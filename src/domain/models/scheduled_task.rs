//! Scheduled task domain model.
//!
//! A `ScheduledTask` is a one-off or repeating event owned by a user. It is
//! created through the lifecycle controller, mutated by user edits or by the
//! missed-task sweeper, and deleted only by explicit user action.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::dates;

/// Reminder time for tasks without an explicit time of day (09:00).
pub fn default_reminder_time() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// Lifecycle status of a scheduled task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Scheduled and not yet acted on
    #[default]
    Upcoming,
    /// Marked done by the user
    Completed,
    /// Scheduled date passed while still upcoming
    Missed,
}

impl TaskStatus {
    /// Lowercase name used in storage and output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Completed => "completed",
            Self::Missed => "missed",
        }
    }

    /// Parse a status name, case-insensitively.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "upcoming" => Some(Self::Upcoming),
            "completed" | "complete" => Some(Self::Completed),
            "missed" => Some(Self::Missed),
            _ => None,
        }
    }

    /// Valid transitions from this status.
    ///
    /// `Upcoming -> Missed` is listed here but only the sweeper performs it.
    pub fn valid_transitions(&self) -> Vec<TaskStatus> {
        match self {
            Self::Upcoming => vec![Self::Completed, Self::Missed],
            Self::Completed => vec![Self::Upcoming],
            Self::Missed => vec![Self::Upcoming],
        }
    }

    /// Whether moving to `new_status` is allowed.
    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a task repeats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatFrequency {
    /// One-off task
    #[default]
    None,
    /// Accepted and stored, but the generator does not expand it.
    Daily,
    /// Every seven days from the scheduled date
    Weekly,
    /// Same day each month, clamped to the month's length
    Monthly,
}

impl RepeatFrequency {
    /// Lowercase name used in storage and output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    /// Parse a frequency name; `once` is an alias for `none`.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" | "once" => Some(Self::None),
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            _ => None,
        }
    }

    /// Whether the generator expands this frequency beyond the first date.
    pub fn is_recurring(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for RepeatFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque reference to a pending notification, used only for cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationHandle(pub String);

impl NotificationHandle {
    /// Wrap a scheduler-issued identifier.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A persisted scheduled task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTask {
    /// Store-assigned identifier
    pub id: Uuid,
    /// Owner of the task
    pub user_id: String,
    /// Short title, never empty
    pub title: String,
    /// Free-form notes
    pub description: Option<String>,
    /// Date the task happens on
    pub scheduled_date: NaiveDate,
    /// Optional time of day
    #[serde(with = "dates::hh_mm_opt", default)]
    pub scheduled_time: Option<NaiveTime>,
    /// Last date the task (or its repeats) may run to
    pub due_date: Option<NaiveDate>,
    /// Repeat rule
    pub repeat_frequency: RepeatFrequency,
    /// Whether the user asked for a reminder
    pub notification_enabled: bool,
    /// Current lifecycle status
    pub status: TaskStatus,
    /// Reminder currently scheduled for this task, if any
    pub notification_handle: Option<NotificationHandle>,
    /// When the task was created
    pub created_at: DateTime<Utc>,
    /// When the task was last written
    pub updated_at: DateTime<Utc>,
}

impl ScheduledTask {
    /// Wall-clock instant at which a reminder for this task should fire,
    /// falling back to `default_time` when the task has no time of day.
    pub fn reminder_at(&self, default_time: NaiveTime) -> NaiveDateTime {
        self.scheduled_date
            .and_time(self.scheduled_time.unwrap_or(default_time))
    }

    /// Whether the task is still upcoming but scheduled before `today`.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status == TaskStatus::Upcoming && self.scheduled_date < today
    }
}

/// Input for creating a new task. The store assigns the id, status and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDraft {
    /// Owner of the new task
    pub user_id: String,
    /// Short title, must not be blank
    pub title: String,
    /// Free-form notes
    pub description: Option<String>,
    /// Date the task happens on
    pub scheduled_date: NaiveDate,
    /// Optional time of day
    #[serde(with = "dates::hh_mm_opt", default)]
    pub scheduled_time: Option<NaiveTime>,
    /// Optional due date, not before `scheduled_date`
    pub due_date: Option<NaiveDate>,
    /// Repeat rule
    pub repeat_frequency: RepeatFrequency,
    /// Whether to schedule a reminder
    pub notification_enabled: bool,
}

impl TaskDraft {
    /// Draft for a one-off task with no time, due date or reminder.
    pub fn new(user_id: impl Into<String>, title: impl Into<String>, scheduled_date: NaiveDate) -> Self {
        Self {
            user_id: user_id.into(),
            title: title.into(),
            description: None,
            scheduled_date,
            scheduled_time: None,
            due_date: None,
            repeat_frequency: RepeatFrequency::None,
            notification_enabled: false,
        }
    }

    // Builder methods
    /// Attach notes.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the time of day.
    pub fn with_time(mut self, time: NaiveTime) -> Self {
        self.scheduled_time = Some(time);
        self
    }

    /// Set the due date.
    pub fn with_due_date(mut self, due: NaiveDate) -> Self {
        self.due_date = Some(due);
        self
    }

    /// Set the repeat rule.
    pub fn with_repeat(mut self, frequency: RepeatFrequency) -> Self {
        self.repeat_frequency = frequency;
        self
    }

    /// Turn the reminder on or off.
    pub fn with_notification(mut self, enabled: bool) -> Self {
        self.notification_enabled = enabled;
        self
    }
}

/// A user edit to an existing task. `None` leaves a field untouched; the
/// nested `Option`s allow clearing optional fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskEdit {
    /// New title
    pub title: Option<String>,
    /// New notes; `Some(None)` clears them
    pub description: Option<Option<String>>,
    /// New scheduled date
    pub scheduled_date: Option<NaiveDate>,
    /// New time; `Some(None)` clears it
    pub scheduled_time: Option<Option<NaiveTime>>,
    /// New due date; `Some(None)` clears it
    pub due_date: Option<Option<NaiveDate>>,
    /// New repeat rule
    pub repeat_frequency: Option<RepeatFrequency>,
    /// Turn the reminder on or off
    pub notification_enabled: Option<bool>,
}

impl TaskEdit {
    /// Whether the edit changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether the edit changes when the task happens.
    pub fn touches_schedule(&self) -> bool {
        self.scheduled_date.is_some() || self.scheduled_time.is_some()
    }

    /// Whether an existing reminder has to be replaced after this edit.
    pub fn affects_notification(&self) -> bool {
        self.touches_schedule() || self.notification_enabled.is_some() || self.title.is_some()
    }

    /// Preview of the task as it would look after this edit.
    pub fn apply_to(&self, task: &ScheduledTask) -> ScheduledTask {
        let mut merged = task.clone();
        if let Some(ref title) = self.title {
            merged.title.clone_from(title);
        }
        if let Some(ref description) = self.description {
            merged.description.clone_from(description);
        }
        if let Some(date) = self.scheduled_date {
            merged.scheduled_date = date;
        }
        if let Some(time) = self.scheduled_time {
            merged.scheduled_time = time;
        }
        if let Some(due) = self.due_date {
            merged.due_date = due;
        }
        if let Some(freq) = self.repeat_frequency {
            merged.repeat_frequency = freq;
        }
        if let Some(enabled) = self.notification_enabled {
            merged.notification_enabled = enabled;
        }
        merged
    }

    /// Convert into a store patch without a status precondition.
    pub fn into_patch(self) -> TaskPatch {
        TaskPatch {
            title: self.title,
            description: self.description,
            scheduled_date: self.scheduled_date,
            scheduled_time: self.scheduled_time,
            due_date: self.due_date,
            repeat_frequency: self.repeat_frequency,
            notification_enabled: self.notification_enabled,
            ..TaskPatch::default()
        }
    }
}

/// Store-level partial update.
///
/// `if_status` is a precondition: the write only applies while the stored
/// status still equals it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    /// New title
    pub title: Option<String>,
    /// New notes; `Some(None)` clears them
    pub description: Option<Option<String>>,
    /// New scheduled date
    pub scheduled_date: Option<NaiveDate>,
    /// New time; `Some(None)` clears it
    pub scheduled_time: Option<Option<NaiveTime>>,
    /// New due date; `Some(None)` clears it
    pub due_date: Option<Option<NaiveDate>>,
    /// New repeat rule
    pub repeat_frequency: Option<RepeatFrequency>,
    /// Reminder flag
    pub notification_enabled: Option<bool>,
    /// New status
    pub status: Option<TaskStatus>,
    /// Replacement reminder handle; `Some(None)` clears it
    pub notification_handle: Option<Option<NotificationHandle>>,
    /// Status the stored task must still have
    pub if_status: Option<TaskStatus>,
}

impl TaskPatch {
    /// Patch that moves a task from `from` to `to`.
    pub fn transition(from: TaskStatus, to: TaskStatus) -> Self {
        Self {
            status: Some(to),
            if_status: Some(from),
            ..Self::default()
        }
    }

    /// Also write the reminder handle.
    pub fn with_notification_handle(mut self, handle: Option<NotificationHandle>) -> Self {
        self.notification_handle = Some(handle);
        self
    }

    /// Whether the patch changes any stored field (the precondition does not count).
    pub fn has_changes(&self) -> bool {
        Self { if_status: None, ..self.clone() } != Self::default()
    }

    /// Apply the patch in memory. Used by stores that don't speak SQL.
    pub fn apply(&self, task: &mut ScheduledTask) {
        if let Some(ref title) = self.title {
            task.title.clone_from(title);
        }
        if let Some(ref description) = self.description {
            task.description.clone_from(description);
        }
        if let Some(date) = self.scheduled_date {
            task.scheduled_date = date;
        }
        if let Some(time) = self.scheduled_time {
            task.scheduled_time = time;
        }
        if let Some(due) = self.due_date {
            task.due_date = due;
        }
        if let Some(freq) = self.repeat_frequency {
            task.repeat_frequency = freq;
        }
        if let Some(enabled) = self.notification_enabled {
            task.notification_enabled = enabled;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(ref handle) = self.notification_handle {
            task.notification_handle.clone_from(handle);
        }
    }
}
