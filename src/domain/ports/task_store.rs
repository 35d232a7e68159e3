//! Repository port for scheduled task persistence.
//!
//! Besides CRUD the store offers an atomic batch update and a live
//! subscription. Subscriptions deliver full snapshots, never deltas: each
//! delivered snapshot replaces whatever the consumer derived from the last one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::watch;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ScheduledTask, TaskDraft, TaskPatch, TaskStatus};

/// Filter for querying and subscribing to tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    /// Only tasks owned by this user
    pub user_id: Option<String>,
    /// Only tasks in this status
    pub status: Option<TaskStatus>,
    /// Only tasks scheduled strictly before this date
    pub scheduled_before: Option<NaiveDate>,
    /// Only tasks scheduled on or after this date
    pub scheduled_from: Option<NaiveDate>,
}

impl TaskFilter {
    /// Filter that matches everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Tasks owned by `user_id`.
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    /// Narrow to one status.
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Narrow to tasks scheduled strictly before `date`.
    pub fn scheduled_before(mut self, date: NaiveDate) -> Self {
        self.scheduled_before = Some(date);
        self
    }

    /// Narrow to tasks scheduled on or after `date`.
    pub fn scheduled_from(mut self, date: NaiveDate) -> Self {
        self.scheduled_from = Some(date);
        self
    }

    /// Whether no condition is set.
    pub fn is_unfiltered(&self) -> bool {
        *self == Self::default()
    }

    /// Whether `task` passes every condition.
    pub fn matches(&self, task: &ScheduledTask) -> bool {
        if let Some(ref user) = self.user_id {
            if &task.user_id != user {
                return false;
            }
        }
        if let Some(status) = self.status {
            if task.status != status {
                return false;
            }
        }
        if let Some(before) = self.scheduled_before {
            if task.scheduled_date >= before {
                return false;
            }
        }
        if let Some(from) = self.scheduled_from {
            if task.scheduled_date < from {
                return false;
            }
        }
        true
    }
}

/// Canonical ordering for task lists: date, then time (untimed first), then creation.
pub fn sort_tasks(tasks: &mut [ScheduledTask]) {
    tasks.sort_by(|a, b| {
        a.scheduled_date
            .cmp(&b.scheduled_date)
            .then(a.scheduled_time.cmp(&b.scheduled_time))
            .then(a.created_at.cmp(&b.created_at))
    });
}

/// Immutable view of the full task list at one revision.
#[derive(Debug, Clone, Default)]
pub struct TaskSnapshot {
    /// Monotonic revision of the store at the time of the snapshot
    pub revision: u64,
    /// Tasks in canonical order
    pub tasks: Arc<Vec<ScheduledTask>>,
}

impl TaskSnapshot {
    /// Number of tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the snapshot holds no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Snapshot restricted to tasks matching `filter`.
    pub fn filtered(&self, filter: &TaskFilter) -> Self {
        if filter.is_unfiltered() {
            return self.clone();
        }
        let tasks = self.tasks.iter().filter(|t| filter.matches(t)).cloned().collect();
        Self {
            revision: self.revision,
            tasks: Arc::new(tasks),
        }
    }
}

/// Publishing side of a store's live subscription.
#[derive(Debug)]
pub struct SnapshotFeed {
    sender: watch::Sender<TaskSnapshot>,
    revision: AtomicU64,
}

impl Default for SnapshotFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotFeed {
    /// Feed with an empty snapshot at revision 0.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(TaskSnapshot::default());
        Self {
            sender,
            revision: AtomicU64::new(0),
        }
    }

    /// Replace the current snapshot with `tasks` and wake every subscriber.
    pub fn publish(&self, tasks: Vec<ScheduledTask>) -> u64 {
        let revision = self.revision.fetch_add(1, Ordering::AcqRel) + 1;
        self.sender.send_replace(TaskSnapshot {
            revision,
            tasks: Arc::new(tasks),
        });
        revision
    }

    /// The latest published snapshot, unfiltered.
    pub fn current(&self) -> TaskSnapshot {
        self.sender.borrow().clone()
    }

    /// Attach a new subscriber; its first `next()` yields the current snapshot.
    pub fn subscribe(&self, filter: TaskFilter) -> TaskSubscription {
        TaskSubscription {
            rx: self.sender.subscribe(),
            filter,
            primed: false,
        }
    }

    /// Subscribers currently attached.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Receiving side of a live subscription.
///
/// The first call to [`TaskSubscription::next`] yields the current snapshot
/// immediately; later calls wait for the next change. Intermediate snapshots
/// may be skipped when the consumer is slower than the writers, which is fine
/// because each snapshot is complete.
#[derive(Debug)]
pub struct TaskSubscription {
    rx: watch::Receiver<TaskSnapshot>,
    filter: TaskFilter,
    primed: bool,
}

impl TaskSubscription {
    /// Next snapshot, or `None` once the store has been dropped.
    pub async fn next(&mut self) -> Option<TaskSnapshot> {
        if self.primed {
            self.rx.changed().await.ok()?;
        }
        self.primed = true;
        let snapshot = self.rx.borrow_and_update().clone();
        Some(snapshot.filtered(&self.filter))
    }

    /// Filter applied to every snapshot.
    pub fn filter(&self) -> &TaskFilter {
        &self.filter
    }
}

/// Persistence port for scheduled tasks.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persist a new task. The store assigns id, status and timestamps.
    async fn create(&self, draft: &TaskDraft) -> DomainResult<ScheduledTask>;

    /// Get a task by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<ScheduledTask>>;

    /// Apply a partial update and return the stored result.
    ///
    /// Fails with `TaskNotFound` for unknown ids and `ConcurrencyConflict`
    /// when the patch's status precondition no longer holds.
    async fn update(&self, id: Uuid, patch: &TaskPatch) -> DomainResult<ScheduledTask>;

    /// Delete a task by ID.
    async fn delete(&self, id: Uuid) -> DomainResult<()>;

    /// One-shot snapshot of tasks matching `filter`.
    async fn query(&self, filter: &TaskFilter) -> DomainResult<Vec<ScheduledTask>>;

    /// Apply several patches atomically: all of them or none.
    ///
    /// An unknown id aborts the whole batch. Entries whose status
    /// precondition no longer holds are skipped. Returns the number of
    /// entries applied.
    async fn batch_update(&self, updates: &[(Uuid, TaskPatch)]) -> DomainResult<usize>;

    /// Live subscription delivering the full matching task list on every change.
    async fn subscribe(&self, filter: TaskFilter) -> DomainResult<TaskSubscription>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::RepeatFrequency;
    use chrono::Utc;

    fn task(user: &str, date: &str, status: TaskStatus) -> ScheduledTask {
        let now = Utc::now();
        ScheduledTask {
            id: Uuid::new_v4(),
            user_id: user.to_string(),
            title: "t".to_string(),
            description: None,
            scheduled_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            scheduled_time: None,
            due_date: None,
            repeat_frequency: RepeatFrequency::None,
            notification_enabled: false,
            status,
            notification_handle: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_filter_matches() {
        let t = task("alice", "2024-05-10", TaskStatus::Upcoming);
        let cutoff = NaiveDate::from_ymd_opt(2024, 5, 11).unwrap();

        assert!(TaskFilter::all().matches(&t));
        assert!(TaskFilter::for_user("alice").matches(&t));
        assert!(!TaskFilter::for_user("bob").matches(&t));
        assert!(TaskFilter::all().scheduled_before(cutoff).matches(&t));
        assert!(!TaskFilter::all().scheduled_before(t.scheduled_date).matches(&t));
        assert!(!TaskFilter::all().with_status(TaskStatus::Missed).matches(&t));
    }

    #[tokio::test]
    async fn test_subscription_yields_current_then_changes() {
        let feed = SnapshotFeed::new();
        feed.publish(vec![task("alice", "2024-05-10", TaskStatus::Upcoming)]);

        let mut sub = feed.subscribe(TaskFilter::all());
        let first = sub.next().await.unwrap();
        assert_eq!(first.revision, 1);
        assert_eq!(first.len(), 1);

        feed.publish(vec![]);
        let second = sub.next().await.unwrap();
        assert_eq!(second.revision, 2);
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_subscription_applies_filter_to_each_snapshot() {
        let feed = SnapshotFeed::new();
        feed.publish(vec![
            task("alice", "2024-05-10", TaskStatus::Upcoming),
            task("bob", "2024-05-10", TaskStatus::Upcoming),
        ]);

        let mut sub = feed.subscribe(TaskFilter::for_user("bob"));
        let snapshot = sub.next().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.tasks[0].user_id, "bob");
    }

    #[tokio::test]
    async fn test_subscription_ends_when_feed_dropped() {
        let feed = SnapshotFeed::new();
        let mut sub = feed.subscribe(TaskFilter::all());
        assert!(sub.next().await.is_some());
        drop(feed);
        assert!(sub.next().await.is_none());
    }
}
