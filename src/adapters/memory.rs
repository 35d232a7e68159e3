//! In-memory TaskStore.
//!
//! Holds every task in a map behind an async lock. Used by tests and by
//! callers that embed the engine without a database. Faults can be injected
//! so store failures are exercisable without a real outage.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ScheduledTask, TaskDraft, TaskPatch, TaskStatus};
use crate::domain::ports::{sort_tasks, SnapshotFeed, TaskFilter, TaskStore, TaskSubscription};

/// Map-backed `TaskStore` with fault injection for tests.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<Uuid, ScheduledTask>>,
    feed: SnapshotFeed,
    unavailable: AtomicBool,
    failing_writes: AtomicUsize,
    writes: AtomicUsize,
}

impl InMemoryTaskStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `tasks`, kept verbatim (ids, statuses and timestamps included).
    pub fn with_tasks(tasks: impl IntoIterator<Item = ScheduledTask>) -> Self {
        let tasks: Vec<ScheduledTask> = tasks.into_iter().collect();
        let store = Self {
            tasks: RwLock::new(tasks.iter().map(|t| (t.id, t.clone())).collect()),
            ..Self::default()
        };
        store.publish_from(tasks);
        store
    }

    /// Make every call fail until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Release);
    }

    /// Make the next `count` write calls fail without touching state.
    pub fn fail_next_writes(&self, count: usize) {
        self.failing_writes.store(count, Ordering::Release);
    }

    /// Number of write calls that reached the store, failed ones included.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Acquire)
    }

    /// Live subscriptions still attached to this store.
    pub fn subscriber_count(&self) -> usize {
        self.feed.subscriber_count()
    }

    fn check_available(&self) -> DomainResult<()> {
        if self.unavailable.load(Ordering::Acquire) {
            return Err(DomainError::Unavailable("in-memory store is offline".to_string()));
        }
        Ok(())
    }

    fn begin_write(&self) -> DomainResult<()> {
        self.writes.fetch_add(1, Ordering::AcqRel);
        self.check_available()?;
        let injected = self
            .failing_writes
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(DomainError::Unavailable("injected write failure".to_string()));
        }
        Ok(())
    }

    fn publish_from(&self, mut tasks: Vec<ScheduledTask>) {
        sort_tasks(&mut tasks);
        self.feed.publish(tasks);
    }

    fn publish(&self, tasks: &HashMap<Uuid, ScheduledTask>) {
        self.publish_from(tasks.values().cloned().collect());
    }

    fn precondition_holds(task: &ScheduledTask, patch: &TaskPatch) -> bool {
        patch.if_status.is_none_or(|expected| task.status == expected)
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(&self, draft: &TaskDraft) -> DomainResult<ScheduledTask> {
        self.begin_write()?;
        let now = Utc::now();
        let task = ScheduledTask {
            id: Uuid::new_v4(),
            user_id: draft.user_id.clone(),
            title: draft.title.trim().to_string(),
            description: draft.description.clone(),
            scheduled_date: draft.scheduled_date,
            scheduled_time: draft.scheduled_time,
            due_date: draft.due_date,
            repeat_frequency: draft.repeat_frequency,
            notification_enabled: draft.notification_enabled,
            status: TaskStatus::Upcoming,
            notification_handle: None,
            created_at: now,
            updated_at: now,
        };

        let mut tasks = self.tasks.write().await;
        tasks.insert(task.id, task.clone());
        self.publish(&tasks);
        Ok(task)
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<ScheduledTask>> {
        self.check_available()?;
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn update(&self, id: Uuid, patch: &TaskPatch) -> DomainResult<ScheduledTask> {
        self.begin_write()?;
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(&id).ok_or(DomainError::TaskNotFound(id))?;

        if !Self::precondition_holds(task, patch) {
            return Err(DomainError::ConcurrencyConflict {
                entity: "scheduled task".to_string(),
                id: id.to_string(),
            });
        }

        patch.apply(task);
        task.updated_at = Utc::now();
        let updated = task.clone();
        self.publish(&tasks);
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        self.begin_write()?;
        let mut tasks = self.tasks.write().await;
        tasks.remove(&id).ok_or(DomainError::TaskNotFound(id))?;
        self.publish(&tasks);
        Ok(())
    }

    async fn query(&self, filter: &TaskFilter) -> DomainResult<Vec<ScheduledTask>> {
        self.check_available()?;
        let mut matching: Vec<_> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        sort_tasks(&mut matching);
        Ok(matching)
    }

    async fn batch_update(&self, updates: &[(Uuid, TaskPatch)]) -> DomainResult<usize> {
        if updates.is_empty() {
            return Ok(0);
        }
        self.begin_write()?;
        let mut tasks = self.tasks.write().await;

        // Validate the whole batch before touching anything.
        if let Some((missing, _)) = updates.iter().find(|(id, _)| !tasks.contains_key(id)) {
            return Err(DomainError::TaskNotFound(*missing));
        }

        let now = Utc::now();
        let mut applied = 0;
        for (id, patch) in updates {
            if let Some(task) = tasks.get_mut(id) {
                if Self::precondition_holds(task, patch) {
                    patch.apply(task);
                    task.updated_at = now;
                    applied += 1;
                }
            }
        }

        if applied > 0 {
            self.publish(&tasks);
        }
        Ok(applied)
    }

    async fn subscribe(&self, filter: TaskFilter) -> DomainResult<TaskSubscription> {
        self.check_available()?;
        if self.feed.current().revision == 0 {
            let tasks = self.tasks.read().await;
            self.publish(&tasks);
        }
        Ok(self.feed.subscribe(filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn test_injected_failure_leaves_state_untouched() {
        let store = InMemoryTaskStore::new();
        let task = store.create(&TaskDraft::new("u", "Water plants", date("2024-05-01"))).await.unwrap();

        store.fail_next_writes(1);
        let result = store
            .update(task.id, &TaskPatch::transition(TaskStatus::Upcoming, TaskStatus::Completed))
            .await;
        assert!(matches!(result, Err(DomainError::Unavailable(_))));
        assert_eq!(store.get(task.id).await.unwrap().unwrap().status, TaskStatus::Upcoming);

        // The fault is consumed after one write.
        store
            .update(task.id, &TaskPatch::transition(TaskStatus::Upcoming, TaskStatus::Completed))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_batch_rejects_unknown_id_before_applying() {
        let store = InMemoryTaskStore::new();
        let task = store.create(&TaskDraft::new("u", "A", date("2024-05-01"))).await.unwrap();

        let updates = vec![
            (task.id, TaskPatch::transition(TaskStatus::Upcoming, TaskStatus::Missed)),
            (Uuid::new_v4(), TaskPatch::transition(TaskStatus::Upcoming, TaskStatus::Missed)),
        ];
        assert!(matches!(store.batch_update(&updates).await, Err(DomainError::TaskNotFound(_))));
        assert_eq!(store.get(task.id).await.unwrap().unwrap().status, TaskStatus::Upcoming);
    }

    #[tokio::test]
    async fn test_unavailable_store_rejects_reads() {
        let store = InMemoryTaskStore::new();
        store.set_unavailable(true);
        assert!(store.query(&TaskFilter::all()).await.is_err());
        store.set_unavailable(false);
        assert!(store.query(&TaskFilter::all()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_seeded_tasks_are_published() {
        let store = InMemoryTaskStore::new();
        let task = store.create(&TaskDraft::new("u", "Seed", date("2024-05-01"))).await.unwrap();

        let seeded = InMemoryTaskStore::with_tasks(vec![task.clone()]);
        let mut sub = seeded.subscribe(TaskFilter::all()).await.unwrap();
        let snapshot = sub.next().await.unwrap();
        assert_eq!(snapshot.tasks[0].id, task.id);
    }
}
