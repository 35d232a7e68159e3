//! SQLite implementation of the TaskStore.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{parse_datetime, parse_optional_date, parse_optional_time, parse_date, parse_uuid};
use crate::domain::dates::{format_date, format_time};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    NotificationHandle, RepeatFrequency, ScheduledTask, TaskDraft, TaskPatch, TaskStatus,
};
use crate::domain::ports::{SnapshotFeed, TaskFilter, TaskStore, TaskSubscription};

/// Result of applying one patch inside a transaction.
enum PatchOutcome {
    Applied,
    Missing,
    Stale(String),
}

/// `TaskStore` over a SQLite pool, publishing a fresh snapshot after every write.
#[derive(Clone)]
pub struct SqliteTaskStore {
    pool: SqlitePool,
    feed: Arc<SnapshotFeed>,
    refresh_lock: Arc<Mutex<()>>,
}

impl SqliteTaskStore {
    /// Store over an already migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            feed: Arc::new(SnapshotFeed::new()),
            refresh_lock: Arc::new(Mutex::new(())),
        }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Re-read the full table and publish it to subscribers.
    ///
    /// Serialized so a slow refresh can never publish over a newer one.
    async fn refresh(&self) -> DomainResult<()> {
        let _guard = self.refresh_lock.lock().await;
        let tasks = self.query(&TaskFilter::all()).await?;
        let revision = self.feed.publish(tasks);
        tracing::trace!(revision, "published task snapshot");
        Ok(())
    }

    /// Refresh after a committed write. The write already succeeded, so a
    /// failed refresh is logged rather than reported to the caller.
    async fn refresh_after_write(&self) {
        if let Err(e) = self.refresh().await {
            tracing::warn!(error = %e, "failed to publish task snapshot after write");
        }
    }

    async fn fetch_in(conn: &mut SqliteConnection, id: Uuid) -> DomainResult<Option<ScheduledTask>> {
        let row: Option<ScheduledTaskRow> = sqlx::query_as("SELECT * FROM scheduled_tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *conn)
            .await?;
        row.map(ScheduledTask::try_from).transpose()
    }

    async fn apply_patch(
        conn: &mut SqliteConnection,
        id: Uuid,
        patch: &TaskPatch,
        updated_at: &str,
    ) -> DomainResult<PatchOutcome> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE scheduled_tasks SET updated_at = ");
        qb.push_bind(updated_at.to_string());

        if let Some(ref title) = patch.title {
            qb.push(", title = ").push_bind(title.clone());
        }
        if let Some(ref description) = patch.description {
            qb.push(", description = ").push_bind(description.clone());
        }
        if let Some(date) = patch.scheduled_date {
            qb.push(", scheduled_date = ").push_bind(format_date(date));
        }
        if let Some(time) = patch.scheduled_time {
            qb.push(", scheduled_time = ").push_bind(time.map(format_time));
        }
        if let Some(due) = patch.due_date {
            qb.push(", due_date = ").push_bind(due.map(format_date));
        }
        if let Some(freq) = patch.repeat_frequency {
            qb.push(", repeat_frequency = ").push_bind(freq.as_str());
        }
        if let Some(enabled) = patch.notification_enabled {
            qb.push(", notification_enabled = ").push_bind(enabled);
        }
        if let Some(status) = patch.status {
            qb.push(", status = ").push_bind(status.as_str());
        }
        if let Some(ref handle) = patch.notification_handle {
            qb.push(", notification_handle = ")
                .push_bind(handle.as_ref().map(|h| h.as_str().to_string()));
        }

        qb.push(" WHERE id = ").push_bind(id.to_string());
        if let Some(expected) = patch.if_status {
            qb.push(" AND status = ").push_bind(expected.as_str());
        }

        let result = qb.build().execute(&mut *conn).await?;
        if result.rows_affected() > 0 {
            return Ok(PatchOutcome::Applied);
        }

        let current: Option<(String,)> = sqlx::query_as("SELECT status FROM scheduled_tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *conn)
            .await?;

        Ok(match current {
            None => PatchOutcome::Missing,
            Some((status,)) => PatchOutcome::Stale(status),
        })
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn create(&self, draft: &TaskDraft) -> DomainResult<ScheduledTask> {
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

        sqlx::query(
            r#"INSERT INTO scheduled_tasks (id, user_id, title, description, scheduled_date,
               scheduled_time, due_date, repeat_frequency, notification_enabled, status,
               notification_handle, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#
        )
        .bind(task.id.to_string())
        .bind(&task.user_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(format_date(task.scheduled_date))
        .bind(task.scheduled_time.map(format_time))
        .bind(task.due_date.map(format_date))
        .bind(task.repeat_frequency.as_str())
        .bind(task.notification_enabled)
        .bind(task.status.as_str())
        .bind(task.notification_handle.as_ref().map(|h| h.as_str().to_string()))
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.refresh_after_write().await;
        Ok(task)
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<ScheduledTask>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_in(&mut conn, id).await
    }

    async fn update(&self, id: Uuid, patch: &TaskPatch) -> DomainResult<ScheduledTask> {
        let updated_at = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        match Self::apply_patch(&mut tx, id, patch, &updated_at).await? {
            PatchOutcome::Applied => {}
            PatchOutcome::Missing => return Err(DomainError::TaskNotFound(id)),
            PatchOutcome::Stale(status) => {
                tracing::debug!(task_id = %id, current = %status, expected = ?patch.if_status, "status precondition failed");
                return Err(DomainError::ConcurrencyConflict {
                    entity: "scheduled task".to_string(),
                    id: id.to_string(),
                });
            }
        }

        let task = Self::fetch_in(&mut tx, id)
            .await?
            .ok_or(DomainError::TaskNotFound(id))?;
        tx.commit().await?;

        self.refresh_after_write().await;
        Ok(task)
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM scheduled_tasks WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::TaskNotFound(id));
        }

        self.refresh_after_write().await;
        Ok(())
    }

    async fn query(&self, filter: &TaskFilter) -> DomainResult<Vec<ScheduledTask>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM scheduled_tasks WHERE 1 = 1");

        if let Some(ref user_id) = filter.user_id {
            qb.push(" AND user_id = ").push_bind(user_id.clone());
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(before) = filter.scheduled_before {
            qb.push(" AND scheduled_date < ").push_bind(format_date(before));
        }
        if let Some(from) = filter.scheduled_from {
            qb.push(" AND scheduled_date >= ").push_bind(format_date(from));
        }
        qb.push(" ORDER BY scheduled_date ASC, scheduled_time ASC, created_at ASC");

        let rows: Vec<ScheduledTaskRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(ScheduledTask::try_from).collect()
    }

    async fn batch_update(&self, updates: &[(Uuid, TaskPatch)]) -> DomainResult<usize> {
        if updates.is_empty() {
            return Ok(0);
        }

        let updated_at = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;
        let mut applied = 0;

        for (id, patch) in updates {
            match Self::apply_patch(&mut tx, *id, patch, &updated_at).await? {
                PatchOutcome::Applied => applied += 1,
                // Dropping the transaction rolls back everything written so far.
                PatchOutcome::Missing => return Err(DomainError::TaskNotFound(*id)),
                PatchOutcome::Stale(status) => {
                    tracing::debug!(task_id = %id, current = %status, "skipping stale batch entry");
                }
            }
        }

        tx.commit().await?;

        if applied > 0 {
            self.refresh_after_write().await;
        }
        Ok(applied)
    }

    async fn subscribe(&self, filter: TaskFilter) -> DomainResult<TaskSubscription> {
        if self.feed.current().revision == 0 {
            self.refresh().await?;
        }
        Ok(self.feed.subscribe(filter))
    }
}

#[derive(sqlx::FromRow)]
struct ScheduledTaskRow {
    id: String,
    user_id: String,
    title: String,
    description: Option<String>,
    scheduled_date: String,
    scheduled_time: Option<String>,
    due_date: Option<String>,
    repeat_frequency: String,
    notification_enabled: bool,
    status: String,
    notification_handle: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ScheduledTaskRow> for ScheduledTask {
    type Error = DomainError;

    fn try_from(row: ScheduledTaskRow) -> Result<Self, Self::Error> {
        let status = TaskStatus::from_str(&row.status)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid status: {}", row.status)))?;

        let repeat_frequency = RepeatFrequency::from_str(&row.repeat_frequency).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid repeat frequency: {}", row.repeat_frequency))
        })?;

        Ok(ScheduledTask {
            id: parse_uuid(&row.id)?,
            user_id: row.user_id,
            title: row.title,
            description: row.description,
            scheduled_date: parse_date(&row.scheduled_date)?,
            scheduled_time: parse_optional_time(row.scheduled_time)?,
            due_date: parse_optional_date(row.due_date)?,
            repeat_frequency,
            notification_enabled: row.notification_enabled,
            status,
            notification_handle: row.notification_handle.map(NotificationHandle),
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use chrono::{NaiveDate, NaiveTime};

    async fn setup_test_store() -> SqliteTaskStore {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteTaskStore::new(pool)
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get_task() {
        let store = setup_test_store().await;
        let draft = TaskDraft::new("alice", "  Pay rent ", date("2024-06-01"))
            .with_time(NaiveTime::from_hms_opt(8, 30, 0).unwrap())
            .with_due_date(date("2024-06-05"))
            .with_repeat(RepeatFrequency::Monthly)
            .with_notification(true);

        let created = store.create(&draft).await.unwrap();
        assert_eq!(created.status, TaskStatus::Upcoming);
        assert_eq!(created.title, "Pay rent");

        let fetched = store.get(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.scheduled_time, NaiveTime::from_hms_opt(8, 30, 0));
        assert_eq!(fetched.due_date, Some(date("2024-06-05")));
        assert_eq!(fetched.repeat_frequency, RepeatFrequency::Monthly);
        assert!(fetched.notification_enabled);
    }

    #[tokio::test]
    async fn test_update_applies_partial_fields() {
        let store = setup_test_store().await;
        let created = store
            .create(&TaskDraft::new("alice", "Gym", date("2024-06-01")).with_due_date(date("2024-06-03")))
            .await
            .unwrap();

        let patch = TaskPatch {
            title: Some("Gym (legs)".to_string()),
            due_date: Some(None),
            notification_handle: Some(Some(NotificationHandle::new("n-42"))),
            ..TaskPatch::default()
        };
        let updated = store.update(created.id, &patch).await.unwrap();

        assert_eq!(updated.title, "Gym (legs)");
        assert_eq!(updated.due_date, None);
        assert_eq!(updated.scheduled_date, created.scheduled_date);
        assert_eq!(updated.notification_handle, Some(NotificationHandle::new("n-42")));
        assert!(updated.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn test_update_missing_task() {
        let store = setup_test_store().await;
        let result = store.update(Uuid::new_v4(), &TaskPatch::default()).await;
        assert!(matches!(result, Err(DomainError::TaskNotFound(_))));
    }

    #[tokio::test]
    async fn test_update_with_stale_precondition_conflicts() {
        let store = setup_test_store().await;
        let created = store.create(&TaskDraft::new("alice", "Call mom", date("2024-06-01"))).await.unwrap();

        let patch = TaskPatch::transition(TaskStatus::Missed, TaskStatus::Upcoming);
        let result = store.update(created.id, &patch).await;

        assert!(matches!(result, Err(DomainError::ConcurrencyConflict { .. })));
        let unchanged = store.get(created.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, TaskStatus::Upcoming);
    }

    #[tokio::test]
    async fn test_delete_task() {
        let store = setup_test_store().await;
        let created = store.create(&TaskDraft::new("alice", "Trash", date("2024-06-01"))).await.unwrap();

        store.delete(created.id).await.unwrap();
        assert!(store.get(created.id).await.unwrap().is_none());
        assert!(matches!(store.delete(created.id).await, Err(DomainError::TaskNotFound(_))));
    }

    #[tokio::test]
    async fn test_query_filters_and_orders() {
        let store = setup_test_store().await;
        store.create(&TaskDraft::new("alice", "Later", date("2024-06-10"))).await.unwrap();
        store.create(&TaskDraft::new("alice", "Sooner", date("2024-06-02"))).await.unwrap();
        store.create(&TaskDraft::new("bob", "Other", date("2024-06-01"))).await.unwrap();

        let alice = store.query(&TaskFilter::for_user("alice")).await.unwrap();
        let titles: Vec<_> = alice.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Sooner", "Later"]);

        let before = store
            .query(&TaskFilter::all().scheduled_before(date("2024-06-05")))
            .await
            .unwrap();
        assert_eq!(before.len(), 2);
    }

    #[tokio::test]
    async fn test_batch_update_is_all_or_nothing() {
        let store = setup_test_store().await;
        let a = store.create(&TaskDraft::new("alice", "A", date("2024-06-01"))).await.unwrap();

        let updates = vec![
            (a.id, TaskPatch::transition(TaskStatus::Upcoming, TaskStatus::Missed)),
            (Uuid::new_v4(), TaskPatch::transition(TaskStatus::Upcoming, TaskStatus::Missed)),
        ];
        let result = store.batch_update(&updates).await;

        assert!(matches!(result, Err(DomainError::TaskNotFound(_))));
        let a = store.get(a.id).await.unwrap().unwrap();
        assert_eq!(a.status, TaskStatus::Upcoming);
    }

    #[tokio::test]
    async fn test_batch_update_skips_stale_entries() {
        let store = setup_test_store().await;
        let a = store.create(&TaskDraft::new("alice", "A", date("2024-06-01"))).await.unwrap();
        let b = store.create(&TaskDraft::new("alice", "B", date("2024-06-01"))).await.unwrap();
        store
            .update(b.id, &TaskPatch::transition(TaskStatus::Upcoming, TaskStatus::Completed))
            .await
            .unwrap();

        let updates = vec![
            (a.id, TaskPatch::transition(TaskStatus::Upcoming, TaskStatus::Missed)),
            (b.id, TaskPatch::transition(TaskStatus::Upcoming, TaskStatus::Missed)),
        ];
        assert_eq!(store.batch_update(&updates).await.unwrap(), 1);
        assert_eq!(store.get(b.id).await.unwrap().unwrap().status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_subscription_receives_full_snapshots() {
        let store = setup_test_store().await;
        store.create(&TaskDraft::new("alice", "First", date("2024-06-01"))).await.unwrap();

        let mut sub = store.subscribe(TaskFilter::for_user("alice")).await.unwrap();
        let initial = sub.next().await.unwrap();
        assert_eq!(initial.len(), 1);

        store.create(&TaskDraft::new("alice", "Second", date("2024-06-02"))).await.unwrap();
        let next = sub.next().await.unwrap();
        assert_eq!(next.len(), 2);
        assert!(next.revision > initial.revision);
    }
}
