//! Task board: an explicitly owned view of one user's tasks.
//!
//! The board consumes a store subscription in the background. Every snapshot
//! it receives is turned into a fresh `BoardState` (tasks, stats, calendar
//! index) that wholly replaces the previous one. Callers start the board,
//! read or watch its state, and shut it down when done.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ScheduledTask, TaskStatus};
use crate::domain::ports::{Clock, TaskFilter, TaskSnapshot, TaskStore};
use crate::services::calendar::CalendarIndex;
use crate::services::recurrence::RecurrenceGenerator;
use crate::services::sweeper::MissedTaskSweeper;

/// Counts over the stored tasks (generated repeats are not counted).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TaskStats {
    /// Stored tasks
    pub total: usize,
    /// Upcoming tasks
    pub upcoming: usize,
    /// Completed tasks
    pub completed: usize,
    /// Missed tasks
    pub missed: usize,
    /// Upcoming tasks whose date has passed but the sweeper hasn't caught yet
    pub overdue: usize,
    /// Completed over total, 0.0 when there are no tasks
    pub completion_rate: f64,
}

impl TaskStats {
    /// Tally `tasks` as of `today`.
    pub fn compute(tasks: &[ScheduledTask], today: NaiveDate) -> Self {
        let mut stats = Self {
            total: tasks.len(),
            ..Self::default()
        };
        for task in tasks {
            match task.status {
                TaskStatus::Upcoming => stats.upcoming += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Missed => stats.missed += 1,
            }
            if task.is_overdue(today) {
                stats.overdue += 1;
            }
        }
        if stats.total > 0 {
            stats.completion_rate = stats.completed as f64 / stats.total as f64;
        }
        stats
    }
}

/// Everything the board derives from one snapshot.
#[derive(Debug, Clone, Default)]
pub struct BoardState {
    /// Store revision this state was derived from; 0 before the first snapshot
    pub revision: u64,
    /// Tasks in canonical order
    pub tasks: Arc<Vec<ScheduledTask>>,
    /// Counts over `tasks`
    pub stats: TaskStats,
    /// Calendar index over `tasks`
    pub calendar: Arc<CalendarIndex>,
}

impl BoardState {
    fn derive(snapshot: &TaskSnapshot, generator: &RecurrenceGenerator, today: NaiveDate) -> Self {
        Self {
            revision: snapshot.revision,
            tasks: Arc::clone(&snapshot.tasks),
            stats: TaskStats::compute(&snapshot.tasks, today),
            calendar: Arc::new(CalendarIndex::build(snapshot.tasks.iter(), generator)),
        }
    }

    /// Whether a snapshot has arrived yet.
    pub fn is_loaded(&self) -> bool {
        self.revision > 0
    }
}

/// Live view over a store subscription. Start it, read from it, then shut it down.
pub struct TaskBoard {
    state: watch::Receiver<Arc<BoardState>>,
    shutdown: Option<oneshot::Sender<()>>,
    consumer: Option<JoinHandle<()>>,
}

impl TaskBoard {
    /// Subscribe to `store` and start deriving state.
    ///
    /// The first snapshot counts as the data load and triggers a sweep that
    /// runs on its own; its outcome arrives as a later snapshot.
    pub async fn start<S: TaskStore + 'static>(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        generator: RecurrenceGenerator,
        filter: TaskFilter,
    ) -> DomainResult<Self> {
        let mut subscription = store.subscribe(filter.clone()).await?;
        let mut sweeper = MissedTaskSweeper::new(store, Arc::clone(&clock));
        if let Some(ref user_id) = filter.user_id {
            sweeper = sweeper.for_user(user_id.clone());
        }

        let (state_tx, state_rx) = watch::channel(Arc::new(BoardState::default()));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let consumer = tokio::spawn(async move {
            let mut loaded = false;
            loop {
                let snapshot = tokio::select! {
                    _ = &mut shutdown_rx => break,
                    snapshot = subscription.next() => snapshot,
                };
                let Some(snapshot) = snapshot else {
                    tracing::debug!("task subscription closed");
                    break;
                };

                let state = BoardState::derive(&snapshot, &generator, clock.today());
                tracing::debug!(revision = state.revision, tasks = state.stats.total, "task board refreshed");
                state_tx.send_replace(Arc::new(state));

                if !loaded {
                    loaded = true;
                    let sweeper = sweeper.clone();
                    tokio::spawn(async move {
                        sweeper.sweep().await;
                    });
                }
            }
        });

        Ok(Self {
            state: state_rx,
            shutdown: Some(shutdown_tx),
            consumer: Some(consumer),
        })
    }

    /// Latest derived state.
    pub fn state(&self) -> Arc<BoardState> {
        Arc::clone(&self.state.borrow())
    }

    /// Receiver that wakes on every new state.
    pub fn watch(&self) -> watch::Receiver<Arc<BoardState>> {
        self.state.clone()
    }

    /// Wait until the state satisfies `predicate`. `None` once the board has stopped.
    pub async fn wait_for(&self, predicate: impl Fn(&BoardState) -> bool) -> Option<Arc<BoardState>> {
        let mut rx = self.state.clone();
        let state = rx.wait_for(|s| predicate(s.as_ref())).await.ok()?;
        Some(Arc::clone(&state))
    }

    /// Stop the background consumer and wait for it to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(consumer) = self.consumer.take() {
            if let Err(e) = consumer.await {
                tracing::warn!(error = %e, "task board consumer ended abnormally");
            }
        }
    }
}

impl Drop for TaskBoard {
    fn drop(&mut self) {
        if let Some(consumer) = self.consumer.take() {
            consumer.abort();
        }
    }
}
