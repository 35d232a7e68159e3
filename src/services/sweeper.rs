//! Missed-task sweeper and its periodic daemon.
//!
//! A sweep reads every upcoming task scheduled before today and moves them
//! all to missed in one atomic batch. Each batch entry carries an
//! `upcoming` precondition, so a concurrent or repeated sweep finds nothing
//! left to do and reports 0.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::domain::errors::DomainResult;
use crate::domain::models::{SweeperConfig, TaskPatch, TaskStatus};
use crate::domain::ports::{Clock, TaskFilter, TaskStore};

/// Moves upcoming tasks scheduled before today to missed.
pub struct MissedTaskSweeper<S: TaskStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    user_id: Option<String>,
}

impl<S: TaskStore> Clone for MissedTaskSweeper<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            user_id: self.user_id.clone(),
        }
    }
}

impl<S: TaskStore> MissedTaskSweeper<S> {
    /// Sweeper over every user's tasks.
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            user_id: None,
        }
    }

    /// Restrict sweeps to one owner's tasks.
    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Sweep and report how many tasks moved to missed.
    ///
    /// Failures are logged and reported as 0; the next sweep retries.
    pub async fn sweep(&self) -> usize {
        match self.try_sweep().await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, "missed-task sweep failed");
                0
            }
        }
    }

    /// Sweep and propagate store failures.
    pub async fn try_sweep(&self) -> DomainResult<usize> {
        let today = self.clock.today();
        let filter = TaskFilter {
            user_id: self.user_id.clone(),
            ..TaskFilter::all()
        }
        .with_status(TaskStatus::Upcoming)
        .scheduled_before(today);

        let overdue = self.store.query(&filter).await?;
        if overdue.is_empty() {
            tracing::debug!(%today, "no overdue tasks");
            return Ok(0);
        }

        let updates: Vec<_> = overdue
            .iter()
            // The store filter already did this; re-check in case a store ignores it.
            .filter(|t| t.is_overdue(today))
            .map(|t| (t.id, TaskPatch::transition(TaskStatus::Upcoming, TaskStatus::Missed)))
            .collect();

        let count = self.store.batch_update(&updates).await?;
        if count > 0 {
            tracing::info!(count, %today, "marked overdue tasks as missed");
        }
        Ok(count)
    }
}

/// Daemon timing.
#[derive(Debug, Clone)]
pub struct SweeperDaemonConfig {
    /// Time between sweeps
    pub interval: Duration,
    /// Sweep once immediately on start
    pub run_on_startup: bool,
}

impl Default for SweeperDaemonConfig {
    fn default() -> Self {
        Self::from(&SweeperConfig::default())
    }
}

impl From<&SweeperConfig> for SweeperDaemonConfig {
    fn from(config: &SweeperConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs.max(1)),
            run_on_startup: config.run_on_startup,
        }
    }
}

/// Progress reported by a running daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweeperEvent {
    /// Loop entered
    Started,
    /// A sweep finished
    SweepCompleted {
        /// 1-based run counter
        run_number: u64,
        /// Tasks moved to missed
        transitioned: usize,
        /// Wall time of the sweep
        duration_ms: u64,
    },
    /// A sweep failed; the loop keeps going
    SweepFailed {
        /// 1-based run counter
        run_number: u64,
        /// Store error message
        error: String,
    },
    /// Loop exited
    Stopped,
}

/// Running totals kept by the daemon.
#[derive(Debug, Clone, Default)]
pub struct SweeperStatus {
    /// Whether the loop is active
    pub running: bool,
    /// Sweeps attempted
    pub total_runs: u64,
    /// Sweeps that succeeded
    pub successful_runs: u64,
    /// Sweeps that failed
    pub failed_runs: u64,
    /// Tasks moved to missed across all runs
    pub total_transitioned: u64,
    /// When the last sweep finished
    pub last_run: Option<Instant>,
}

/// Control handle for a running daemon.
#[derive(Clone)]
pub struct SweeperHandle {
    stop_flag: Arc<AtomicBool>,
    wake: Arc<tokio::sync::Notify>,
    status: Arc<RwLock<SweeperStatus>>,
}

impl SweeperHandle {
    /// Ask the daemon to stop after the current sweep.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    /// Whether `stop` has been called.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_flag.load(Ordering::Acquire)
    }

    /// Copy of the current totals.
    pub async fn status(&self) -> SweeperStatus {
        self.status.read().await.clone()
    }
}

/// Runs the sweeper on a timer until stopped. Failed sweeps are counted and
/// never stop the loop.
pub struct SweeperDaemon<S: TaskStore + 'static> {
    sweeper: MissedTaskSweeper<S>,
    config: SweeperDaemonConfig,
    status: Arc<RwLock<SweeperStatus>>,
    stop_flag: Arc<AtomicBool>,
    wake: Arc<tokio::sync::Notify>,
}

impl<S: TaskStore + 'static> SweeperDaemon<S> {
    /// Daemon that has not started yet.
    pub fn new(sweeper: MissedTaskSweeper<S>, config: SweeperDaemonConfig) -> Self {
        Self {
            sweeper,
            config,
            status: Arc::new(RwLock::new(SweeperStatus::default())),
            stop_flag: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(tokio::sync::Notify::new()),
        }
    }

    /// Handle for stopping and inspecting the daemon.
    pub fn handle(&self) -> SweeperHandle {
        SweeperHandle {
            stop_flag: self.stop_flag.clone(),
            wake: self.wake.clone(),
            status: self.status.clone(),
        }
    }

    /// Spawn the loop, returning a channel of daemon events.
    pub fn run(self) -> mpsc::Receiver<SweeperEvent> {
        let (tx, rx) = mpsc::channel(100);
        tokio::spawn(async move {
            self.run_loop(tx).await;
        });
        rx
    }

    async fn run_loop(self, tx: mpsc::Sender<SweeperEvent>) {
        self.status.write().await.running = true;
        let _ = tx.send(SweeperEvent::Started).await;

        let mut timer = interval(self.config.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        timer.tick().await;

        if self.config.run_on_startup {
            self.run_cycle(&tx).await;
        }

        loop {
            tokio::select! {
                _ = timer.tick() => {}
                _ = self.wake.notified() => {}
            }
            if self.stop_flag.load(Ordering::Acquire) {
                break;
            }
            self.run_cycle(&tx).await;
        }

        self.status.write().await.running = false;
        tracing::info!("sweeper daemon stopped");
        let _ = tx.send(SweeperEvent::Stopped).await;
    }

    async fn run_cycle(&self, tx: &mpsc::Sender<SweeperEvent>) {
        let run_number = {
            let mut status = self.status.write().await;
            status.total_runs += 1;
            status.total_runs
        };

        let start = Instant::now();
        let result = self.sweeper.try_sweep().await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let event = {
            let mut status = self.status.write().await;
            status.last_run = Some(Instant::now());
            match result {
                Ok(transitioned) => {
                    status.successful_runs += 1;
                    status.total_transitioned += transitioned as u64;
                    SweeperEvent::SweepCompleted { run_number, transitioned, duration_ms }
                }
                Err(e) => {
                    status.failed_runs += 1;
                    tracing::warn!(run_number, error = %e, "scheduled sweep failed");
                    SweeperEvent::SweepFailed { run_number, error: e.to_string() }
                }
            }
        };
        let _ = tx.send(event).await;
    }
}
