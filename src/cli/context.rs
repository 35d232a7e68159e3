//! Wiring shared by every CLI command.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{database_url, initialize_database, PoolConfig, SqliteTaskStore};
use crate::adapters::LoggingNotificationScheduler;
use crate::cli::id_resolver::resolve_task_id;
use crate::domain::models::Config;
use crate::domain::ports::{Clock, NotificationScheduler, NullNotificationScheduler, SystemClock, TaskFilter};
use crate::services::{MissedTaskSweeper, RecurrenceGenerator, TaskLifecycleService};

/// Everything a command needs: config, database and the wired services.
pub struct AppContext {
    /// Loaded configuration
    pub config: Config,
    /// Database pool
    pub pool: SqlitePool,
    /// Task store over `pool`
    pub store: Arc<SqliteTaskStore>,
    /// System clock
    pub clock: Arc<dyn Clock>,
    /// Reminder scheduler
    pub notifier: Arc<dyn NotificationScheduler>,
    /// Generator built from the `recurrence` section
    pub generator: RecurrenceGenerator,
}

impl AppContext {
    /// Open the database and wire the services.
    pub async fn open(config: Config) -> Result<Self> {
        let url = database_url(&config.database.path);
        let pool = initialize_database(&url, Some(PoolConfig::from(&config.database)))
            .await
            .with_context(|| format!("Failed to open database at {}", config.database.path))?;

        Ok(Self {
            generator: RecurrenceGenerator::from_config(&config.recurrence),
            store: Arc::new(SqliteTaskStore::new(pool.clone())),
            clock: Arc::new(SystemClock),
            notifier: notifier_for(&config),
            pool,
            config,
        })
    }

    /// Lifecycle service with the configured cooldown and reminder time.
    pub fn lifecycle(&self) -> TaskLifecycleService<SqliteTaskStore> {
        TaskLifecycleService::from_config(
            self.store.clone(),
            self.clock.clone(),
            self.notifier.clone(),
            &self.config,
        )
    }

    /// Sweeper scoped to the configured user.
    pub fn sweeper(&self) -> MissedTaskSweeper<SqliteTaskStore> {
        MissedTaskSweeper::new(self.store.clone(), self.clock.clone()).for_user(self.config.user_id.clone())
    }

    /// Filter for the configured user's tasks.
    pub fn user_filter(&self) -> TaskFilter {
        TaskFilter::for_user(self.config.user_id.clone())
    }

    /// Reconcile stale tasks before reading, the way every data load does.
    pub async fn sweep_on_load(&self) -> usize {
        self.sweeper().sweep().await
    }

    /// Resolve a full id or unique prefix.
    pub async fn resolve(&self, id_or_prefix: &str) -> Result<Uuid> {
        resolve_task_id(&self.pool, id_or_prefix).await
    }
}

/// Reminders go through the logging scheduler unless the config turns them off.
fn notifier_for(config: &Config) -> Arc<dyn NotificationScheduler> {
    if config.notifications.enabled {
        Arc::new(LoggingNotificationScheduler::new())
    } else {
        tracing::debug!("reminders disabled by configuration");
        Arc::new(NullNotificationScheduler)
    }
}
