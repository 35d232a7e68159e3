//! SQLite database adapters for the Almanac scheduling engine.

pub mod connection;
pub mod migrations;
pub mod task_store;

pub use connection::{
    create_pool, create_test_pool, database_url, verify_connection, ConnectionError, PoolConfig,
};
pub use migrations::{all_embedded_migrations, Migration, MigrationError, Migrator};
pub use task_store::SqliteTaskStore;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::dates;
use crate::domain::errors::{DomainError, DomainResult};

/// Parse a UUID string from a SQLite row field.
pub fn parse_uuid(s: &str) -> DomainResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| DomainError::SerializationError(e.to_string()))
}

/// Parse an RFC3339 datetime string from a SQLite row field.
pub fn parse_datetime(s: &str) -> DomainResult<DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map_err(|e| DomainError::SerializationError(e.to_string()))
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a `YYYY-MM-DD` date from a SQLite row field.
pub fn parse_date(s: &str) -> DomainResult<NaiveDate> {
    dates::parse_date(s).map_err(|e| DomainError::SerializationError(format!("date '{s}': {e}")))
}

/// Parse an optional `YYYY-MM-DD` date from a SQLite row field.
pub fn parse_optional_date(s: Option<String>) -> DomainResult<Option<NaiveDate>> {
    s.as_deref().map(parse_date).transpose()
}

/// Parse an optional `HH:MM` time from a SQLite row field.
pub fn parse_optional_time(s: Option<String>) -> DomainResult<Option<NaiveTime>> {
    s.map(|s| {
        dates::parse_time(&s).map_err(|e| DomainError::SerializationError(format!("time '{s}': {e}")))
    })
    .transpose()
}

/// Failures while opening and migrating the database.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Pool could not be opened
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
    /// A migration failed
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),
    /// A query failed
    #[error("Query error: {0}")]
    Query(#[from] sqlx::Error),
}

/// Open the pool, check it answers a query and apply pending migrations.
pub async fn initialize_database(database_url: &str, config: Option<PoolConfig>) -> Result<SqlitePool, DatabaseError> {
    let pool = create_pool(database_url, config).await?;
    verify_connection(&pool).await?;
    let migrator = Migrator::new(pool.clone());
    let applied = migrator.run_embedded_migrations(all_embedded_migrations()).await?;
    if applied > 0 {
        tracing::info!(applied, database_url, "database schema migrated");
    }
    Ok(pool)
}

/// Create an in-memory test pool with all migrations applied.
pub async fn create_migrated_test_pool() -> Result<SqlitePool, DatabaseError> {
    let pool = create_test_pool().await?;
    let migrator = Migrator::new(pool.clone());
    migrator.run_embedded_migrations(all_embedded_migrations()).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_row_fields() {
        assert_eq!(
            parse_date("2024-02-29").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert!(parse_date("2024-02-30").is_err());
        assert_eq!(parse_optional_time(None).unwrap(), None);
        assert_eq!(
            parse_optional_time(Some("07:45".to_string())).unwrap(),
            NaiveTime::from_hms_opt(7, 45, 0)
        );
        assert!(matches!(
            parse_uuid("not-a-uuid"),
            Err(DomainError::SerializationError(_))
        ));
    }
}
