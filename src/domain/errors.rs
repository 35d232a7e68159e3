//! Domain errors for the Almanac scheduling engine.

use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;
use uuid::Uuid;

/// Generic message shown to users when the store fails underneath an operation.
pub const STORE_FAILURE_MESSAGE: &str = "Something went wrong while saving. Please try again.";

/// Input rejected before any store call is made.
///
/// Rules are evaluated in a fixed order and the first failure wins, so a
/// caller only ever sees one of these at a time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Title is empty or whitespace only.
    #[error("Title cannot be empty")]
    EmptyTitle,

    /// Scheduled date lies before today.
    #[error("Scheduled date {scheduled} is in the past (today is {today})")]
    PastDate {
        /// Requested date
        scheduled: NaiveDate,
        /// Clock's current date
        today: NaiveDate,
    },

    /// Scheduled for today at a time strictly before now.
    #[error("Scheduled time {} has already passed today (now {})", .time.format("%H:%M"), .now.format("%H:%M"))]
    PastTime {
        /// Requested time of day
        time: NaiveTime,
        /// Clock's current time of day
        now: NaiveTime,
    },

    /// Due date lies before the scheduled date.
    #[error("Due date {due} is before scheduled date {scheduled}")]
    DueBeforeScheduled {
        /// Requested due date
        due: NaiveDate,
        /// Scheduled date it must not precede
        scheduled: NaiveDate,
    },
}

/// Domain-level errors that can occur in the engine.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Input failed validation; nothing was written.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No task with this id exists.
    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    /// The requested status change is not allowed from the current status.
    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        /// Current status
        from: String,
        /// Requested status
        to: String,
        /// Why the move was refused
        reason: String,
    },

    /// A status precondition no longer held when the write landed.
    #[error("Concurrency conflict: {entity} {id} was modified")]
    ConcurrencyConflict {
        /// Kind of record
        entity: String,
        /// Record id
        id: String,
    },

    /// A previous submission has not finished or is still cooling down.
    #[error("Another operation is still in flight; try again shortly")]
    OperationInFlight,

    /// Writes addressed a generated repeat rather than a stored task.
    #[error("Occurrence of task {source_id} on {date} is virtual and cannot be written")]
    VirtualOccurrenceWrite {
        /// Task the occurrence was generated from
        source_id: Uuid,
        /// Calendar date of the occurrence
        date: NaiveDate,
    },

    /// Underlying database failure.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Row or payload could not be decoded.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The store cannot be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result alias used across the domain, services and adapters.
pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Whether the failure came from the underlying store rather than the caller's input.
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            Self::DatabaseError(_) | Self::SerializationError(_) | Self::Unavailable(_)
        )
    }

    /// Message suitable for showing to an end user.
    ///
    /// Validation and lookup failures are surfaced verbatim; store failures
    /// collapse into a single retryable message.
    pub fn user_message(&self) -> String {
        if self.is_store_failure() {
            STORE_FAILURE_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
