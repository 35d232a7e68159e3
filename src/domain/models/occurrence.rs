//! Calendar occurrences of scheduled tasks.
//!
//! An occurrence is either the stored task itself or a synthesized instance of
//! a repeating task on a later date. Virtual occurrences live only for the
//! duration of one aggregation pass and never reach the store.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::scheduled_task::{ScheduledTask, TaskStatus};
use crate::domain::errors::{DomainError, DomainResult};

/// Derived identity of an occurrence: source task id plus calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OccurrenceKey {
    /// Stored task the occurrence comes from
    pub source_id: Uuid,
    /// Calendar date
    pub date: NaiveDate,
}

impl fmt::Display for OccurrenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.source_id, self.date.format("%Y-%m-%d"))
    }
}

/// One calendar-date instance of a task.
#[derive(Debug, Clone, PartialEq)]
pub enum Occurrence {
    /// The stored record, on its own scheduled date.
    Persisted(Arc<ScheduledTask>),
    /// A generated repeat of `source` on `date`.
    Virtual {
        source: Arc<ScheduledTask>,
        date: NaiveDate,
    },
}

impl Occurrence {
    /// Occurrence for the stored record itself.
    pub fn persisted(task: Arc<ScheduledTask>) -> Self {
        Self::Persisted(task)
    }

    /// Generated repeat of `source` on `date`.
    pub fn virtual_on(source: Arc<ScheduledTask>, date: NaiveDate) -> Self {
        Self::Virtual { source, date }
    }

    /// The stored task this occurrence was derived from.
    pub fn source(&self) -> &ScheduledTask {
        match self {
            Self::Persisted(task) => task,
            Self::Virtual { source, .. } => source,
        }
    }

    /// Calendar date the occurrence falls on.
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::Persisted(task) => task.scheduled_date,
            Self::Virtual { date, .. } => *date,
        }
    }

    /// Identity of this occurrence.
    pub fn key(&self) -> OccurrenceKey {
        OccurrenceKey {
            source_id: self.source().id,
            date: self.date(),
        }
    }

    /// Status inherited from the source task.
    pub fn status(&self) -> TaskStatus {
        self.source().status
    }

    /// Whether this is a generated repeat.
    pub fn is_virtual(&self) -> bool {
        matches!(self, Self::Virtual { .. })
    }

    /// Id of the stored record this occurrence may be written through.
    ///
    /// Virtual occurrences are rejected so a synthesized instance can never be
    /// mistaken for a real record.
    pub fn writable_id(&self) -> DomainResult<Uuid> {
        match self {
            Self::Persisted(task) => Ok(task.id),
            Self::Virtual { source, date } => Err(DomainError::VirtualOccurrenceWrite {
                source_id: source.id,
                date: *date,
            }),
        }
    }

    /// Task content as it appears on this occurrence's date.
    pub fn to_task_view(&self) -> ScheduledTask {
        let mut task = self.source().clone();
        task.scheduled_date = self.date();
        task
    }
}
