//! Infrastructure adapters for external systems.

pub mod memory;
pub mod notifications;
pub mod sqlite;

pub use memory::InMemoryTaskStore;
pub use notifications::LoggingNotificationScheduler;
pub use sqlite::SqliteTaskStore;
