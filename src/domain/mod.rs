//! Domain layer for the Almanac scheduling engine
//!
//! Pure models, shared date utilities, errors, and the port traits that
//! adapters implement.

pub mod dates;
pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult, ValidationError};
