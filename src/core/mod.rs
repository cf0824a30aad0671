/// Core Module
///
/// Shared infrastructure for the database client: the error type and the
/// backend layer that the `DatabaseClient` facade is built on.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{DbClientError, Result};
