/// Error Module
///
/// This module defines the error type shared by every backend and by the
/// `DatabaseClient` facade. Driver errors are carried unchanged so callers can
/// inspect the original failure.
use thiserror::Error;

/// Error type for the database client.
///
/// The variants fall into three groups:
/// - Configuration problems detected before any connection is opened
/// - Backend errors raised by one of the three drivers, passed through as-is
/// - Local failures (file I/O, CSV, TOML, value decoding, transaction misuse)
#[derive(Error, Debug)]
pub enum DbClientError {
    /// Unsupported backend kind or an invalid configuration file
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors raised by the embedded SQLite engine
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Errors raised by the PostgreSQL client
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] postgres::Error),

    /// Errors raised by the MariaDB/MySQL client
    #[error("MariaDB error: {0}")]
    MySql(#[from] mysql::Error),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reading and writing errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML configuration parse errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Transaction-related errors
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// A capability the selected backend does not provide
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// A driver value that has no `Value` representation
    #[error("Decode error: {0}")]
    Decode(String),
}

impl DbClientError {
    /// Returns true when the error came from one of the database drivers.
    pub fn is_backend(&self) -> bool {
        matches!(
            self,
            DbClientError::Sqlite(_) | DbClientError::Postgres(_) | DbClientError::MySql(_)
        )
    }
}

/// Type alias for Result to use DbClientError as the error type.
pub type Result<T> = std::result::Result<T, DbClientError>;
