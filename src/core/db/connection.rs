/// Connection Management Module
///
/// Backend selection, connection parameters, transaction state, and the
/// `Backend` capability trait that each supported engine implements once.

use crate::core::db::query::QueryResult;
use crate::core::db::schema::CatalogQueries;
use crate::core::db::value::Value;
use crate::core::{DbClientError, Result};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// The three supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Embedded file-based engine (rusqlite)
    Sqlite,
    /// MariaDB / MySQL server
    MariaDb,
    /// PostgreSQL server
    PostgreSql,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Sqlite => "sqlite",
            BackendKind::MariaDb => "mariadb",
            BackendKind::PostgreSql => "postgresql",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = DbClientError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sqlite" => Ok(BackendKind::Sqlite),
            "mariadb" => Ok(BackendKind::MariaDb),
            "postgresql" => Ok(BackendKind::PostgreSql),
            other => Err(DbClientError::Config(format!(
                "Unsupported database type '{}'. Supported types are 'sqlite', 'mariadb', and 'postgresql'.",
                other
            ))),
        }
    }
}

/// Connection parameters.
///
/// For the embedded backend only `database` is used, as a file path or
/// `:memory:`. A `port` of 0 selects the server's default port.
#[derive(Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl ConnectOptions {
    /// Options for an embedded database at `path`.
    pub fn sqlite(path: impl Into<String>) -> Self {
        ConnectOptions {
            database: path.into(),
            ..Default::default()
        }
    }

    /// Options for a client/server database.
    pub fn server(
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        ConnectOptions {
            host: host.into(),
            port,
            database: database.into(),
            user: user.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Represents database transaction states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionState {
    /// No active transaction (autocommit mode)
    #[default]
    Autocommit,
    /// Transaction in progress
    Transaction,
}

/// Capabilities a database engine exposes to the facade.
///
/// Every statement runs in the engine's autocommit mode unless `begin` has
/// been called. Parameter markers are always `?`; implementations translate
/// them if the engine uses another syntax.
pub trait Backend {
    fn kind(&self) -> BackendKind;

    /// Executes one statement and returns the number of affected rows.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Executes one statement template once per parameter row.
    fn execute_many(&mut self, sql: &str, rows: &[Vec<Value>]) -> Result<u64>;

    /// Executes a statement and collects every returned row.
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Runs a multi-statement script without parameters.
    fn run_script(&mut self, script: &str) -> Result<()>;

    /// Catalog query text for this engine.
    fn catalog(&self) -> &'static CatalogQueries;

    /// Produces a full textual SQL dump, one statement per entry.
    fn dump(&mut self) -> Result<Vec<String>> {
        Err(DbClientError::Unsupported(format!(
            "the {} backend cannot produce a SQL dump",
            self.kind()
        )))
    }

    fn begin(&mut self) -> Result<()> {
        self.run_script("BEGIN")
    }

    fn commit(&mut self) -> Result<()> {
        self.run_script("COMMIT")
    }

    fn rollback(&mut self) -> Result<()> {
        self.run_script("ROLLBACK")
    }

    fn savepoint(&mut self, name: &str) -> Result<()> {
        self.run_script(&format!("SAVEPOINT {}", name))
    }

    fn release_savepoint(&mut self, name: &str) -> Result<()> {
        self.run_script(&format!("RELEASE SAVEPOINT {}", name))
    }

    fn rollback_to_savepoint(&mut self, name: &str) -> Result<()> {
        self.run_script(&format!("ROLLBACK TO SAVEPOINT {}", name))
    }

    /// Closes the underlying session.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Opens a session for the given backend kind.
pub fn open_backend(kind: BackendKind, options: &ConnectOptions) -> Result<Box<dyn Backend>> {
    match kind {
        BackendKind::Sqlite => {
            let backend = super::sqlite::SqliteBackend::open(&options.database)?;
            Ok(Box::new(backend))
        }
        BackendKind::MariaDb => {
            let backend = super::mysql::MySqlBackend::connect(options)?;
            Ok(Box::new(backend))
        }
        BackendKind::PostgreSql => {
            let backend = super::postgres::PostgresBackend::connect(options)?;
            Ok(Box::new(backend))
        }
    }
}

/// Returns `Some(value)` unless the string is empty.
pub(crate) fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
