//! The `DatabaseClient` facade.
//!
//! One value owns one backend session for its whole lifetime and exposes the
//! same operations whichever engine sits underneath. Operations are grouped by
//! concern in the submodules; this file holds construction, teardown and
//! transaction control.
//!
//! Table names, column names and condition fragments are interpolated into
//! the SQL text exactly as given. Only parameter values are bound. Never build
//! those fragments from untrusted input.

mod accounts;
mod crud;
mod ddl;
mod introspection;
mod transfer;

pub use accounts::{hash_password, DEFAULT_ROLES};

use crate::core::db::{open_backend, Backend, BackendKind, ConnectOptions, TransactionState};
use crate::core::{DbClientError, Result};
use std::fmt;
use tracing::{debug, info, warn};

/// Savepoint used to make batches atomic inside a caller's transaction.
const BATCH_SAVEPOINT: &str = "dbclient_batch";

/// Uniform access to a SQLite, MariaDB or PostgreSQL database.
///
/// The session is released when the client is dropped, or explicitly through
/// [`DatabaseClient::close`] when the caller wants to observe close errors.
pub struct DatabaseClient {
    backend: Box<dyn Backend>,
    kind: BackendKind,
    transaction_state: TransactionState,
}

impl DatabaseClient {
    /// Connects using a backend kind literal: `sqlite`, `mariadb` or
    /// `postgresql`. Any other literal fails with a configuration error
    /// before a connection is attempted.
    pub fn new(kind: &str, options: ConnectOptions) -> Result<Self> {
        let kind: BackendKind = kind.parse()?;
        Self::connect(kind, options)
    }

    pub fn connect(kind: BackendKind, options: ConnectOptions) -> Result<Self> {
        let backend = open_backend(kind, &options)?;
        info!("DatabaseClient connected ({})", kind);
        Ok(Self::from_backend(backend))
    }

    /// Opens (or creates) an embedded database file.
    pub fn open_sqlite(path: impl Into<String>) -> Result<Self> {
        Self::connect(BackendKind::Sqlite, ConnectOptions::sqlite(path))
    }

    /// Opens a private in-memory embedded database.
    pub fn open_in_memory() -> Result<Self> {
        Self::open_sqlite(":memory:")
    }

    /// Wraps an already opened backend session.
    pub fn from_backend(backend: Box<dyn Backend>) -> Self {
        DatabaseClient {
            kind: backend.kind(),
            backend,
            transaction_state: TransactionState::Autocommit,
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn transaction_state(&self) -> TransactionState {
        self.transaction_state
    }

    /// Closes the session. An open transaction is rolled back by the server.
    pub fn close(self) -> Result<()> {
        if self.transaction_state == TransactionState::Transaction {
            warn!("Closing {} client with an open transaction", self.kind);
        }
        self.backend.close()
    }

    /// Starts an explicit transaction. Until it is committed or rolled back,
    /// no operation commits on its own.
    pub fn begin_transaction(&mut self) -> Result<()> {
        if self.transaction_state == TransactionState::Transaction {
            return Err(DbClientError::Transaction(
                "Transaction already in progress".to_string(),
            ));
        }
        self.backend.begin()?;
        self.transaction_state = TransactionState::Transaction;
        debug!("Transaction started");
        Ok(())
    }

    /// Commits the open transaction; a no-op in autocommit mode.
    pub fn commit_transaction(&mut self) -> Result<()> {
        if self.transaction_state == TransactionState::Autocommit {
            debug!("Commit requested with no open transaction");
            return Ok(());
        }
        self.backend.commit()?;
        self.transaction_state = TransactionState::Autocommit;
        debug!("Transaction committed");
        Ok(())
    }

    /// Rolls back the open transaction; a no-op in autocommit mode.
    pub fn rollback_transaction(&mut self) -> Result<()> {
        if self.transaction_state == TransactionState::Autocommit {
            debug!("Rollback requested with no open transaction");
            return Ok(());
        }
        self.transaction_state = TransactionState::Autocommit;
        self.backend.rollback()?;
        debug!("Transaction rolled back");
        Ok(())
    }

    /// Runs `op` so that all of its statements apply or none do.
    ///
    /// In autocommit mode this is a transaction of its own; inside a caller's
    /// transaction it is a savepoint, so a failure does not discard the
    /// caller's earlier work.
    fn atomically<T>(&mut self, op: impl FnOnce(&mut dyn Backend) -> Result<T>) -> Result<T> {
        match self.transaction_state {
            TransactionState::Autocommit => {
                self.backend.begin()?;
                match op(self.backend.as_mut()) {
                    Ok(value) => {
                        self.backend.commit()?;
                        Ok(value)
                    }
                    Err(e) => {
                        warn!("Batch failed, rolling back: {}", e);
                        if let Err(rollback_err) = self.backend.rollback() {
                            warn!("Rollback after failed batch also failed: {}", rollback_err);
                        }
                        Err(e)
                    }
                }
            }
            TransactionState::Transaction => {
                self.backend.savepoint(BATCH_SAVEPOINT)?;
                match op(self.backend.as_mut()) {
                    Ok(value) => {
                        self.backend.release_savepoint(BATCH_SAVEPOINT)?;
                        Ok(value)
                    }
                    Err(e) => {
                        warn!("Batch failed, rolling back to savepoint: {}", e);
                        let undo = self
                            .backend
                            .rollback_to_savepoint(BATCH_SAVEPOINT)
                            .and_then(|_| self.backend.release_savepoint(BATCH_SAVEPOINT));
                        if let Err(rollback_err) = undo {
                            warn!("Rollback to savepoint also failed: {}", rollback_err);
                        }
                        Err(e)
                    }
                }
            }
        }
    }
}

impl fmt::Debug for DatabaseClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseClient")
            .field("kind", &self.kind)
            .field("transaction_state", &self.transaction_state)
            .finish()
    }
}
