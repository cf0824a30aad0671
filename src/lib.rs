//! `dbclient` wraps SQLite, MariaDB and PostgreSQL behind one facade,
//! [`DatabaseClient`], with DDL, CRUD, catalog introspection, CSV transfer,
//! SQL dump backups and a small user/permission/audit layer.
//!
//! ```
//! use dbclient::{params, DatabaseClient};
//!
//! let mut client = DatabaseClient::open_in_memory()?;
//! client.create_table("accounts", &[("id", "INTEGER PRIMARY KEY"), ("balance", "INTEGER")])?;
//! client.insert("accounts", &["id", "balance"], &params![1, 10])?;
//! client.add_value("accounts", "balance", 5, "id = ?", &params![1])?;
//! assert_eq!(client.fetch("accounts", &["balance"], "", &[])?, vec![params![15]]);
//! # Ok::<(), dbclient::DbClientError>(())
//! ```

// Core infrastructure modules
pub mod core;

// Feature modules
pub mod client;
pub mod config;

pub use crate::client::DatabaseClient;
pub use crate::core::db::{BackendKind, ConnectOptions, QueryResult, Row, TransactionState, Value};
pub use crate::core::{DbClientError, Result};
