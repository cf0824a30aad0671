/// Database Module
///
/// The backend layer underneath the `DatabaseClient` facade, organized into
/// focused submodules.
///
/// ## Architecture
///
/// - **Connection Management** (`connection.rs`): backend selection, connection
///   options, transaction state and the `Backend` capability trait
/// - **Values** (`value.rs`): the cell type used for parameters and rows
/// - **Query Results** (`query.rs`): result containers and statement classification
/// - **Catalog** (`schema.rs`): per-engine introspection queries
/// - **Engines** (`sqlite.rs`, `postgres.rs`, `mysql.rs`): one `Backend` each
///
/// ## Error Handling
///
/// Every operation returns the crate-wide `DbClientError`; driver errors are
/// wrapped without being reinterpreted.
pub mod connection;
pub mod mysql;
pub mod postgres;
pub mod query;
pub mod schema;
pub mod sqlite;
pub mod value;

pub use connection::*;
pub use query::*;
pub use schema::*;
pub use value::*;
