/// SQLite Backend
///
/// The embedded engine, driven through `rusqlite`. It is the only backend that
/// can produce a full SQL dump.

use crate::core::db::connection::{Backend, BackendKind};
use crate::core::db::query::QueryResult;
use crate::core::db::schema::{CatalogQueries, SQLITE_CATALOG};
use crate::core::db::value::{Row, Value};
use crate::core::{DbClientError, Result};
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection};
use std::time::Duration;
use tracing::{debug, info};

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = match self {
            Value::Null => ValueRef::Null,
            Value::Integer(i) => ValueRef::Integer(*i),
            Value::Real(f) => ValueRef::Real(*f),
            Value::Text(s) => ValueRef::Text(s.as_bytes()),
            Value::Blob(b) => ValueRef::Blob(b),
        };
        Ok(ToSqlOutput::Borrowed(value))
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    /// Opens the database file at `path`; empty or `:memory:` opens an
    /// in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = if path.is_empty() || path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        conn.busy_timeout(Duration::from_secs(5))?;
        info!("Opened SQLite database {:?}", path);
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        SqliteBackend { conn }
    }

    fn single_column(&self, sql: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

impl Backend for SqliteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        debug!("sqlite execute: {}", sql);
        let changed = self.conn.execute(sql, params_from_iter(params.iter()))?;
        Ok(changed as u64)
    }

    fn execute_many(&mut self, sql: &str, rows: &[Vec<Value>]) -> Result<u64> {
        debug!("sqlite execute_many ({} rows): {}", rows.len(), sql);
        let mut stmt = self.conn.prepare(sql)?;
        let mut changed = 0u64;
        for row in rows {
            changed += stmt.execute(params_from_iter(row.iter()))? as u64;
        }
        Ok(changed)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        debug!("sqlite query: {}", sql);
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let column_count = stmt.column_count();

        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                (0..column_count)
                    .map(|i| row.get_ref(i).map(Value::from))
                    .collect::<rusqlite::Result<Row>>()
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(QueryResult::new(columns, rows))
    }

    fn run_script(&mut self, script: &str) -> Result<()> {
        debug!("sqlite script ({} bytes)", script.len());
        self.conn.execute_batch(script)?;
        Ok(())
    }

    fn catalog(&self) -> &'static CatalogQueries {
        &SQLITE_CATALOG
    }

    /// Dumps schema and data as SQL text.
    ///
    /// Tables come first, each followed by its rows rendered with SQLite's own
    /// `quote()`, then indexes, triggers and views, then the AUTOINCREMENT
    /// counters. The whole dump is wrapped in one transaction.
    fn dump(&mut self) -> Result<Vec<String>> {
        let mut lines = vec!["BEGIN TRANSACTION;".to_string()];
        let mut sequence_lines = Vec::new();

        let tables: Vec<(String, String)> = {
            let mut stmt = self.conn.prepare(
                "SELECT name, sql FROM sqlite_master
                 WHERE sql IS NOT NULL AND type = 'table' ORDER BY name",
            )?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        for (name, create_sql) in tables {
            if name == "sqlite_sequence" {
                sequence_lines.push("DELETE FROM \"sqlite_sequence\";".to_string());
                sequence_lines.extend(self.single_column(
                    "SELECT 'INSERT INTO \"sqlite_sequence\" VALUES(' || quote(name) || ',' || seq || ');'
                     FROM sqlite_sequence",
                )?);
                continue;
            } else if name == "sqlite_stat1" {
                lines.push("ANALYZE \"sqlite_master\";".to_string());
            } else if name.starts_with("sqlite_") {
                continue;
            } else {
                lines.push(format!("{};", create_sql));
            }

            let ident = name.replace('"', "\"\"");
            let columns = self.single_column(&format!(
                "SELECT name FROM pragma_table_info('{}') ORDER BY cid",
                name.replace('\'', "''")
            ))?;
            let quoted = columns
                .iter()
                .map(|col| format!("'||quote(\"{}\")||'", col.replace('"', "\"\"")))
                .collect::<Vec<_>>()
                .join(",");
            let insert_sql = format!(
                "SELECT 'INSERT INTO \"{0}\" VALUES({1});' FROM \"{0}\"",
                ident, quoted
            );
            lines.extend(self.single_column(&insert_sql)?);
        }

        lines.extend(self.single_column(
            "SELECT sql || ';' FROM sqlite_master
             WHERE sql IS NOT NULL AND type IN ('index', 'trigger', 'view')",
        )?);
        lines.extend(sequence_lines);
        lines.push("COMMIT;".to_string());
        Ok(lines)
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, e)| DbClientError::Sqlite(e))?;
        info!("Closed SQLite database");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;

    fn setup_test_table(backend: &mut SqliteBackend) {
        backend
            .run_script(
                "
                CREATE TABLE accounts (id INTEGER PRIMARY KEY, name TEXT, balance REAL);
                INSERT INTO accounts VALUES (1, 'alice', 10.5);
                INSERT INTO accounts VALUES (2, 'o''brien', NULL);
                CREATE INDEX idx_accounts_name ON accounts (name);
            ",
            )
            .unwrap();
    }

    #[test]
    fn test_open_sets_busy_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("busy.db");
        let mut backend = SqliteBackend::open(&path.to_string_lossy()).unwrap();

        let result = backend.query("PRAGMA busy_timeout", &[]).unwrap();
        assert_eq!(result.scalar_i64(), Some(5000));
    }

    #[test]
    fn test_query_execution() {
        let mut backend = SqliteBackend::open(":memory:").unwrap();
        setup_test_table(&mut backend);

        let result = backend
            .query("SELECT * FROM accounts WHERE id >= ? ORDER BY id", &params![1])
            .unwrap();
        assert_eq!(result.columns, vec!["id", "name", "balance"]);
        assert_eq!(result.row_count(), 2);
        assert_eq!(
            result.rows[0],
            vec![Value::Integer(1), Value::Text("alice".to_string()), Value::Real(10.5)]
        );
        assert_eq!(result.rows[1][2], Value::Null);
    }

    #[test]
    fn test_execute_reports_changes() {
        let mut backend = SqliteBackend::open(":memory:").unwrap();
        setup_test_table(&mut backend);

        let changed = backend
            .execute("UPDATE accounts SET balance = ? WHERE name LIKE ?", &params![1.0, "%"])
            .unwrap();
        assert_eq!(changed, 2);
    }

    #[test]
    fn test_execute_many() {
        let mut backend = SqliteBackend::open(":memory:").unwrap();
        setup_test_table(&mut backend);

        let rows = vec![params![3, "carol", 1.0], params![4, "dave", 2.0]];
        let changed = backend
            .execute_many("INSERT INTO accounts (id, name, balance) VALUES (?, ?, ?)", &rows)
            .unwrap();
        assert_eq!(changed, 2);

        let count = backend.query("SELECT COUNT(*) FROM accounts", &[]).unwrap();
        assert_eq!(count.scalar_i64(), Some(4));
    }

    #[test]
    fn test_blob_round_trip() {
        let mut backend = SqliteBackend::open(":memory:").unwrap();
        backend.run_script("CREATE TABLE blobs (id INTEGER, data BLOB)").unwrap();
        backend
            .execute("INSERT INTO blobs VALUES (?, ?)", &params![1, b"Hello".to_vec()])
            .unwrap();

        let result = backend.query("SELECT data FROM blobs", &[]).unwrap();
        assert_eq!(result.first_value(), Some(&Value::Blob(b"Hello".to_vec())));
    }

    #[test]
    fn test_query_error_is_passed_through() {
        let mut backend = SqliteBackend::open(":memory:").unwrap();
        match backend.query("SELECT * FROM nonexistent_table", &[]) {
            Err(DbClientError::Sqlite(e)) => assert!(e.to_string().contains("no such table")),
            other => panic!("Expected SQLite error, got {:?}", other),
        }
    }

    #[test]
    fn test_dump_format() {
        let mut backend = SqliteBackend::open(":memory:").unwrap();
        setup_test_table(&mut backend);

        let dump = backend.dump().unwrap().join("\n");
        insta::assert_snapshot!(dump, @r###"
        BEGIN TRANSACTION;
        CREATE TABLE accounts (id INTEGER PRIMARY KEY, name TEXT, balance REAL);
        INSERT INTO "accounts" VALUES(1,'alice',10.5);
        INSERT INTO "accounts" VALUES(2,'o''brien',NULL);
        CREATE INDEX idx_accounts_name ON accounts (name);
        COMMIT;
        "###);
    }

    #[test]
    fn test_dump_includes_autoincrement_counters() {
        let mut backend = SqliteBackend::open(":memory:").unwrap();
        backend
            .run_script(
                "CREATE TABLE log (id INTEGER PRIMARY KEY AUTOINCREMENT, msg TEXT);
                 INSERT INTO log (msg) VALUES ('a'), ('b');",
            )
            .unwrap();

        let dump = backend.dump().unwrap();
        assert!(dump.contains(&"DELETE FROM \"sqlite_sequence\";".to_string()));
        assert!(dump.contains(&"INSERT INTO \"sqlite_sequence\" VALUES('log',2);".to_string()));
        assert_eq!(dump.last().map(String::as_str), Some("COMMIT;"));

        let mut restored = SqliteBackend::open(":memory:").unwrap();
        restored.run_script(&dump.join("\n")).unwrap();
        let rows = restored.query("SELECT msg FROM log ORDER BY id", &[]).unwrap();
        assert_eq!(rows.into_first_column_strings(), vec!["a", "b"]);
    }

    #[test]
    fn test_savepoint_rollback() {
        let mut backend = SqliteBackend::open(":memory:").unwrap();
        setup_test_table(&mut backend);

        backend.begin().unwrap();
        backend.savepoint("sp").unwrap();
        backend.execute("DELETE FROM accounts", &[]).unwrap();
        backend.rollback_to_savepoint("sp").unwrap();
        backend.release_savepoint("sp").unwrap();
        backend.commit().unwrap();

        let count = backend.query("SELECT COUNT(*) FROM accounts", &[]).unwrap();
        assert_eq!(count.scalar_i64(), Some(2));
    }
}
