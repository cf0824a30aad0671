//! Row-level operations: insert, update, delete, fetch and the small helpers
//! built on them.

use super::DatabaseClient;
use crate::core::db::{QueryResult, Row, StatementType, TransactionState, Value};
use crate::core::{DbClientError, Result};
use tracing::debug;

/// `?, ?, ?` with `count` markers.
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

pub(crate) fn insert_sql(table: &str, columns: &[&str], value_count: usize) -> String {
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders(value_count)
    )
}

/// Appends ` WHERE condition` unless the condition is empty.
pub(crate) fn with_condition(mut sql: String, condition: &str) -> String {
    if !condition.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(condition);
    }
    sql
}

impl DatabaseClient {
    /// Inserts one row. `values` are bound in `columns` order.
    pub fn insert(&mut self, table: &str, columns: &[&str], values: &[Value]) -> Result<u64> {
        let sql = insert_sql(table, columns, values.len());
        self.backend.execute(&sql, values)
    }

    /// Inserts many rows with one statement template. Either every row is
    /// inserted or none is.
    pub fn batch_insert(&mut self, table: &str, columns: &[&str], rows: &[Vec<Value>]) -> Result<u64> {
        if rows.is_empty() {
            debug!("batch_insert into {} with no rows", table);
            return Ok(0);
        }
        let sql = insert_sql(table, columns, columns.len());
        self.atomically(|backend| backend.execute_many(&sql, rows))
    }

    /// Deletes the rows matching `condition`.
    pub fn remove(&mut self, table: &str, condition: &str, params: &[Value]) -> Result<u64> {
        let sql = format!("DELETE FROM {} WHERE {}", table, condition);
        self.backend.execute(&sql, params)
    }

    /// `UPDATE table SET updates WHERE condition`; `params` bind to the SET
    /// fragment first, then to the condition.
    pub fn update(
        &mut self,
        table: &str,
        updates: &str,
        condition: &str,
        params: &[Value],
    ) -> Result<u64> {
        let sql = format!("UPDATE {} SET {} WHERE {}", table, updates, condition);
        self.backend.execute(&sql, params)
    }

    /// Returns every matching row; an empty `condition` selects all rows.
    pub fn fetch(
        &mut self,
        table: &str,
        columns: &[&str],
        condition: &str,
        params: &[Value],
    ) -> Result<Vec<Row>> {
        Ok(self.fetch_result(table, columns, condition, params)?.rows)
    }

    /// Like [`fetch`](Self::fetch) but keeps the column names.
    pub fn fetch_result(
        &mut self,
        table: &str,
        columns: &[&str],
        condition: &str,
        params: &[Value],
    ) -> Result<QueryResult> {
        let sql = with_condition(format!("SELECT {} FROM {}", columns.join(", "), table), condition);
        self.backend.query(&sql, params)
    }

    /// `column = column + amount` on the matching rows.
    pub fn add_value(
        &mut self,
        table: &str,
        column: &str,
        amount: impl Into<Value>,
        condition: &str,
        params: &[Value],
    ) -> Result<u64> {
        self.apply_delta(table, column, '+', amount.into(), condition, params)
    }

    /// `column = column - amount` on the matching rows.
    pub fn subtract_value(
        &mut self,
        table: &str,
        column: &str,
        amount: impl Into<Value>,
        condition: &str,
        params: &[Value],
    ) -> Result<u64> {
        self.apply_delta(table, column, '-', amount.into(), condition, params)
    }

    fn apply_delta(
        &mut self,
        table: &str,
        column: &str,
        op: char,
        amount: Value,
        condition: &str,
        params: &[Value],
    ) -> Result<u64> {
        let sql = format!(
            "UPDATE {0} SET {1} = {1} {2} ? WHERE {3}",
            table, column, op, condition
        );
        let mut bound = Vec::with_capacity(params.len() + 1);
        bound.push(amount);
        bound.extend_from_slice(params);
        self.backend.execute(&sql, &bound)
    }

    /// True when no row matches, or the first match holds NULL or `''`.
    pub fn is_field_empty(
        &mut self,
        table: &str,
        column: &str,
        condition: &str,
        params: &[Value],
    ) -> Result<bool> {
        let sql = with_condition(format!("SELECT {} FROM {}", column, table), condition);
        let result = self.backend.query(&sql, params)?;
        Ok(result.first_value().map_or(true, Value::is_empty))
    }

    /// `COUNT(*)` of the matching rows; an empty `condition` counts all rows.
    pub fn count_rows(&mut self, table: &str, condition: &str, params: &[Value]) -> Result<i64> {
        let sql = with_condition(format!("SELECT COUNT(*) FROM {}", table), condition);
        self.backend
            .query(&sql, params)?
            .scalar_i64()
            .ok_or_else(|| DbClientError::Decode(format!("COUNT(*) on {} returned no integer", table)))
    }

    /// Runs arbitrary SQL and returns whatever rows it produces.
    ///
    /// Transaction control statements are tracked, so `BEGIN` here behaves
    /// like [`begin_transaction`](Self::begin_transaction).
    pub fn execute_query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let statement = StatementType::from_sql(sql);
        if !statement.is_transaction_control() {
            return Ok(self.backend.query(sql, params)?.rows);
        }

        match (statement, self.transaction_state) {
            (StatementType::Begin, TransactionState::Transaction) => {
                return Err(DbClientError::Transaction(
                    "Transaction already in progress".to_string(),
                ));
            }
            (StatementType::Begin, TransactionState::Autocommit) => {
                self.backend.run_script(sql)?;
                self.transaction_state = TransactionState::Transaction;
            }
            (_, TransactionState::Autocommit) => {
                debug!("Ignoring {:?} with no open transaction", statement);
            }
            (StatementType::Commit, TransactionState::Transaction) => {
                self.backend.run_script(sql)?;
                self.transaction_state = TransactionState::Autocommit;
            }
            (_, TransactionState::Transaction) => {
                self.transaction_state = TransactionState::Autocommit;
                self.backend.run_script(sql)?;
            }
        }
        Ok(Vec::new())
    }
}
