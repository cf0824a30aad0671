/// Query Result Module
///
/// Result containers returned by the backends, and statement classification
/// used to keep the facade's transaction state in sync with raw SQL.

use crate::core::db::value::{Row, Value};

/// Represents the result of a SQL query execution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Column names from the query result
    pub columns: Vec<String>,
    /// Rows of data, cells in column order
    pub rows: Vec<Row>,
}

impl QueryResult {
    /// Creates a new QueryResult from column names and row data
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        QueryResult { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// First cell of the first row, if any.
    pub fn first_value(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.first())
    }

    /// First cell of the first row as an integer; used for `COUNT(*)`.
    pub fn scalar_i64(&self) -> Option<i64> {
        self.first_value().and_then(Value::as_i64)
    }

    /// Consumes the result, keeping the first column of every row as text.
    pub fn into_first_column_strings(self) -> Vec<String> {
        self.rows
            .into_iter()
            .filter_map(|row| row.into_iter().next().and_then(Value::into_string))
            .collect()
    }
}

/// How a raw statement affects the facade's transaction state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatementType {
    /// BEGIN / START TRANSACTION
    Begin,
    /// COMMIT / END
    Commit,
    /// ROLLBACK (but not ROLLBACK TO SAVEPOINT)
    Rollback,
    /// Anything that leaves the transaction state alone
    Other,
}

impl StatementType {
    /// Determines the statement type from a SQL string
    pub fn from_sql(sql: &str) -> Self {
        let sql_upper = sql.trim().trim_end_matches(';').trim().to_uppercase();
        let first = sql_upper.split_whitespace().next().unwrap_or("");

        match first {
            "BEGIN" => StatementType::Begin,
            "START" if sql_upper.starts_with("START TRANSACTION") => StatementType::Begin,
            "COMMIT" | "END" => StatementType::Commit,
            "ROLLBACK" if !sql_upper.contains(" TO ") => StatementType::Rollback,
            _ => StatementType::Other,
        }
    }

    /// True for statements that open or close a transaction.
    pub fn is_transaction_control(&self) -> bool {
        !matches!(self, StatementType::Other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_type_classification() {
        assert_eq!(StatementType::from_sql("BEGIN"), StatementType::Begin);
        assert_eq!(StatementType::from_sql("begin transaction;"), StatementType::Begin);
        assert_eq!(StatementType::from_sql("START TRANSACTION"), StatementType::Begin);
        assert_eq!(StatementType::from_sql("COMMIT"), StatementType::Commit);
        assert_eq!(StatementType::from_sql("end"), StatementType::Commit);
        assert_eq!(StatementType::from_sql("ROLLBACK"), StatementType::Rollback);
        assert_eq!(StatementType::from_sql("ROLLBACK TO SAVEPOINT sp"), StatementType::Other);
        assert_eq!(StatementType::from_sql("START SLAVE"), StatementType::Other);
    }

    #[test]
    fn test_ordinary_statements_leave_transactions_alone() {
        for sql in [
            "SELECT * FROM users",
            "  with t as (select 1) select * from t",
            "INSERT INTO users VALUES (1, 'test')",
            "UPDATE users SET name = 'new'",
            "CREATE TABLE test (id INTEGER)",
            "PRAGMA foreign_keys = ON",
            "",
        ] {
            let statement = StatementType::from_sql(sql);
            assert_eq!(statement, StatementType::Other, "{:?}", sql);
            assert!(!statement.is_transaction_control());
        }
        assert!(StatementType::Begin.is_transaction_control());
        assert!(StatementType::Rollback.is_transaction_control());
    }

    #[test]
    fn test_scalar_helpers() {
        let result = QueryResult::new(vec!["count".to_string()], vec![vec![Value::Integer(3)]]);
        assert_eq!(result.scalar_i64(), Some(3));
        assert_eq!(result.row_count(), 1);

        let empty = QueryResult::default();
        assert_eq!(empty.first_value(), None);
        assert_eq!(empty.scalar_i64(), None);
    }

    #[test]
    fn test_first_column_strings() {
        let result = QueryResult::new(
            vec!["name".to_string()],
            vec![
                vec![Value::Text("a".to_string())],
                vec![Value::Text("b".to_string())],
            ],
        );
        assert_eq!(result.into_first_column_strings(), vec!["a", "b"]);
    }
}
