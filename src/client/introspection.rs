//! Live catalog lookups. Nothing is cached; each call asks the engine.

use super::DatabaseClient;
use crate::core::db::Value;
use crate::core::{DbClientError, Result};

impl DatabaseClient {
    pub fn table_exists(&mut self, table: &str) -> Result<bool> {
        let sql = self.backend.catalog().table_exists;
        self.catalog_count(sql, &[Value::from(table)]).map(|n| n > 0)
    }

    pub fn column_exists(&mut self, table: &str, column: &str) -> Result<bool> {
        let sql = self.backend.catalog().column_exists;
        self.catalog_count(sql, &[Value::from(table), Value::from(column)])
            .map(|n| n > 0)
    }

    /// User tables, sorted by name.
    pub fn list_tables(&mut self) -> Result<Vec<String>> {
        let sql = self.backend.catalog().list_tables;
        Ok(self.backend.query(sql, &[])?.into_first_column_strings())
    }

    /// Column names in declaration order.
    pub fn list_columns(&mut self, table: &str) -> Result<Vec<String>> {
        let sql = self.backend.catalog().list_columns;
        Ok(self
            .backend
            .query(sql, &[Value::from(table)])?
            .into_first_column_strings())
    }

    fn catalog_count(&mut self, sql: &str, params: &[Value]) -> Result<i64> {
        self.backend
            .query(sql, params)?
            .scalar_i64()
            .ok_or_else(|| DbClientError::Decode("catalog count returned no integer".to_string()))
    }
}
