//! Table and index DDL. Names and type strings are used verbatim.

use super::DatabaseClient;
use crate::core::Result;

impl DatabaseClient {
    /// `CREATE TABLE IF NOT EXISTS name (col type, ...)`.
    pub fn create_table(&mut self, name: &str, columns: &[(&str, &str)]) -> Result<()> {
        let columns = columns
            .iter()
            .map(|(column, ty)| format!("{} {}", column, ty))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("CREATE TABLE IF NOT EXISTS {} ({})", name, columns);
        self.backend.execute(&sql, &[])?;
        Ok(())
    }

    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        self.backend.execute(&format!("DROP TABLE IF EXISTS {}", name), &[])?;
        Ok(())
    }

    /// Deletes every row but keeps the table.
    pub fn clear_table(&mut self, name: &str) -> Result<u64> {
        self.backend.execute(&format!("DELETE FROM {}", name), &[])
    }

    pub fn create_index(&mut self, index_name: &str, table: &str, columns: &[&str]) -> Result<()> {
        let sql = format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
            index_name,
            table,
            columns.join(", ")
        );
        self.backend.execute(&sql, &[])?;
        Ok(())
    }

    pub fn drop_index(&mut self, index_name: &str) -> Result<()> {
        self.backend
            .execute(&format!("DROP INDEX IF EXISTS {}", index_name), &[])?;
        Ok(())
    }

    /// Not idempotent: fails if the column already exists.
    pub fn alter_table_add_column(&mut self, table: &str, column: &str, ty: &str) -> Result<()> {
        let sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, ty);
        self.backend.execute(&sql, &[])?;
        Ok(())
    }
}
