//! Bulk transfer: CSV export/import and SQL dump backup/restore.

use super::DatabaseClient;
use crate::core::db::{TransactionState, Value};
use crate::core::{DbClientError, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Text written to a CSV cell. NULL becomes an empty cell.
fn csv_field(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => format!("{:?}", f),
        Value::Text(t) => t.clone(),
        Value::Blob(b) => String::from_utf8_lossy(b).into_owned(),
    }
}

impl DatabaseClient {
    /// Writes `SELECT * FROM table` to `path`: a header of column names, then
    /// one record per row. Returns the number of rows written.
    pub fn export_to_csv(&mut self, table: &str, path: impl AsRef<Path>) -> Result<usize> {
        let result = self.backend.query(&format!("SELECT * FROM {}", table), &[])?;

        let mut writer = csv::Writer::from_path(path.as_ref())?;
        writer.write_record(&result.columns)?;
        for row in &result.rows {
            writer.write_record(row.iter().map(csv_field))?;
        }
        writer.flush()?;

        info!(
            "Exported {} rows from {} to {}",
            result.row_count(),
            table,
            path.as_ref().display()
        );
        Ok(result.row_count())
    }

    /// Inserts every record of the CSV file at `path` into `table`. The
    /// header row names the columns; every cell is inserted as text.
    pub fn import_from_csv(&mut self, table: &str, path: impl AsRef<Path>) -> Result<u64> {
        let mut reader = csv::Reader::from_path(path.as_ref())?;
        let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        let rows = reader
            .records()
            .map(|record| record.map(|r| r.iter().map(Value::from).collect::<Vec<_>>()))
            .collect::<csv::Result<Vec<_>>>()?;

        let columns: Vec<&str> = headers.iter().map(String::as_str).collect();
        let inserted = self.batch_insert(table, &columns, &rows)?;
        info!(
            "Imported {} rows into {} from {}",
            inserted,
            table,
            path.as_ref().display()
        );
        Ok(inserted)
    }

    /// Writes a SQL dump of the whole database, one statement per line.
    /// Only the embedded backend can produce one.
    pub fn backup_database(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let lines = self.backend.dump()?;

        let mut file = BufWriter::new(File::create(path.as_ref())?);
        for line in &lines {
            writeln!(file, "{}", line)?;
        }
        file.flush()?;

        info!("Backed up database to {} ({} statements)", path.as_ref().display(), lines.len());
        Ok(())
    }

    /// Runs the SQL script at `path`. Dumps carry their own
    /// `BEGIN`/`COMMIT`, so this is refused inside an explicit transaction.
    pub fn restore_database(&mut self, path: impl AsRef<Path>) -> Result<()> {
        if self.transaction_state == TransactionState::Transaction {
            return Err(DbClientError::Transaction(
                "cannot restore a backup inside an open transaction".to_string(),
            ));
        }
        let script = fs::read_to_string(path.as_ref())?;
        self.backend.run_script(&script)?;
        info!("Restored database from {}", path.as_ref().display());
        Ok(())
    }
}
