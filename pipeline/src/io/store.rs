//! Destination storage behind a capability trait.
//!
//! The [`Storage`] trait decouples agents from the actual destination backend
//! (currently embedded SQLite). Tests use recording fakes that capture rows
//! without a database. A [`StorageConnection`] is scoped to one run and owned
//! by it, so the connection closes on every exit path when it drops.

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, params_from_iter};
use thiserror::Error;
use tracing::debug;

use crate::core::table::{TableRef, is_valid_identifier};

/// Destination store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The destination could not be reached. The only retryable variant.
    #[error("destination unavailable: {0}")]
    Unavailable(String),
    #[error("column name '{0}' is not a valid identifier")]
    InvalidColumn(String),
    #[error("row has {found} fields but the table has {expected} columns")]
    RowShape { expected: usize, found: usize },
    #[error("unknown table {0}")]
    UnknownTable(String),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// One open destination connection.
pub trait StorageConnection {
    /// Create the table if missing, with TEXT columns in `columns` order.
    fn ensure_table(&mut self, table: &TableRef, columns: &[String]) -> Result<(), StoreError>;
    /// Insert `rows` as one all-or-nothing transaction. Empty fields land as
    /// SQL NULL. Any error rolls the whole chunk back.
    fn insert_rows(
        &mut self,
        table: &TableRef,
        columns: &[String],
        rows: &[Vec<String>],
    ) -> Result<(), StoreError>;
    fn count_rows(&self, table: &TableRef) -> Result<u64, StoreError>;
    fn count_non_null(&self, table: &TableRef, column: &str) -> Result<u64, StoreError>;
    fn count_distinct(&self, table: &TableRef, column: &str) -> Result<u64, StoreError>;
    fn column_names(&self, table: &TableRef) -> Result<Vec<String>, StoreError>;
}

/// Factory for destination connections.
pub trait Storage {
    fn connect(&self) -> Result<Box<dyn StorageConnection>, StoreError>;
}

/// Embedded SQLite destination.
///
/// The destination has no schema namespaces, so a `schema.table` reference
/// maps to a single quoted table name (`"raw.patients"`).
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    path: PathBuf,
}

impl SqliteStorage {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl Storage for SqliteStorage {
    fn connect(&self) -> Result<Box<dyn StorageConnection>, StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }
        let conn =
            Connection::open(&self.path).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        debug!(path = %self.path.display(), "destination connection opened");
        Ok(Box::new(SqliteConnection { conn }))
    }
}

struct SqliteConnection {
    conn: Connection,
}

impl StorageConnection for SqliteConnection {
    fn ensure_table(&mut self, table: &TableRef, columns: &[String]) -> Result<(), StoreError> {
        let cols = columns
            .iter()
            .map(|name| Ok(format!("{} TEXT", quoted_column(name)?)))
            .collect::<Result<Vec<_>, StoreError>>()?;
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quoted_table(table),
            cols.join(", ")
        );
        self.conn.execute(&sql, [])?;
        Ok(())
    }

    fn insert_rows(
        &mut self,
        table: &TableRef,
        columns: &[String],
        rows: &[Vec<String>],
    ) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }
        let column_list = columns
            .iter()
            .map(|name| quoted_column(name))
            .collect::<Result<Vec<_>, StoreError>>()?
            .join(", ");
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quoted_table(table),
            column_list,
            placeholders
        );

        // Dropping the transaction without commit rolls the chunk back.
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in rows {
                if row.len() != columns.len() {
                    return Err(StoreError::RowShape {
                        expected: columns.len(),
                        found: row.len(),
                    });
                }
                stmt.execute(params_from_iter(row.iter().map(|field| {
                    if field.is_empty() {
                        None
                    } else {
                        Some(field.as_str())
                    }
                })))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn count_rows(&self, table: &TableRef) -> Result<u64, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", quoted_table(table));
        let count: u64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count)
    }

    fn count_non_null(&self, table: &TableRef, column: &str) -> Result<u64, StoreError> {
        let sql = format!(
            "SELECT COUNT({}) FROM {}",
            quoted_column(column)?,
            quoted_table(table)
        );
        let count: u64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count)
    }

    fn count_distinct(&self, table: &TableRef, column: &str) -> Result<u64, StoreError> {
        let sql = format!(
            "SELECT COUNT(DISTINCT {}) FROM {}",
            quoted_column(column)?,
            quoted_table(table)
        );
        let count: u64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count)
    }

    fn column_names(&self, table: &TableRef) -> Result<Vec<String>, StoreError> {
        let sql = format!("PRAGMA table_info({})", quoted_table(table));
        let mut stmt = self.conn.prepare(&sql)?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        if names.is_empty() {
            return Err(StoreError::UnknownTable(table.qualified()));
        }
        Ok(names)
    }
}

fn quoted_table(table: &TableRef) -> String {
    format!("\"{}\"", table.qualified())
}

fn quoted_column(name: &str) -> Result<String, StoreError> {
    if !is_valid_identifier(name) {
        return Err(StoreError::InvalidColumn(name.to_string()));
    }
    Ok(format!("\"{name}\""))
}
