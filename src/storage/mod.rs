//! SQLite storage layer for Spillway.
//!
//! Provides:
//! - Pragmas and the JSON record table
//! - Insert statements built from JSON lines
//! - A pooled batch executor for the writer
//! - A read pool with lazily paginated row streams

pub mod executor;
pub mod reader;
pub mod record;
pub mod schema;
pub mod statement;

pub use executor::{ExecutorError, SqliteExecutor};
pub use reader::{FromRow, PageQuery, ReaderError, ReaderPool};
pub use record::{JsonRecord, StoredRecord};
pub use statement::{InsertBuilder, SqlStatement, StatementError};

use rusqlite::Connection;
use std::path::Path;

/// Open the database at `db_path`, switch it to WAL and create `table`.
///
/// # Errors
///
/// Returns an error if the table name is not a plain identifier or the
/// database cannot be opened.
pub fn prepare_database<P: AsRef<Path>>(db_path: P, table: &str) -> Result<(), ReaderError> {
    if !schema::is_valid_identifier(table) {
        return Err(ReaderError::InvalidIdentifier(table.to_string()));
    }

    let conn = Connection::open(db_path.as_ref())?;
    schema::apply_pragmas(&conn)?;
    schema::ensure_record_table(&conn, table)?;

    tracing::debug!(path = %db_path.as_ref().display(), table, "Database prepared");
    Ok(())
}
