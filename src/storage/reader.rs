//! Read connection pool and lazily paginated row streams.
//!
//! Uses r2d2 with r2d2_sqlite for pooled read access.
//! SQLite WAL mode allows concurrent readers next to the batch writer.

use futures::stream::{self, Stream};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OpenFlags, Row};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::schema::{apply_reader_pragmas, is_valid_identifier};

/// Default number of rows fetched per page.
pub const DEFAULT_PAGE_SIZE: usize = 500;

/// Error type for reader pool operations.
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("Failed to create connection pool: {0}")]
    PoolCreation(#[from] r2d2::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Page fetch task panicked")]
    TaskPanic,
}

/// Decodes one result row into a value.
///
/// Columns arrive in the order the query listed them.
pub trait FromRow: Sized + Send + 'static {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// A table scan read in `rowid` order, one page at a time.
#[derive(Debug, Clone)]
pub struct PageQuery {
    table: String,
    columns: Vec<String>,
    page_size: usize,
}

impl PageQuery {
    pub fn new(table: &str, columns: &[&str]) -> Result<Self, ReaderError> {
        for name in std::iter::once(&table).chain(columns) {
            if !is_valid_identifier(name) {
                return Err(ReaderError::InvalidIdentifier((*name).to_string()));
            }
        }
        Ok(Self {
            table: table.to_string(),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Rows per page; at least 1.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Keyset pagination: the row id trails the requested columns.
    fn sql(&self) -> String {
        format!(
            "SELECT {}, rowid FROM {} WHERE rowid > ?1 ORDER BY rowid LIMIT ?2",
            self.columns.join(", "),
            self.table
        )
    }
}

/// Read connection pool for queries.
///
/// Provides pooled read-only connections for concurrent access.
#[derive(Clone)]
pub struct ReaderPool {
    pool: Pool<SqliteConnectionManager>,
}

impl ReaderPool {
    /// Create a new reader pool for the given database path.
    ///
    /// # Arguments
    ///
    /// * `db_path` - Path to the SQLite database file
    /// * `max_size` - Maximum number of connections in the pool
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be created.
    pub fn new<P: AsRef<Path>>(db_path: P, max_size: u32) -> Result<Self, ReaderError> {
        let manager = SqliteConnectionManager::file(db_path)
            .with_flags(OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX);

        let pool = Pool::builder()
            .max_size(max_size.max(1))
            .connection_customizer(Box::new(ReaderConnectionCustomizer))
            .build(manager)?;

        Ok(Self { pool })
    }

    /// Get a connection from the pool.
    pub fn get(&self) -> Result<PooledConnection<SqliteConnectionManager>, ReaderError> {
        Ok(self.pool.get()?)
    }

    /// Number of rows in `table`.
    pub fn count_rows(&self, table: &str) -> Result<u64, ReaderError> {
        if !is_valid_identifier(table) {
            return Err(ReaderError::InvalidIdentifier(table.to_string()));
        }
        let conn = self.get()?;
        let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get(0)
        })?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Stream the rows of `query` one at a time.
    ///
    /// Nothing is read until the stream is polled, and the next page is only
    /// fetched once the previous one has been consumed. The stream ends after
    /// the first error.
    pub fn stream_rows<T: FromRow>(
        &self,
        query: &PageQuery,
    ) -> impl Stream<Item = Result<T, ReaderError>> + Send + 'static {
        let cursor = PageCursor {
            pool: self.clone(),
            sql: Arc::from(query.sql()),
            rowid_index: query.columns.len(),
            page_size: query.page_size,
            after: i64::MIN,
            buffer: VecDeque::new(),
            exhausted: false,
        };

        stream::try_unfold(cursor, |mut cursor| async move {
            if cursor.buffer.is_empty() && !cursor.exhausted {
                cursor.fetch_page().await?;
            }
            Ok(cursor.buffer.pop_front().map(|row| (row, cursor)))
        })
    }
}

/// Pagination state behind [`ReaderPool::stream_rows`].
struct PageCursor<T> {
    pool: ReaderPool,
    sql: Arc<str>,
    rowid_index: usize,
    page_size: usize,
    after: i64,
    buffer: VecDeque<T>,
    exhausted: bool,
}

impl<T: FromRow> PageCursor<T> {
    async fn fetch_page(&mut self) -> Result<(), ReaderError> {
        let pool = self.pool.clone();
        let sql = Arc::clone(&self.sql);
        let after = self.after;
        let rowid_index = self.rowid_index;
        let limit = i64::try_from(self.page_size).unwrap_or(i64::MAX);

        let page = tokio::task::spawn_blocking(move || -> Result<Vec<(T, i64)>, ReaderError> {
            let conn = pool.get()?;
            let mut stmt = conn.prepare_cached(&sql)?;
            let rows = stmt
                .query_map(params![after, limit], |row| {
                    Ok((T::from_row(row)?, row.get::<_, i64>(rowid_index)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(|_| ReaderError::TaskPanic)??;

        tracing::trace!(rows = page.len(), after, "Fetched page");

        if page.len() < self.page_size {
            self.exhausted = true;
        }
        if let Some((_, last)) = page.last() {
            self.after = *last;
        }
        self.buffer.extend(page.into_iter().map(|(row, _)| row));
        Ok(())
    }
}

/// Connection customizer that applies reader pragmas.
#[derive(Debug)]
struct ReaderConnectionCustomizer;

impl r2d2::CustomizeConnection<rusqlite::Connection, rusqlite::Error>
    for ReaderConnectionCustomizer
{
    fn on_acquire(&self, conn: &mut rusqlite::Connection) -> Result<(), rusqlite::Error> {
        apply_reader_pragmas(conn)
    }
}
