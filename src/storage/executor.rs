//! SQLite batch executor.
//!
//! Batches run on tokio's blocking pool against pooled connections.
//! `Logged` batches are one immediate transaction. `Unlogged` and `Counter` batches
//! run statement by statement in autocommit mode, so a failure leaves the
//! statements before it in place.

use async_trait::async_trait;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params_from_iter, Connection, TransactionBehavior};
use std::path::Path;
use thiserror::Error;

use super::schema::apply_reader_pragmas;
use super::statement::SqlStatement;
use crate::writer::{Batch, BatchExecutor, BatchType};

/// Error type for batch execution.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Failed to get a pooled connection: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Batch task panicked")]
    TaskPanic,
}

/// Executes batches of [`SqlStatement`]s against a SQLite database.
#[derive(Clone)]
pub struct SqliteExecutor {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteExecutor {
    /// Open a write pool for the database at `db_path`.
    ///
    /// `max_size` should be at least the writer's `concurrent_requests`,
    /// otherwise batches queue on the pool.
    pub fn open<P: AsRef<Path>>(db_path: P, max_size: u32) -> Result<Self, ExecutorError> {
        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(max_size.max(1))
            .connection_customizer(Box::new(WriterConnectionCustomizer))
            .build(manager)?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl BatchExecutor<SqlStatement> for SqliteExecutor {
    type Error = ExecutorError;

    async fn execute(
        &self,
        batch: Batch<SqlStatement>,
        batch_type: BatchType,
    ) -> Result<(), ExecutorError> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            write_batch(&mut conn, batch, batch_type)
        })
        .await
        .map_err(|_| ExecutorError::TaskPanic)?
    }
}

fn write_batch(
    conn: &mut Connection,
    batch: Batch<SqlStatement>,
    batch_type: BatchType,
) -> Result<(), ExecutorError> {
    match batch_type {
        BatchType::Logged => {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            for statement in batch {
                execute_statement(&tx, &statement)?;
            }
            tx.commit()?;
        }
        BatchType::Unlogged | BatchType::Counter => {
            for statement in batch {
                execute_statement(conn, &statement)?;
            }
        }
    }
    Ok(())
}

fn execute_statement(conn: &Connection, statement: &SqlStatement) -> rusqlite::Result<usize> {
    conn.prepare_cached(&statement.sql)?
        .execute(params_from_iter(statement.params.iter()))
}

/// Connection customizer that applies the busy timeout to pooled writers.
#[derive(Debug)]
struct WriterConnectionCustomizer;

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for WriterConnectionCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        apply_reader_pragmas(conn)
    }
}
