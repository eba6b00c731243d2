//! Collaborator seams of the batch writer.
//!
//! The writer knows nothing about records, statements or storage. It is
//! handed a [`RequestBuilder`] that turns a record into a statement and a
//! [`BatchExecutor`] that writes a batch of statements.

use async_trait::async_trait;
use std::marker::PhantomData;

use super::batch::{Batch, BatchType};

/// Turns one record into one write statement.
pub trait RequestBuilder<R>: Send + 'static {
    type Statement: Send + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    fn to_statement(&self, record: R) -> Result<Self::Statement, Self::Error>;
}

/// Writes one batch of statements against the storage backend.
///
/// Calls may run concurrently with each other. There is no cancel
/// primitive: once dispatched a call runs to completion.
#[async_trait]
pub trait BatchExecutor<S: Send + 'static>: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn execute(&self, batch: Batch<S>, batch_type: BatchType) -> Result<(), Self::Error>;
}

/// A [`RequestBuilder`] backed by a closure.
pub struct StatementFn<F, R> {
    f: F,
    _record: PhantomData<fn(R)>,
}

/// Use a closure as the statement builder.
pub fn statement_fn<F, R, S, E>(f: F) -> StatementFn<F, R>
where
    F: Fn(R) -> Result<S, E> + Send + 'static,
{
    StatementFn {
        f,
        _record: PhantomData,
    }
}

impl<F, R, S, E> RequestBuilder<R> for StatementFn<F, R>
where
    F: Fn(R) -> Result<S, E> + Send + 'static,
    R: 'static,
    S: Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    type Statement = S;
    type Error = E;

    fn to_statement(&self, record: R) -> Result<S, E> {
        (self.f)(record)
    }
}
