//! Error types for the batch writer.

use std::sync::Arc;
use thiserror::Error;

/// A cloneable, thread-safe error cause.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Wrap any error into a [`SharedError`].
pub fn shared<E>(error: E) -> SharedError
where
    E: std::error::Error + Send + Sync + 'static,
{
    Arc::new(error)
}

/// Why a writer subscription failed.
///
/// Every variant is fatal for the whole subscription.
#[derive(Debug, Clone, Error)]
pub enum WriterError {
    #[error("failed to translate record into a write statement: {0}")]
    Translation(#[source] SharedError),

    #[error("batch {batch_id} ({size} statements) failed: {source}")]
    Executor {
        batch_id: u64,
        size: usize,
        #[source]
        source: SharedError,
    },

    #[error("upstream failed: {0}")]
    Upstream(#[source] SharedError),

    #[error("writer task stopped unexpectedly")]
    Aborted,
}

impl WriterError {
    /// Short label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Translation(_) => "translation",
            Self::Executor { .. } => "executor",
            Self::Upstream(_) => "upstream",
            Self::Aborted => "aborted",
        }
    }
}

/// Upstream went away without signalling completion or an error.
#[derive(Debug, Error)]
#[error("upstream detached without a terminal signal")]
pub struct UpstreamDetached;

/// An executor call panicked instead of returning a result.
#[derive(Debug, Error)]
#[error("executor panicked while writing the batch")]
pub struct ExecutorPanicked;

/// Invalid writer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("batch_size must be at least 1")]
    ZeroBatchSize,

    #[error("concurrent_requests must be at least 1")]
    ZeroConcurrency,

    #[error("flush_interval must be greater than zero when set")]
    ZeroFlushInterval,
}
