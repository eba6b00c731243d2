//! Construction-time settings for a batch writer.

use std::time::Duration;

use super::batch::BatchType;
use super::error::ConfigError;
use crate::flow::credit::saturating_capacity;

/// Default number of statements per batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default number of batches allowed in flight at once.
pub const DEFAULT_CONCURRENT_REQUESTS: usize = 5;

/// Batch writer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterConfig {
    /// Maximum statements per batch before it is sealed.
    pub batch_size: usize,
    /// Maximum number of outstanding executor calls.
    pub concurrent_requests: usize,
    /// Grouping mode forwarded to the executor.
    pub batch_type: BatchType,
    /// Drain period for partial batches; `None` disables timed flushing.
    pub flush_interval: Option<Duration>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            concurrent_requests: DEFAULT_CONCURRENT_REQUESTS,
            batch_type: BatchType::Unlogged,
            flush_interval: None,
        }
    }
}

impl WriterConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_concurrent_requests(mut self, concurrent_requests: usize) -> Self {
        self.concurrent_requests = concurrent_requests;
        self
    }

    pub fn with_batch_type(mut self, batch_type: BatchType) -> Self {
        self.batch_type = batch_type;
        self
    }

    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = Some(flush_interval);
        self
    }

    /// Check the invariants the writer relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.concurrent_requests == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.flush_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(ConfigError::ZeroFlushInterval);
        }
        Ok(())
    }

    /// Records requested from upstream when the subscription starts.
    pub fn initial_demand(&self) -> u64 {
        saturating_capacity(self.batch_size, self.concurrent_requests)
    }
}
