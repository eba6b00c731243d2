//! Streaming batch writer with demand-driven backpressure.
//!
//! A [`BatchWriter`] subscribes to a producer, translates each record into a
//! statement, groups statements into batches and executes them with at most
//! `concurrent_requests` batches in flight. Demand is replenished as
//! batches resolve, so a slow backend slows the producer down instead of
//! piling records up in memory.
//!
//! ```no_run
//! use spillway::upstream::StreamPublisher;
//! use spillway::writer::{statement_fn, BatchWriter, WriterConfig};
//! # use spillway::writer::{Batch, BatchExecutor, BatchType};
//! # struct Print;
//! # #[async_trait::async_trait]
//! # impl BatchExecutor<String> for Print {
//! #     type Error = std::io::Error;
//! #     async fn execute(&self, batch: Batch<String>, _: BatchType) -> Result<(), Self::Error> {
//! #         println!("{:?}", batch.statements());
//! #         Ok(())
//! #     }
//! # }
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let builder = statement_fn(|n: u32| Ok::<_, std::io::Error>(format!("INSERT {n}")));
//! let handle = BatchWriter::new(builder, Print, WriterConfig::default().with_batch_size(10))
//!     .on_completion(|| println!("done"))
//!     .write_stream(StreamPublisher::from_records(0..25u32))?;
//! let summary = handle.join().await?;
//! assert_eq!(summary.batches, 3);
//! # Ok(())
//! # }
//! ```

mod actor;
pub mod batch;
pub mod config;
pub mod error;
pub mod executor;
pub mod scheduler;
pub mod state;

pub use batch::{Batch, BatchAccumulator, BatchType};
pub use config::WriterConfig;
pub use error::{
    shared, ConfigError, ExecutorPanicked, SharedError, UpstreamDetached, WriterError,
};
pub use executor::{statement_fn, BatchExecutor, RequestBuilder, StatementFn};
pub use state::SubscriptionState;

use futures::Stream;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::upstream::{StreamPublisher, Subscriber, Subscription};
use actor::{Callbacks, Signal, WriterActor};

/// Totals reported by a completed writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    /// Records received from upstream.
    pub records: u64,
    /// Statements handed to the executor.
    pub statements: u64,
    /// Batches handed to the executor.
    pub batches: u64,
}

/// Builder for a batch writer subscription.
pub struct BatchWriter<B, E> {
    builder: B,
    executor: Arc<E>,
    config: WriterConfig,
    callbacks: Callbacks,
}

impl<B, E> BatchWriter<B, E> {
    pub fn new(builder: B, executor: E, config: WriterConfig) -> Self {
        Self::with_shared_executor(builder, Arc::new(executor), config)
    }

    /// Use an executor that is shared with other writers.
    pub fn with_shared_executor(builder: B, executor: Arc<E>, config: WriterConfig) -> Self {
        Self {
            builder,
            executor,
            config,
            callbacks: Callbacks::default(),
        }
    }

    /// Run `f` once when every record has been written.
    pub fn on_completion<F>(mut self, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.callbacks.on_completion = Some(Box::new(f));
        self
    }

    /// Run `f` once with the cause when the subscription fails.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: FnOnce(WriterError) + Send + 'static,
    {
        self.callbacks.on_error = Some(Box::new(f));
        self
    }

    /// Start the control loop.
    ///
    /// Returns the subscriber to hand to a producer and a handle to await
    /// the outcome.
    pub fn spawn<R>(self) -> Result<(BatchSubscriber<R>, WriterHandle), ConfigError>
    where
        R: Send + 'static,
        B: RequestBuilder<R>,
        E: BatchExecutor<B::Statement>,
    {
        self.config.validate()?;

        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SubscriptionState::Uninitialized);

        tracing::debug!(
            batch_size = self.config.batch_size,
            concurrent_requests = self.config.concurrent_requests,
            batch_type = %self.config.batch_type,
            flush_interval = ?self.config.flush_interval,
            "Spawning batch writer"
        );

        let actor = WriterActor::new(
            self.config,
            self.builder,
            self.executor,
            signals_rx,
            state_tx,
            self.callbacks,
        );
        let task = tokio::spawn(actor.run());

        Ok((
            BatchSubscriber { tx: signals_tx },
            WriterHandle {
                task,
                state: state_rx,
            },
        ))
    }

    /// Start the control loop and subscribe it to `publisher`.
    pub fn write_stream<St, R, Err>(
        self,
        publisher: StreamPublisher<St>,
    ) -> Result<WriterHandle, ConfigError>
    where
        St: Stream<Item = Result<R, Err>> + Send + 'static,
        R: Send + 'static,
        Err: std::error::Error + Send + Sync + 'static,
        B: RequestBuilder<R>,
        E: BatchExecutor<B::Statement>,
    {
        let (subscriber, handle) = self.spawn()?;
        publisher.subscribe(subscriber);
        Ok(handle)
    }
}

/// The writer's side of the upstream protocol.
///
/// Every signal is posted into the writer's control loop. Signals sent
/// after the writer terminated are ignored.
pub struct BatchSubscriber<R> {
    tx: mpsc::UnboundedSender<Signal<R>>,
}

impl<R> Clone for BatchSubscriber<R> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<R> BatchSubscriber<R> {
    fn post(&self, signal: Signal<R>) {
        if self.tx.send(signal).is_err() {
            tracing::trace!("Writer already terminated, signal ignored");
        }
    }
}

impl<R: Send + 'static> Subscriber<R> for BatchSubscriber<R> {
    fn on_subscribe(&self, subscription: Box<dyn Subscription>) {
        if let Err(mpsc::error::SendError(Signal::Subscribe(subscription))) =
            self.tx.send(Signal::Subscribe(subscription))
        {
            // Nobody will ever request from it.
            subscription.cancel();
        }
    }

    fn on_next(&self, record: R) {
        self.post(Signal::Next(record));
    }

    fn on_error(&self, cause: SharedError) {
        self.post(Signal::Error(cause));
    }

    fn on_complete(&self) {
        self.post(Signal::Complete);
    }
}

/// Handle to a running writer.
#[derive(Debug)]
pub struct WriterHandle {
    task: JoinHandle<Result<WriteSummary, WriterError>>,
    state: watch::Receiver<SubscriptionState>,
}

impl WriterHandle {
    /// Current lifecycle state.
    pub fn state(&self) -> SubscriptionState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<SubscriptionState> {
        self.state.clone()
    }

    /// Wait for the terminal state.
    pub async fn join(self) -> Result<WriteSummary, WriterError> {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Writer task did not finish");
                Err(WriterError::Aborted)
            }
        }
    }
}
