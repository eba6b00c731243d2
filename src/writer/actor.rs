//! The writer's control loop.
//!
//! One task per subscription owns every piece of mutable state: the
//! accumulator, the dispatch queue, the in-flight counter and the lifecycle
//! state. Upstream signals and executor results are both posted into this
//! loop, so nothing here needs a lock. Executor calls run as separate tasks
//! and are the only work that suspends.

use futures::FutureExt;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};

use super::batch::{Batch, BatchAccumulator};
use super::config::WriterConfig;
use super::error::{shared, ExecutorPanicked, SharedError, UpstreamDetached, WriterError};
use super::executor::{BatchExecutor, RequestBuilder};
use super::scheduler::FlushScheduler;
use super::state::SubscriptionState;
use super::WriteSummary;
use crate::flow::credit::to_demand;
use crate::observability::metrics::{record_batch, record_in_flight, record_received};
use crate::upstream::Subscription;

/// Signals delivered by the upstream producer.
pub(crate) enum Signal<R> {
    Subscribe(Box<dyn Subscription>),
    Next(R),
    Error(SharedError),
    Complete,
}

/// Result of one executor call, posted back by its task.
#[derive(Debug)]
pub(crate) struct BatchOutcome {
    batch_id: u64,
    size: usize,
    elapsed: Duration,
    result: Result<(), SharedError>,
}

/// Terminal callbacks; each fires at most once and never both.
#[derive(Default)]
pub(crate) struct Callbacks {
    pub on_completion: Option<Box<dyn FnOnce() + Send>>,
    pub on_error: Option<Box<dyn FnOnce(WriterError) + Send>>,
}

pub(crate) struct WriterActor<R, B, E>
where
    B: RequestBuilder<R>,
{
    config: WriterConfig,
    builder: B,
    executor: Arc<E>,
    accumulator: BatchAccumulator<B::Statement>,
    scheduler: FlushScheduler,
    /// Sealed batches waiting for a free in-flight slot, in seal order.
    queue: VecDeque<Batch<B::Statement>>,
    in_flight: usize,
    subscription: Option<Box<dyn Subscription>>,
    state: SubscriptionState,
    state_tx: watch::Sender<SubscriptionState>,
    signals: mpsc::UnboundedReceiver<Signal<R>>,
    upstream_open: bool,
    outcomes_tx: mpsc::UnboundedSender<BatchOutcome>,
    outcomes: mpsc::UnboundedReceiver<BatchOutcome>,
    callbacks: Callbacks,
    summary: WriteSummary,
    failure: Option<WriterError>,
}

impl<R, B, E> WriterActor<R, B, E>
where
    R: Send + 'static,
    B: RequestBuilder<R>,
    E: BatchExecutor<B::Statement>,
{
    pub(crate) fn new(
        config: WriterConfig,
        builder: B,
        executor: Arc<E>,
        signals: mpsc::UnboundedReceiver<Signal<R>>,
        state_tx: watch::Sender<SubscriptionState>,
        callbacks: Callbacks,
    ) -> Self {
        let (outcomes_tx, outcomes) = mpsc::unbounded_channel();
        Self {
            accumulator: BatchAccumulator::new(config.batch_size),
            scheduler: FlushScheduler::new(config.flush_interval),
            config,
            builder,
            executor,
            queue: VecDeque::new(),
            in_flight: 0,
            subscription: None,
            state: SubscriptionState::Uninitialized,
            state_tx,
            signals,
            upstream_open: true,
            outcomes_tx,
            outcomes,
            callbacks,
            summary: WriteSummary::default(),
            failure: None,
        }
    }

    /// Process events until the subscription reaches a terminal state.
    pub(crate) async fn run(mut self) -> Result<WriteSummary, WriterError> {
        loop {
            tokio::select! {
                biased;
                Some(outcome) = self.outcomes.recv() => self.on_batch_outcome(outcome),
                signal = self.signals.recv(), if self.upstream_open => match signal {
                    Some(signal) => self.on_signal(signal),
                    None => self.on_upstream_detached(),
                },
                () = self.scheduler.tick() => self.on_tick(),
            }

            if self.state.is_terminal() {
                break;
            }
        }

        match self.state {
            SubscriptionState::Completed => Ok(self.summary),
            _ => Err(self.failure.take().unwrap_or(WriterError::Aborted)),
        }
    }

    fn on_signal(&mut self, signal: Signal<R>) {
        match signal {
            Signal::Subscribe(subscription) => self.on_subscribe(subscription),
            Signal::Next(record) => self.on_next(record),
            Signal::Error(cause) => {
                self.upstream_open = false;
                self.fail(WriterError::Upstream(cause), false);
            }
            Signal::Complete => self.on_complete(),
        }
    }

    fn on_subscribe(&mut self, subscription: Box<dyn Subscription>) {
        if self.state != SubscriptionState::Uninitialized {
            tracing::warn!(state = %self.state, "Rejecting second subscription");
            subscription.cancel();
            return;
        }

        let demand = self.config.initial_demand();
        self.set_state(SubscriptionState::Active);
        self.scheduler.start();
        tracing::debug!(
            demand,
            batch_size = self.config.batch_size,
            concurrent_requests = self.config.concurrent_requests,
            "Subscription started"
        );
        subscription.request(demand);
        self.subscription = Some(subscription);
    }

    fn on_next(&mut self, record: R) {
        if self.state != SubscriptionState::Active {
            tracing::warn!(state = %self.state, "Dropping record delivered outside an active subscription");
            return;
        }

        self.summary.records += 1;
        record_received(self.config.batch_type);

        match self.builder.to_statement(record) {
            Ok(statement) => {
                if let Some(batch) = self.accumulator.push(statement) {
                    self.enqueue(batch);
                }
            }
            Err(e) => self.fail(WriterError::Translation(shared(e)), true),
        }
    }

    fn on_complete(&mut self) {
        if self.state == SubscriptionState::Uninitialized {
            tracing::warn!("Ignoring completion delivered before a subscription");
            return;
        }
        self.upstream_open = false;
        if self.state != SubscriptionState::Active {
            return;
        }

        self.scheduler.cancel();
        self.set_state(SubscriptionState::Completing);
        if let Some(batch) = self.accumulator.drain() {
            tracing::debug!(batch_id = batch.id(), size = batch.len(), "Draining final batch");
            self.queue.push_back(batch);
        }
        self.dispatch_ready();
        self.maybe_complete();
    }

    fn on_upstream_detached(&mut self) {
        self.upstream_open = false;
        self.fail(WriterError::Upstream(shared(UpstreamDetached)), true);
    }

    fn on_tick(&mut self) {
        if self.state != SubscriptionState::Active {
            return;
        }
        let age = self.accumulator.oldest_age().unwrap_or_default();
        if let Some(batch) = self.accumulator.drain() {
            tracing::debug!(
                batch_id = batch.id(),
                size = batch.len(),
                age_ms = age.as_secs_f64() * 1000.0,
                "Flushing partial batch on interval"
            );
            self.enqueue(batch);
        }
    }

    fn on_batch_outcome(&mut self, outcome: BatchOutcome) {
        self.in_flight = self.in_flight.saturating_sub(1);
        record_in_flight(self.config.batch_type, self.in_flight);
        record_batch(
            self.config.batch_type,
            outcome.result.is_ok(),
            outcome.elapsed.as_secs_f64(),
        );

        match outcome.result {
            Ok(()) => {
                tracing::debug!(
                    batch_id = outcome.batch_id,
                    size = outcome.size,
                    latency_ms = outcome.elapsed.as_secs_f64() * 1000.0,
                    in_flight = self.in_flight,
                    "Batch written"
                );
                if self.state == SubscriptionState::Active {
                    if let Some(subscription) = &self.subscription {
                        subscription.request(to_demand(outcome.size));
                    }
                }
                self.dispatch_ready();
                self.maybe_complete();
            }
            Err(source) => self.fail(
                WriterError::Executor {
                    batch_id: outcome.batch_id,
                    size: outcome.size,
                    source,
                },
                true,
            ),
        }
    }

    fn enqueue(&mut self, batch: Batch<B::Statement>) {
        self.queue.push_back(batch);
        self.dispatch_ready();
    }

    /// Dispatch queued batches while in-flight slots are free.
    fn dispatch_ready(&mut self) {
        while self.in_flight < self.config.concurrent_requests {
            let Some(batch) = self.queue.pop_front() else {
                break;
            };
            self.dispatch(batch);
        }
    }

    fn dispatch(&mut self, batch: Batch<B::Statement>) {
        let batch_id = batch.id();
        let size = batch.len();

        self.in_flight += 1;
        self.summary.batches += 1;
        self.summary.statements += to_demand(size);
        record_in_flight(self.config.batch_type, self.in_flight);
        tracing::debug!(batch_id, size, in_flight = self.in_flight, "Dispatching batch");

        let executor = Arc::clone(&self.executor);
        let outcomes = self.outcomes_tx.clone();
        let batch_type = self.config.batch_type;
        tokio::spawn(async move {
            let started = Instant::now();
            let result = match AssertUnwindSafe(executor.execute(batch, batch_type))
                .catch_unwind()
                .await
            {
                Ok(result) => result.map_err(shared),
                Err(_) => {
                    tracing::error!(batch_id, size, "Executor panicked");
                    Err(shared(ExecutorPanicked))
                }
            };
            // The loop is gone once the subscription failed; the result is discarded.
            let _ = outcomes.send(BatchOutcome {
                batch_id,
                size,
                elapsed: started.elapsed(),
                result,
            });
        });
    }

    fn maybe_complete(&mut self) {
        if self.state != SubscriptionState::Completing || self.in_flight > 0 || !self.queue.is_empty() {
            return;
        }

        self.set_state(SubscriptionState::Completed);
        tracing::info!(
            records = self.summary.records,
            batches = self.summary.batches,
            "Batch writer completed"
        );
        if let Some(on_completion) = self.callbacks.on_completion.take() {
            on_completion();
        }
    }

    fn fail(&mut self, error: WriterError, cancel_upstream: bool) {
        if !self.state.can_fail() {
            return;
        }

        tracing::error!(
            error = %error,
            kind = error.kind(),
            in_flight = self.in_flight,
            discarded_batches = self.queue.len(),
            "Batch writer failed"
        );

        self.scheduler.cancel();
        self.upstream_open = false;
        if let Some(subscription) = self.subscription.take() {
            if cancel_upstream {
                subscription.cancel();
            }
        }
        self.queue.clear();
        self.set_state(SubscriptionState::Failed);

        self.failure = Some(error.clone());
        if let Some(on_error) = self.callbacks.on_error.take() {
            on_error(error);
        }
    }

    fn set_state(&mut self, state: SubscriptionState) {
        tracing::trace!(from = %self.state, to = %state, "State transition");
        self.state = state;
        self.state_tx.send_replace(state);
    }
}
