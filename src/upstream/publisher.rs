//! Adapter from `futures::Stream` to the demand-driven protocol.

use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use std::pin::pin;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{Subscriber, Subscription};
use crate::flow::credit::CreditBalance;
use crate::writer::shared;

/// Shared demand state between the subscription handle and the pump task.
#[derive(Debug, Default)]
struct Demand {
    credits: CreditBalance,
    wake: Notify,
    cancel: CancellationToken,
}

/// Subscription handed to the subscriber; grants credits to the pump.
#[derive(Debug)]
struct StreamSubscription {
    demand: Arc<Demand>,
}

impl Subscription for StreamSubscription {
    fn request(&self, n: u64) {
        if n == 0 {
            tracing::warn!("Ignoring request for zero records");
            return;
        }
        let total = self.demand.credits.add(n);
        tracing::trace!(requested = n, outstanding = total, "Demand granted");
        self.demand.wake.notify_one();
    }

    fn cancel(&self) {
        tracing::debug!("Upstream subscription cancelled");
        self.demand.cancel.cancel();
    }
}

/// Publishes the items of a stream, pulling only while demand is outstanding.
///
/// `Ok` items become `on_next`, the first `Err` becomes `on_error` and
/// ends the stream, exhaustion becomes `on_complete`.
pub struct StreamPublisher<St> {
    stream: St,
}

impl<St, R, E> StreamPublisher<St>
where
    St: Stream<Item = Result<R, E>> + Send + 'static,
    R: Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    pub fn new(stream: St) -> Self {
        Self { stream }
    }

    /// Attach `subscriber` and start pumping on a tokio task.
    ///
    /// The task ends after the terminal signal or on cancellation.
    pub fn subscribe<Sub>(self, subscriber: Sub) -> JoinHandle<()>
    where
        Sub: Subscriber<R>,
    {
        let demand = Arc::new(Demand::default());
        subscriber.on_subscribe(Box::new(StreamSubscription {
            demand: Arc::clone(&demand),
        }));
        tokio::spawn(pump(self.stream, subscriber, demand))
    }
}

impl<R> StreamPublisher<stream::Iter<std::vec::IntoIter<Result<R, Infallible>>>>
where
    R: Send + 'static,
{
    /// Publish a fixed set of records, then complete.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = R>,
    {
        let items: Vec<Result<R, Infallible>> = records.into_iter().map(Ok).collect();
        Self {
            stream: stream::iter(items),
        }
    }
}

async fn pump<St, R, E, Sub>(stream: St, subscriber: Sub, demand: Arc<Demand>)
where
    St: Stream<Item = Result<R, E>>,
    E: std::error::Error + Send + Sync + 'static,
    Sub: Subscriber<R>,
{
    let mut stream = pin!(stream);
    let mut delivered: u64 = 0;

    loop {
        if demand.cancel.is_cancelled() {
            tracing::debug!(delivered, "Publisher stopped by cancellation");
            return;
        }

        if !demand.credits.try_consume() {
            tokio::select! {
                () = demand.cancel.cancelled() => {}
                () = demand.wake.notified() => {}
            }
            continue;
        }

        let item = tokio::select! {
            biased;
            () = demand.cancel.cancelled() => continue,
            item = stream.next() => item,
        };

        match item {
            Some(Ok(record)) => {
                delivered += 1;
                subscriber.on_next(record);
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, delivered, "Upstream stream failed");
                subscriber.on_error(shared(e));
                return;
            }
            None => {
                tracing::debug!(delivered, "Upstream stream exhausted");
                subscriber.on_complete();
                return;
            }
        }
    }
}
