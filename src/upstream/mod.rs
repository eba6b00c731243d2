//! Demand-driven streaming protocol between a producer and the writer.
//!
//! A producer hands its subscriber a [`Subscription`] and then delivers at
//! most as many records as the subscriber has requested, followed by
//! exactly one terminal signal (`on_complete` or `on_error`).
//!
//! [`StreamPublisher`] adapts any `futures::Stream` to this protocol.

mod publisher;

pub use publisher::StreamPublisher;

use crate::writer::SharedError;

/// Handle a subscriber uses to control its producer.
pub trait Subscription: Send + Sync + 'static {
    /// Grant permission to deliver `n` more records.
    fn request(&self, n: u64);

    /// Stop delivering. Records already in transit may still arrive.
    fn cancel(&self);
}

/// Consumer side of the protocol.
pub trait Subscriber<R>: Send + 'static {
    fn on_subscribe(&self, subscription: Box<dyn Subscription>);
    fn on_next(&self, record: R);
    fn on_error(&self, cause: SharedError);
    fn on_complete(&self);
}
