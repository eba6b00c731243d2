//! Spillway: a streaming batch writer with demand-driven backpressure.
//!
//! Spillway consumes a stream of records, turns each into a write
//! statement and writes the statements as grouped batches, never keeping
//! more than a configured number of batches in flight.
//!
//! # Architecture
//!
//! - **Demand-driven**: records are requested from the producer only as
//!   batch capacity frees up
//! - **Single control loop**: one task owns all writer state; executor
//!   calls report back into it
//! - **Timed flushing**: an optional interval drains slow producers
//! - **Observable**: tracing spans/events and OpenTelemetry metrics
//!
//! # Modules
//!
//! - [`config`]: CLI and environment configuration
//! - [`flow`]: Credit accounting and saturating capacity arithmetic
//! - [`observability`]: Metrics and tracing setup
//! - [`pipeline`]: JSON lines loader and query printer used by the binary
//! - [`storage`]: SQLite transport and paged read stream
//! - [`upstream`]: The demand-driven producer/subscriber protocol
//! - [`writer`]: The batch writer itself

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions, // writer::WriterConfig is fine
    clippy::must_use_candidate,      // Not all functions need #[must_use]
    clippy::missing_errors_doc,      // Error docs can be verbose
    clippy::missing_panics_doc,      // Panic docs can be verbose
    clippy::similar_names            // stmt/statement/statements are fine
)]

pub mod config;
pub mod flow;
pub mod observability;
pub mod pipeline;
pub mod storage;
pub mod upstream;
pub mod writer;

use uuid::Uuid;

/// Generate a new UUIDv7 (time-sortable) record ID.
///
/// # Example
///
/// ```
/// let id = spillway::generate_record_id();
/// assert!(id.len() == 36); // UUID string format
/// ```
#[must_use]
pub fn generate_record_id() -> String {
    Uuid::now_v7().to_string()
}

/// Get the current Unix timestamp in milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}
