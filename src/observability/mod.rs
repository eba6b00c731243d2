//! Observability infrastructure.
//!
//! Provides:
//! - Structured tracing setup
//! - OpenTelemetry metrics for records, batches and in-flight calls

pub mod metrics;
pub mod tracing;
