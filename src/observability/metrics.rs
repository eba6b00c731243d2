//! OpenTelemetry metrics for the batch writer.
//!
//! Key metrics:
//! - spillway_records_total: Counter for records received from upstream
//! - spillway_batches_total: Counter for resolved batches, by outcome
//! - spillway_batch_latency_seconds: Histogram for executor call latency
//! - spillway_in_flight: Gauge for outstanding executor calls

use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use opentelemetry::{global, KeyValue};
use opentelemetry_sdk::metrics::{ManualReader, SdkMeterProvider};
use std::sync::OnceLock;

use crate::writer::BatchType;

/// Global metrics instance.
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Spillway metrics registry.
#[derive(Debug)]
pub struct Metrics {
    /// Total number of records received from upstream.
    pub records_total: Counter<u64>,
    /// Total number of resolved batches.
    pub batches_total: Counter<u64>,
    /// Histogram of executor call latency in seconds.
    pub batch_latency: Histogram<f64>,
    /// Number of executor calls currently outstanding.
    pub in_flight: Gauge<i64>,
}

impl Metrics {
    /// Create a new metrics registry from a meter.
    fn new(meter: &Meter) -> Self {
        Self {
            records_total: meter
                .u64_counter("spillway_records_total")
                .with_description("Total number of records received from upstream")
                .with_unit("1")
                .init(),
            batches_total: meter
                .u64_counter("spillway_batches_total")
                .with_description("Total number of resolved batch executions")
                .with_unit("1")
                .init(),
            batch_latency: meter
                .f64_histogram("spillway_batch_latency_seconds")
                .with_description("Batch latency from dispatch to executor result")
                .with_unit("s")
                .init(),
            in_flight: meter
                .i64_gauge("spillway_in_flight")
                .with_description("Outstanding batch executor calls")
                .with_unit("1")
                .init(),
        }
    }
}

/// Initialize the metrics system.
///
/// This should be called once at startup. Subsequent calls are ignored.
///
/// # Arguments
///
/// * `otel_endpoint` - Optional OTLP endpoint for metrics export
pub fn init_metrics_with_endpoint(otel_endpoint: Option<&str>) {
    METRICS.get_or_init(|| {
        if let Some(endpoint) = otel_endpoint {
            use opentelemetry_otlp::{Protocol, WithExportConfig};

            let exporter = opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint)
                .with_protocol(Protocol::Grpc);

            match opentelemetry_otlp::new_pipeline()
                .metrics(opentelemetry_sdk::runtime::Tokio)
                .with_exporter(exporter)
                .with_period(std::time::Duration::from_secs(10))
                .build()
            {
                Ok(provider) => {
                    global::set_meter_provider(provider);
                    tracing::info!(endpoint, "OTLP metrics exporter configured");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to create OTLP exporter, using no-op metrics");
                    install_manual_reader();
                }
            }
        } else {
            // Metrics are recorded but not exported
            install_manual_reader();
        }

        let meter = global::meter("spillway");
        Metrics::new(&meter)
    });
}

fn install_manual_reader() {
    let reader = ManualReader::builder().build();
    let provider = SdkMeterProvider::builder().with_reader(reader).build();
    global::set_meter_provider(provider);
}

/// Initialize the metrics system without OTLP export.
pub fn init_metrics() {
    init_metrics_with_endpoint(None);
}

/// Get the global metrics instance, if initialized.
pub fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

/// Record one record received from upstream.
pub fn record_received(batch_type: BatchType) {
    if let Some(m) = METRICS.get() {
        m.records_total
            .add(1, &[KeyValue::new("batch_type", batch_type.as_str())]);
    }
}

/// Record a resolved batch execution.
pub fn record_batch(batch_type: BatchType, succeeded: bool, latency_seconds: f64) {
    if let Some(m) = METRICS.get() {
        let attrs = [
            KeyValue::new("batch_type", batch_type.as_str()),
            KeyValue::new("outcome", if succeeded { "ok" } else { "error" }),
        ];
        m.batches_total.add(1, &attrs);
        m.batch_latency.record(latency_seconds, &attrs);
    }
}

/// Record the current number of outstanding executor calls.
pub fn record_in_flight(batch_type: BatchType, in_flight: usize) {
    if let Some(m) = METRICS.get() {
        m.in_flight.record(
            i64::try_from(in_flight).unwrap_or(i64::MAX),
            &[KeyValue::new("batch_type", batch_type.as_str())],
        );
    }
}
