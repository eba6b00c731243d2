//! Configuration parsing for the Spillway binary.
//!
//! Supports:
//! - CLI arguments via clap
//! - Environment variable overrides
//! - Sensible defaults for quick start

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::storage::reader::DEFAULT_PAGE_SIZE;
use crate::writer::config::{DEFAULT_BATCH_SIZE, DEFAULT_CONCURRENT_REQUESTS};
use crate::writer::{BatchType, WriterConfig};

/// Spillway: stream JSON lines into SQLite in bounded, concurrent batches.
#[derive(Parser, Debug, Clone)]
#[command(name = "spillway")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Config {
    /// Path to the SQLite database file
    #[arg(short, long, global = true, env = "SPILLWAY_DB", default_value = "./spillway.db")]
    pub db: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// OpenTelemetry collector endpoint for metrics export (optional)
    #[arg(long, global = true, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otel_endpoint: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Load JSON lines into a table through the batch writer
    Load(LoadArgs),
    /// Print the rows of a table as JSON lines
    Query(QueryArgs),
}

#[derive(Args, Debug, Clone)]
pub struct LoadArgs {
    /// Destination table
    #[arg(short, long, env = "SPILLWAY_TABLE", default_value = "records")]
    pub table: String,

    /// Input file with one JSON document per line; `-` reads stdin
    #[arg(short, long, default_value = "-")]
    pub input: String,

    /// Statements per batch
    #[arg(long, env = "SPILLWAY_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Maximum batches in flight
    #[arg(long, env = "SPILLWAY_CONCURRENT_REQUESTS", default_value_t = DEFAULT_CONCURRENT_REQUESTS)]
    pub concurrent_requests: usize,

    /// Batch type (logged, unlogged, counter)
    #[arg(long, env = "SPILLWAY_BATCH_TYPE", default_value = "unlogged")]
    pub batch_type: BatchType,

    /// Flush partial batches every N milliseconds
    #[arg(long, env = "SPILLWAY_FLUSH_INTERVAL_MS")]
    pub flush_interval_ms: Option<u64>,
}

impl LoadArgs {
    /// Writer settings for this load.
    pub fn writer_config(&self) -> WriterConfig {
        let config = WriterConfig::default()
            .with_batch_size(self.batch_size)
            .with_concurrent_requests(self.concurrent_requests)
            .with_batch_type(self.batch_type);
        match self.flush_interval_ms {
            Some(ms) => config.with_flush_interval(Duration::from_millis(ms)),
            None => config,
        }
    }

    /// Reading from stdin rather than a file.
    pub fn reads_stdin(&self) -> bool {
        self.input == "-"
    }
}

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Table to read
    #[arg(short, long, env = "SPILLWAY_TABLE", default_value = "records")]
    pub table: String,

    /// Rows fetched per page
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,

    /// Stop after this many rows
    #[arg(long)]
    pub limit: Option<usize>,
}

impl Config {
    /// Parse configuration from CLI arguments and environment.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
