//! Batch accumulation for grouped writes.
//!
//! Statements are collected until the batch is full, then sealed and handed
//! to the executor. The flush scheduler and shutdown seal partial batches
//! through [`BatchAccumulator::drain`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Grouping mode forwarded to the transport with every batch.
///
/// The writer never interprets it; transports decide what each mode means.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchType {
    /// Atomic multi-statement batch.
    Logged,
    /// Grouped for throughput only, no atomicity guarantee.
    #[default]
    Unlogged,
    /// Counter updates.
    Counter,
}

impl BatchType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Logged => "logged",
            Self::Unlogged => "unlogged",
            Self::Counter => "counter",
        }
    }
}

impl fmt::Display for BatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "logged" => Ok(Self::Logged),
            "unlogged" => Ok(Self::Unlogged),
            "counter" => Ok(Self::Counter),
            _ => Err(format!("unknown batch type: {s}")),
        }
    }
}

/// A sealed, ordered group of statements executed as one backend operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<S> {
    id: u64,
    statements: Vec<S>,
}

impl<S> Batch<S> {
    /// Sequence number assigned when the batch was sealed, starting at 1.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Statements in arrival order.
    pub fn statements(&self) -> &[S] {
        &self.statements
    }

    pub fn into_statements(self) -> Vec<S> {
        self.statements
    }
}

impl<S> IntoIterator for Batch<S> {
    type Item = S;
    type IntoIter = std::vec::IntoIter<S>;

    fn into_iter(self) -> Self::IntoIter {
        self.statements.into_iter()
    }
}

/// Batch accumulator for write statements.
///
/// Seals a batch as soon as it holds `batch_size` statements. Not
/// synchronized: the writer's control loop is the only owner.
#[derive(Debug)]
pub struct BatchAccumulator<S> {
    batch_size: usize,
    items: Vec<S>,
    batch_start: Option<Instant>,
    sealed: u64,
}

impl<S> BatchAccumulator<S> {
    /// Create a new accumulator sealing at `batch_size` statements.
    ///
    /// A zero size is treated as 1.
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            batch_size,
            items: Vec::with_capacity(batch_size),
            batch_start: None,
            sealed: 0,
        }
    }

    /// Add a statement to the open batch.
    ///
    /// Returns the sealed batch if it is now full.
    pub fn push(&mut self, item: S) -> Option<Batch<S>> {
        if self.batch_start.is_none() {
            self.batch_start = Some(Instant::now());
        }
        self.items.push(item);

        if self.items.len() >= self.batch_size {
            self.drain()
        } else {
            None
        }
    }

    /// Seal the open batch regardless of its size.
    ///
    /// Returns `None` when there is nothing to seal.
    pub fn drain(&mut self) -> Option<Batch<S>> {
        if self.items.is_empty() {
            return None;
        }

        self.batch_start = None;
        self.sealed += 1;
        let statements = std::mem::replace(&mut self.items, Vec::with_capacity(self.batch_size));
        Some(Batch {
            id: self.sealed,
            statements,
        })
    }

    /// Time since the first statement of the open batch arrived.
    pub fn oldest_age(&self) -> Option<Duration> {
        self.batch_start.map(|start| start.elapsed())
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of statements in the open batch.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of batches sealed so far.
    pub fn sealed_count(&self) -> u64 {
        self.sealed
    }
}
