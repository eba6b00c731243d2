//! Test utilities for Spillway tests.
//!
//! Provides:
//! - Temporary database fixtures
//! - A recording executor with optional delay, gating and failure
//! - A manual upstream subscription that records demand

#![allow(dead_code)]

use async_trait::async_trait;
use spillway::upstream::Subscription;
use spillway::writer::{Batch, BatchExecutor, BatchType};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Semaphore;

/// Test fixture that manages a temporary database directory.
///
/// The directory is automatically cleaned up when the fixture is dropped.
pub struct TestFixture {
    /// Temporary directory for test database
    pub temp_dir: TempDir,
    /// Path to the database file
    pub db_path: PathBuf,
}

impl TestFixture {
    /// Create a new test fixture with a temporary database directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        Self { temp_dir, db_path }
    }

    /// Write `contents` to a file inside the fixture directory.
    pub fn write_input(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, contents).expect("failed to write input");
        path
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for a condition to become true with timeout.
///
/// Returns `true` if the condition was met, `false` if the timeout expired.
pub async fn wait_for<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[derive(Debug, thiserror::Error)]
#[error("backend unavailable")]
pub struct BackendUnavailable;

/// A batch as seen by [`RecordingExecutor`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedBatch<S> {
    pub id: u64,
    pub batch_type: BatchType,
    pub statements: Vec<S>,
}

/// Executor that records every batch it is handed.
///
/// Tracks how many calls are outstanding at once. Calls can be slowed down
/// with a delay, held at a gate until released, or made to fail.
pub struct RecordingExecutor<S> {
    batches: Mutex<Vec<RecordedBatch<S>>>,
    calls: AtomicUsize,
    current: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Option<Duration>,
    gate: Option<Semaphore>,
    fail_on_calls: Vec<usize>,
    panic_on_call: Option<usize>,
}

impl<S> RecordingExecutor<S> {
    pub fn new() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            current: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            delay: None,
            gate: None,
            fail_on_calls: Vec::new(),
            panic_on_call: None,
        }
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Hold every call until [`release`](Self::release) lets it through.
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    /// Fail the `n`th call (1-based).
    pub fn failing_on_call(self, n: usize) -> Self {
        self.failing_on_calls([n])
    }

    /// Fail every listed call (1-based).
    pub fn failing_on_calls(mut self, calls: impl IntoIterator<Item = usize>) -> Self {
        self.fail_on_calls.extend(calls);
        self
    }

    /// Panic inside the `n`th call (1-based).
    pub fn panicking_on_call(mut self, n: usize) -> Self {
        self.panic_on_call = Some(n);
        self
    }

    /// Let `n` gated calls finish.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl<S: Clone> RecordingExecutor<S> {
    /// Recorded batches ordered by batch id.
    pub fn batches(&self) -> Vec<RecordedBatch<S>> {
        let mut batches = self.batches.lock().unwrap().clone();
        batches.sort_by_key(|b| b.id);
        batches
    }

    /// Statements of every recorded batch, ordered by batch id.
    pub fn statements(&self) -> Vec<Vec<S>> {
        self.batches().into_iter().map(|b| b.statements).collect()
    }
}

impl<S> Default for RecordingExecutor<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<S: Send + 'static> BatchExecutor<S> for RecordingExecutor<S> {
    type Error = BackendUnavailable;

    async fn execute(&self, batch: Batch<S>, batch_type: BatchType) -> Result<(), Self::Error> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        self.batches.lock().unwrap().push(RecordedBatch {
            id: batch.id(),
            batch_type,
            statements: batch.into_statements(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        self.current.fetch_sub(1, Ordering::SeqCst);
        if self.panic_on_call == Some(call) {
            panic!("executor crashed on call {call}");
        }
        if self.fail_on_calls.contains(&call) {
            return Err(BackendUnavailable);
        }
        Ok(())
    }
}

/// Upstream subscription driven by hand from a test.
#[derive(Debug, Clone, Default)]
pub struct ManualSubscription {
    requests: Arc<Mutex<Vec<u64>>>,
    cancelled: Arc<AtomicBool>,
}

impl ManualSubscription {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `request(n)` received, in order.
    pub fn requests(&self) -> Vec<u64> {
        self.requests.lock().unwrap().clone()
    }

    pub fn total_requested(&self) -> u64 {
        self.requests().iter().sum()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn boxed(&self) -> Box<dyn Subscription> {
        Box::new(self.clone())
    }
}

impl Subscription for ManualSubscription {
    fn request(&self, n: u64) {
        self.requests.lock().unwrap().push(n);
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}
