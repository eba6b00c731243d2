//! Demand accounting for upstream producers.
//!
//! - AtomicU64 for lock-free credit accounting
//! - Saturating arithmetic everywhere: demand never wraps

use std::sync::atomic::{AtomicU64, Ordering};

/// Total element capacity for `batch_size` statements per batch and
/// `concurrent_requests` batches in flight.
///
/// Saturates at `u64::MAX` instead of wrapping, so extreme configurations
/// never undercount capacity.
#[must_use]
pub fn saturating_capacity(batch_size: usize, concurrent_requests: usize) -> u64 {
    to_demand(batch_size).saturating_mul(to_demand(concurrent_requests))
}

/// Widen a `usize` count into demand units, clamping on exotic targets.
#[must_use]
pub fn to_demand(count: usize) -> u64 {
    u64::try_from(count).unwrap_or(u64::MAX)
}

/// Outstanding demand granted by a subscriber.
///
/// Every `request(n)` adds `n` credits, every delivered element consumes
/// one. A producer may only emit while credits are available, which is
/// what keeps a slow storage backend from being overwhelmed.
#[derive(Debug)]
pub struct CreditBalance {
    credits: AtomicU64,
}

impl Default for CreditBalance {
    fn default() -> Self {
        Self::new()
    }
}

impl CreditBalance {
    /// Create a new credit balance starting at 0.
    pub fn new() -> Self {
        Self {
            credits: AtomicU64::new(0),
        }
    }

    /// Create a new credit balance with initial credits.
    pub fn with_initial(initial: u64) -> Self {
        Self {
            credits: AtomicU64::new(initial),
        }
    }

    /// Add credits to the balance, saturating at `u64::MAX`.
    ///
    /// Returns the new total.
    pub fn add(&self, amount: u64) -> u64 {
        let previous = self
            .credits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                Some(current.saturating_add(amount))
            })
            .unwrap_or_else(|current| current);
        previous.saturating_add(amount)
    }

    /// Try to consume one credit.
    ///
    /// Returns true if a credit was consumed, false if no credits available.
    pub fn try_consume(&self) -> bool {
        self.credits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                current.checked_sub(1)
            })
            .is_ok()
    }

    /// Get the current credit count.
    pub fn available(&self) -> u64 {
        self.credits.load(Ordering::SeqCst)
    }
}
