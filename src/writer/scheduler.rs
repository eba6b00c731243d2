//! Interval-driven flushing of partial batches.

use std::future;
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Optional periodic timer that asks the writer to drain its open batch.
///
/// Without it a producer that stalls below the batch size would never see
/// its statements written. A disabled or cancelled scheduler never ticks.
#[derive(Debug)]
pub struct FlushScheduler {
    period: Option<Duration>,
    interval: Option<Interval>,
}

impl FlushScheduler {
    /// Create a scheduler; `None` or a zero period disables it.
    pub fn new(period: Option<Duration>) -> Self {
        Self {
            period: period.filter(|p| !p.is_zero()),
            interval: None,
        }
    }

    /// Start ticking. The first tick fires one full period from now.
    pub fn start(&mut self) {
        if let Some(period) = self.period {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.interval = Some(interval);
        }
    }

    /// Stop for good. Takes effect immediately and cannot be restarted.
    pub fn cancel(&mut self) {
        self.period = None;
        self.interval = None;
    }

    pub fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    /// Wait for the next tick. Pends forever while not running.
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => future::pending::<()>().await,
        }
    }
}
