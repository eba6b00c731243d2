//! Lifecycle states of a writer subscription.

use std::fmt;

/// Where a subscription is in its lifecycle.
///
/// ```text
/// Uninitialized -> Active -> Completing -> Completed
///                    |           |
///                    +-----------+-------> Failed
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SubscriptionState {
    /// Waiting for the upstream subscription.
    #[default]
    Uninitialized,
    /// Receiving records and writing batches.
    Active,
    /// Upstream finished; waiting for the last batches to resolve.
    Completing,
    /// Every batch was written. Terminal.
    Completed,
    /// A record, batch or the upstream failed. Terminal.
    Failed,
}

impl SubscriptionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether a failure may still move the subscription to `Failed`.
    pub fn can_fail(self) -> bool {
        matches!(self, Self::Uninitialized | Self::Active | Self::Completing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Active => "active",
            Self::Completing => "completing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
