//! Queue configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default attempts per operation before it is reported as failed
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before retrying a failed head operation
pub const DEFAULT_BACKOFF_MS: u64 = 300;

/// How the retry counter is shared between operations of one queue run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryBudget {
    /// One counter per queue run; an operation that fails and then succeeds
    /// leaves the counter decremented for the operations behind it. The
    /// counter is reset only on exhaustion and when the queue idles.
    #[default]
    SharedPerQueue,
    /// Counter reset whenever an operation leaves the head of the queue
    PerOperation,
}

/// Queue configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Attempts per operation, including the first (minimum 1)
    pub max_attempts: u32,
    /// Delay before a retry, in milliseconds
    pub backoff_ms: u64,
    /// Retry counter sharing
    pub budget: RetryBudget,
}

impl QueueConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With attempt count
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// With backoff delay
    #[inline]
    #[must_use]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With retry budget sharing
    #[inline]
    #[must_use]
    pub fn with_budget(mut self, budget: RetryBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Effective attempt count
    #[inline]
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Backoff delay
    #[inline]
    #[must_use]
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_ms: DEFAULT_BACKOFF_MS,
            budget: RetryBudget::default(),
        }
    }
}
