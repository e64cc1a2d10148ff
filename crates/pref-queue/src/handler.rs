//! Queue handler contract and batch outcome

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Identity of one queue run (from start until the pending list empties)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BatchId(pub Ulid);

impl BatchId {
    /// Generate new batch ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything a queue run did, delivered once when the queue drains
#[derive(Debug, Clone)]
pub struct BatchOutcome<T> {
    /// Queue run identity
    pub batch: BatchId,
    /// Queue name
    pub queue: String,
    /// Operations that succeeded, in completion order
    pub succeeded: Vec<T>,
    /// Operations that exhausted their retries, in completion order
    pub failed: Vec<T>,
}

impl<T> BatchOutcome<T> {
    /// Total operations processed
    #[inline]
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// Whether every operation succeeded
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// External write primitive plus per-operation and per-batch hooks
///
/// `on_success` and `on_failure` run synchronously on the drain task; a
/// panic inside them is not caught and ends the queue run.
#[async_trait]
pub trait QueueHandler<T: Send + Sync + 'static>: Send + Sync + 'static {
    /// Successful write result
    type Output: Send + 'static;
    /// Write failure
    type Error: fmt::Display + Send + 'static;

    /// Attempt one operation
    async fn handle(&self, op: &T) -> Result<Self::Output, Self::Error>;

    /// Called once per succeeded operation
    fn on_success(&self, op: &T, output: &Self::Output) {
        let _ = (op, output);
    }

    /// Called once per operation that exhausted its retries
    fn on_failure(&self, op: &T, error: &Self::Error) {
        let _ = (op, error);
    }

    /// Called exactly once when the pending list becomes empty
    async fn on_batch_end(&self, outcome: BatchOutcome<T>);
}
