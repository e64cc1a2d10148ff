//! Sequential retry queue
//!
//! One operation in flight at a time, FIFO order preserved:
//! - success: `on_success`, move to the succeeded list, pop
//! - failure: decrement the retry counter; at zero, `on_failure`, move to
//!   the failed list, pop, reset the counter
//! - next attempt runs immediately when the counter is full, after the
//!   backoff delay otherwise
//! - empty pending list: `on_batch_end` with both lists, then idle
//!
//! Submitting to a running queue appends; it never starts a second drain.
//! The queue counts as running until `on_batch_end` returns, so operations
//! submitted from or during the hook form the next batch of the same drain.

use crate::config::{QueueConfig, RetryBudget};
use crate::error::QueueError;
use crate::handler::{BatchId, BatchOutcome, QueueHandler};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Mutable per-queue state, only touched between suspension points
struct QueueState<T> {
    pending: VecDeque<T>,
    running: bool,
    attempts_left: u32,
    batch: BatchId,
    succeeded: Vec<T>,
    failed: Vec<T>,
}

struct Inner<T, H> {
    name: String,
    config: QueueConfig,
    handler: Arc<H>,
    state: Mutex<QueueState<T>>,
    idle: Notify,
}

enum Step<T> {
    Attempt(T),
    Finish(BatchOutcome<T>),
}

/// Named sequential work queue with bounded retries
pub struct RetryQueue<T, H> {
    inner: Arc<Inner<T, H>>,
}

impl<T, H> Clone for RetryQueue<T, H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, H> fmt::Debug for RetryQueue<T, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("RetryQueue")
            .field("name", &self.inner.name)
            .field("pending", &state.pending.len())
            .field("running", &state.running)
            .finish_non_exhaustive()
    }
}

impl<T, H> RetryQueue<T, H>
where
    T: Clone + fmt::Debug + Send + Sync + 'static,
    H: QueueHandler<T>,
{
    /// Create idle queue
    #[must_use]
    pub fn new(name: impl Into<String>, config: QueueConfig, handler: Arc<H>) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                config,
                handler,
                state: Mutex::new(QueueState {
                    pending: VecDeque::new(),
                    running: false,
                    attempts_left: config.attempts(),
                    batch: BatchId::new(),
                    succeeded: Vec::new(),
                    failed: Vec::new(),
                }),
                idle: Notify::new(),
            }),
        }
    }

    /// Queue name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Queue configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    /// Append operations and start draining if idle
    ///
    /// Returns immediately; outcomes are observed through the handler hooks.
    ///
    /// # Errors
    /// - `QueueError::NoRuntime` when called outside a tokio runtime
    pub fn submit(&self, ops: impl IntoIterator<Item = T>) -> Result<(), QueueError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| QueueError::NoRuntime(self.inner.name.clone()))?;

        let start = {
            let mut state = self.inner.state.lock();
            let before = state.pending.len();
            state.pending.extend(ops);
            let added = state.pending.len() - before;

            if added == 0 || state.running {
                tracing::debug!(queue = %self.inner.name, added, "appended to queue");
                false
            } else {
                state.running = true;
                state.batch = BatchId::new();
                tracing::debug!(queue = %self.inner.name, batch = %state.batch, added, "queue run started");
                true
            }
        };

        if start {
            runtime.spawn(Arc::clone(&self.inner).drain());
        }
        Ok(())
    }

    /// Whether a drain loop is active, including its batch-end hook
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.state.lock().running
    }

    /// Whether the queue is drained and its batch-end hook has returned
    #[inline]
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.inner.is_idle()
    }

    /// Operations not yet completed (including the head)
    #[inline]
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    /// Wait until the queue is idle
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inner.is_idle() {
                return;
            }
            notified.await;
        }
    }
}

impl<T, H> Inner<T, H>
where
    T: Clone + fmt::Debug + Send + Sync + 'static,
    H: QueueHandler<T>,
{
    fn is_idle(&self) -> bool {
        !self.state.lock().running
    }

    /// After a batch end: start the next batch, or go idle when nothing is pending
    fn resume(&self) -> bool {
        let mut state = self.state.lock();
        if state.pending.is_empty() {
            state.running = false;
            drop(state);
            self.idle.notify_waiters();
            return false;
        }
        state.batch = BatchId::new();
        tracing::debug!(queue = %self.name, batch = %state.batch, "queue run continued");
        true
    }

    async fn drain(self: Arc<Self>) {
        let max = self.config.attempts();
        let mut delay = Duration::ZERO;

        loop {
            if delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(delay).await;
            }

            let step = {
                let mut state = self.state.lock();
                match state.pending.front().cloned() {
                    Some(op) => Step::Attempt(op),
                    None => {
                        state.attempts_left = max;
                        Step::Finish(BatchOutcome {
                            batch: state.batch,
                            queue: self.name.clone(),
                            succeeded: std::mem::take(&mut state.succeeded),
                            failed: std::mem::take(&mut state.failed),
                        })
                    }
                }
            };

            let op = match step {
                Step::Attempt(op) => op,
                Step::Finish(outcome) => {
                    self.finish(outcome).await;
                    if self.resume() {
                        delay = Duration::ZERO;
                        continue;
                    }
                    return;
                }
            };

            match self.handler.handle(&op).await {
                Ok(output) => {
                    tracing::debug!(queue = %self.name, ?op, "write succeeded");
                    self.handler.on_success(&op, &output);
                    let mut state = self.state.lock();
                    if let Some(done) = state.pending.pop_front() {
                        state.succeeded.push(done);
                    }
                    if self.config.budget == RetryBudget::PerOperation {
                        state.attempts_left = max;
                    }
                }
                Err(error) => {
                    let exhausted = {
                        let mut state = self.state.lock();
                        state.attempts_left = state.attempts_left.saturating_sub(1);
                        state.attempts_left == 0
                    };

                    if exhausted {
                        tracing::warn!(queue = %self.name, ?op, %error, "write failed, retries exhausted");
                        self.handler.on_failure(&op, &error);
                        let mut state = self.state.lock();
                        if let Some(done) = state.pending.pop_front() {
                            state.failed.push(done);
                        }
                        state.attempts_left = max;
                    } else {
                        tracing::debug!(queue = %self.name, ?op, %error, "write failed, retrying");
                    }
                }
            }

            delay = {
                let state = self.state.lock();
                if state.pending.is_empty() || state.attempts_left == max {
                    Duration::ZERO
                } else {
                    self.config.backoff()
                }
            };
        }
    }

    async fn finish(&self, outcome: BatchOutcome<T>) {
        tracing::info!(
            queue = %self.name,
            batch = %outcome.batch,
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            "queue run finished"
        );

        self.handler.on_batch_end(outcome).await;
    }
}

/// Object-safe view of a queue, used by the registry
#[async_trait]
pub trait QueueControl<T>: Send + Sync {
    /// Queue name
    fn name(&self) -> &str;

    /// Append operations and start draining if idle
    ///
    /// # Errors
    /// - `QueueError::NoRuntime` when called outside a tokio runtime
    fn submit(&self, ops: Vec<T>) -> Result<(), QueueError>;

    /// Whether the queue is drained and its batch-end hook has returned
    fn is_idle(&self) -> bool;

    /// Operations not yet completed
    fn pending_len(&self) -> usize;

    /// Wait until idle
    async fn wait_idle(&self);
}

#[async_trait]
impl<T, H> QueueControl<T> for RetryQueue<T, H>
where
    T: Clone + fmt::Debug + Send + Sync + 'static,
    H: QueueHandler<T>,
{
    fn name(&self) -> &str {
        RetryQueue::name(self)
    }

    fn submit(&self, ops: Vec<T>) -> Result<(), QueueError> {
        RetryQueue::submit(self, ops)
    }

    fn is_idle(&self) -> bool {
        RetryQueue::is_idle(self)
    }

    fn pending_len(&self) -> usize {
        RetryQueue::pending_len(self)
    }

    async fn wait_idle(&self) {
        RetryQueue::wait_idle(self).await;
    }
}
