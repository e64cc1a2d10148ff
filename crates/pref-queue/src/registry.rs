//! Named queue registry
//!
//! Owned by the host process lifecycle rather than living in a module-level
//! singleton. Queues with different names drain independently.

use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::handler::QueueHandler;
use crate::queue::{QueueControl, RetryQueue};
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;

/// Registry of named queues carrying operations of type `T`
pub struct QueueRegistry<T> {
    queues: DashMap<String, Arc<dyn QueueControl<T>>>,
}

impl<T> fmt::Debug for QueueRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.queues.iter().map(|e| e.key().clone()).collect();
        f.debug_struct("QueueRegistry").field("queues", &names).finish()
    }
}

impl<T> Default for QueueRegistry<T> {
    fn default() -> Self {
        Self {
            queues: DashMap::new(),
        }
    }
}

impl<T> QueueRegistry<T>
where
    T: Clone + fmt::Debug + Send + Sync + 'static,
{
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure a queue before use
    ///
    /// # Errors
    /// - `QueueError::AlreadyRegistered` if the name is taken
    pub fn register<H>(
        &self,
        name: impl Into<String>,
        config: QueueConfig,
        handler: Arc<H>,
    ) -> Result<RetryQueue<T, H>, QueueError>
    where
        H: QueueHandler<T>,
    {
        let name = name.into();
        match self.queues.entry(name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(QueueError::AlreadyRegistered(name)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let queue = RetryQueue::new(name.clone(), config, handler);
                slot.insert(Arc::new(queue.clone()));
                tracing::debug!(queue = %name, ?config, "queue registered");
                Ok(queue)
            }
        }
    }

    /// Append operations to a named queue
    ///
    /// # Errors
    /// - `QueueError::NotRegistered` for an unknown name
    /// - `QueueError::NoRuntime` outside a tokio runtime
    pub fn submit(&self, name: &str, ops: Vec<T>) -> Result<(), QueueError> {
        self.get(name)?.submit(ops)
    }

    /// Look up a queue
    ///
    /// # Errors
    /// - `QueueError::NotRegistered` for an unknown name
    pub fn get(&self, name: &str) -> Result<Arc<dyn QueueControl<T>>, QueueError> {
        self.queues
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| QueueError::NotRegistered(name.to_string()))
    }

    /// Whether a queue is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.queues.contains_key(name)
    }

    /// Wait for every registered queue to drain (shutdown flush)
    pub async fn wait_idle_all(&self) {
        let queues: Vec<Arc<dyn QueueControl<T>>> =
            self.queues.iter().map(|e| Arc::clone(e.value())).collect();
        for queue in queues {
            queue.wait_idle().await;
        }
    }
}
