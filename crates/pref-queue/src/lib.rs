//! Pref Queue
//!
//! Named, ordered work queues that apply operations one at a time against an
//! unreliable async write primitive.
//!
//! # Core Concepts
//!
//! - [`QueueHandler`]: the external write plus success/failure/batch hooks
//! - [`RetryQueue`]: strictly sequential drain loop with a bounded retry
//!   counter and fixed backoff
//! - [`QueueRegistry`]: named queues owned by the host
//! - [`BatchOutcome`]: every operation ends in exactly one of succeeded/failed
//!
//! # Example
//!
//! ```rust,ignore
//! use pref_queue::{QueueConfig, QueueRegistry};
//!
//! let registry = QueueRegistry::new();
//! registry.register("settings", QueueConfig::default(), handler)?;
//! registry.submit("settings", ops)?;
//! registry.wait_idle_all().await;
//! ```
//!
//! There is no cancellation: a submitted operation runs until it succeeds or
//! exhausts its retry budget.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod handler;
pub mod queue;
pub mod registry;

pub use config::{QueueConfig, RetryBudget, DEFAULT_BACKOFF_MS, DEFAULT_MAX_ATTEMPTS};
pub use error::QueueError;
pub use handler::{BatchId, BatchOutcome, QueueHandler};
pub use queue::{QueueControl, RetryQueue};
pub use registry::QueueRegistry;

/// Queue carrying setting write operations
pub type WriteQueue<H> = RetryQueue<pref_value::WriteOp, H>;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with queues
    pub use crate::{
        BatchOutcome, QueueConfig, QueueControl, QueueHandler, QueueRegistry, RetryBudget,
        RetryQueue, WriteQueue,
    };
}
