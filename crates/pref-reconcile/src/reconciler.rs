//! Scalar reconciliation passes
//!
//! A pass reads the item's provenance cache, plans writes against the live
//! settings, submits them to the shared settings queue, and persists the
//! folded cache when the queue run ends. Passes for one item never overlap:
//! the item lock is held by the pending pass until its cache is persisted.

use crate::error::{ReconcileError, StoreError};
use crate::host::{CacheStore, LiveSettings};
use crate::plan::{fold_outcome, plan_reconcile, plan_restore, ScalarPlan};
use async_trait::async_trait;
use dashmap::DashMap;
use indexmap::IndexMap;
use pref_queue::{BatchId, BatchOutcome, QueueConfig, QueueHandler, QueueRegistry, WriteQueue};
use pref_value::{Bundle, CacheMap, ItemId, SettingKey, WriteOp};
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Name of the queue carrying scalar setting writes
pub const SETTINGS_QUEUE: &str = "settings";

/// Pass direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    /// Move live state toward a bundle
    Apply,
    /// Give back every owned key
    Restore,
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Apply => write!(f, "apply"),
            Self::Restore => write!(f, "restore"),
        }
    }
}

/// What a pass scheduled, returned as soon as the writes are queued
#[derive(Debug, Clone, PartialEq)]
pub struct PassReport {
    /// Item the pass ran for
    pub item: ItemId,
    /// Pass direction
    pub kind: PassKind,
    /// Writes submitted to the settings queue
    pub submitted: Vec<WriteOp>,
    /// Keys released because the user changed them
    pub released: Vec<SettingKey>,
}

impl PassReport {
    /// Whether the pass scheduled no writes
    #[inline]
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.submitted.is_empty()
    }
}

/// Final state of a pass once its cache update has been persisted
#[derive(Debug, Clone, PartialEq)]
pub struct SettledPass {
    /// Item the pass ran for
    pub item: ItemId,
    /// Pass direction
    pub kind: PassKind,
    /// Queue run that carried the writes, `None` when nothing was written
    pub batch: Option<BatchId>,
    /// Writes that succeeded
    pub succeeded: Vec<WriteOp>,
    /// Writes that exhausted their retries
    pub failed: Vec<WriteOp>,
    /// Cache as persisted
    pub cache: CacheMap,
    /// Cache persistence failure, if any
    pub persist_error: Option<String>,
}

impl SettledPass {
    /// Whether every write succeeded and the cache was saved
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.persist_error.is_none()
    }
}

struct PendingPass {
    kind: PassKind,
    before: CacheMap,
    planned: CacheMap,
    _guard: OwnedMutexGuard<()>,
}

/// Shared state behind a [`Reconciler`]
pub struct ReconcilerContext {
    pub(crate) live: Arc<dyn LiveSettings>,
    pub(crate) cache: Arc<dyn CacheStore>,
    queues: QueueRegistry<WriteOp>,
    locks: DashMap<ItemId, Arc<Mutex<()>>>,
    pending: DashMap<ItemId, PendingPass>,
    settled: DashMap<ItemId, SettledPass>,
}

impl fmt::Debug for ReconcilerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconcilerContext")
            .field("queues", &self.queues)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl ReconcilerContext {
    fn new(live: Arc<dyn LiveSettings>, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            live,
            cache,
            queues: QueueRegistry::new(),
            locks: DashMap::new(),
            pending: DashMap::new(),
            settled: DashMap::new(),
        }
    }

    /// Live settings handle
    #[inline]
    #[must_use]
    pub fn live(&self) -> &Arc<dyn LiveSettings> {
        &self.live
    }

    /// Cache store handle
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    /// Queue registry, also usable for host-defined queues
    #[inline]
    #[must_use]
    pub fn queues(&self) -> &QueueRegistry<WriteOp> {
        &self.queues
    }

    pub(crate) async fn lock_item(&self, item: &ItemId) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.locks.entry(item.clone()).or_default().value());
        lock.lock_owned().await
    }

    pub(crate) fn load_cache(&self, item: &ItemId) -> Result<CacheMap, ReconcileError> {
        match self.cache.read(item) {
            Some(raw) => Ok(CacheMap::decode(&raw)?),
            None => Ok(CacheMap::new()),
        }
    }

    async fn persist(
        &self,
        item: &ItemId,
        before: &CacheMap,
        after: &CacheMap,
    ) -> Result<(), ReconcileError> {
        if before == after {
            return Ok(());
        }

        let encoded = if after.is_empty() {
            None
        } else {
            Some(after.encode()?)
        };
        self.cache.write(item, encoded).await?;
        Ok(())
    }

    async fn settle(&self, outcome: BatchOutcome<WriteOp>) {
        let batch = outcome.batch;
        let mut by_item: IndexMap<ItemId, (Vec<WriteOp>, Vec<WriteOp>)> = IndexMap::new();
        for op in outcome.succeeded {
            by_item.entry(op.item.clone()).or_default().0.push(op);
        }
        for op in outcome.failed {
            by_item.entry(op.item.clone()).or_default().1.push(op);
        }

        for (item, (succeeded, failed)) in by_item {
            let Some((_, pass)) = self.pending.remove(&item) else {
                tracing::warn!(%item, %batch, "batch outcome for item without a pending pass");
                continue;
            };

            let cache = fold_outcome(&pass.before, &pass.planned, &failed, self.live.as_ref());
            let persist_error = match self.persist(&item, &pass.before, &cache).await {
                Ok(()) => None,
                Err(err) => {
                    tracing::error!(%item, error = %err, "failed to persist provenance cache");
                    Some(err.to_string())
                }
            };

            tracing::info!(
                %item,
                %batch,
                kind = %pass.kind,
                succeeded = succeeded.len(),
                failed = failed.len(),
                owned = cache.len(),
                "pass settled"
            );

            self.settled.insert(
                item.clone(),
                SettledPass {
                    item,
                    kind: pass.kind,
                    batch: Some(batch),
                    succeeded,
                    failed,
                    cache,
                    persist_error,
                },
            );
            drop(pass);
        }
    }
}

/// Queue handler applying setting writes and folding batch outcomes
pub struct SettingsWriter {
    ctx: Weak<ReconcilerContext>,
}

#[async_trait]
impl QueueHandler<WriteOp> for SettingsWriter {
    type Output = ();
    type Error = StoreError;

    async fn handle(&self, op: &WriteOp) -> Result<(), StoreError> {
        let Some(ctx) = self.ctx.upgrade() else {
            return Err(StoreError::rejected(op.key.as_str(), "reconciler dropped"));
        };
        ctx.live.write(&op.key, op.value.clone()).await
    }

    fn on_success(&self, op: &WriteOp, _output: &()) {
        tracing::debug!(%op, "setting written");
    }

    fn on_failure(&self, op: &WriteOp, error: &StoreError) {
        tracing::warn!(%op, %error, "setting write gave up");
    }

    async fn on_batch_end(&self, outcome: BatchOutcome<WriteOp>) {
        if let Some(ctx) = self.ctx.upgrade() {
            ctx.settle(outcome).await;
        }
    }
}

/// Provenance-tracked settings reconciler
#[derive(Clone)]
pub struct Reconciler {
    pub(crate) ctx: Arc<ReconcilerContext>,
    writes: WriteQueue<SettingsWriter>,
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("ctx", &self.ctx)
            .field("writes", &self.writes)
            .finish()
    }
}

impl Reconciler {
    /// Create reconciler and register its settings queue
    ///
    /// # Errors
    /// - `ReconcileError::Queue` if the settings queue cannot be registered
    pub fn new(
        live: Arc<dyn LiveSettings>,
        cache: Arc<dyn CacheStore>,
        config: QueueConfig,
    ) -> Result<Self, ReconcileError> {
        let ctx = Arc::new(ReconcilerContext::new(live, cache));
        let writer = Arc::new(SettingsWriter {
            ctx: Arc::downgrade(&ctx),
        });
        let writes = ctx.queues.register(SETTINGS_QUEUE, config, writer)?;
        Ok(Self { ctx, writes })
    }

    /// Shared context
    #[inline]
    #[must_use]
    pub fn context(&self) -> &Arc<ReconcilerContext> {
        &self.ctx
    }

    /// Reconcile an item toward `bundle`
    ///
    /// Returns once the writes are queued; the cache is persisted when the
    /// queue run ends. A pass with nothing to write persists any released
    /// ownership before returning.
    ///
    /// # Errors
    /// - `ReconcileError::Value` if the stored cache entry is unreadable
    /// - `ReconcileError::Store` if persisting released ownership fails
    /// - `ReconcileError::Queue` if submission fails
    pub async fn reconcile(
        &self,
        item: &ItemId,
        bundle: &Bundle,
    ) -> Result<PassReport, ReconcileError> {
        let guard = self.ctx.lock_item(item).await;
        let before = self.ctx.load_cache(item)?;
        let plan = plan_reconcile(item, bundle, &before, self.ctx.live.as_ref());

        tracing::info!(
            %item,
            bundle = %bundle.name,
            writes = plan.ops.len(),
            released = plan.released.len(),
            "reconcile pass planned"
        );
        self.dispatch(item, PassKind::Apply, before, plan, guard).await
    }

    /// Revert every key the item still owns and forget the rest
    ///
    /// # Errors
    /// Same as [`Reconciler::reconcile`].
    pub async fn restore(&self, item: &ItemId) -> Result<PassReport, ReconcileError> {
        let guard = self.ctx.lock_item(item).await;
        let before = self.ctx.load_cache(item)?;
        let plan = plan_restore(item, &before, self.ctx.live.as_ref());

        tracing::info!(
            %item,
            reverts = plan.ops.len(),
            released = plan.released.len(),
            "restore pass planned"
        );
        self.dispatch(item, PassKind::Restore, before, plan, guard).await
    }

    async fn dispatch(
        &self,
        item: &ItemId,
        kind: PassKind,
        before: CacheMap,
        plan: ScalarPlan,
        guard: OwnedMutexGuard<()>,
    ) -> Result<PassReport, ReconcileError> {
        let report = PassReport {
            item: item.clone(),
            kind,
            submitted: plan.ops.clone(),
            released: plan.released,
        };

        if plan.ops.is_empty() {
            self.ctx.persist(item, &before, &plan.cache).await?;
            self.ctx.settled.insert(
                item.clone(),
                SettledPass {
                    item: item.clone(),
                    kind,
                    batch: None,
                    succeeded: Vec::new(),
                    failed: Vec::new(),
                    cache: plan.cache,
                    persist_error: None,
                },
            );
            drop(guard);
            return Ok(report);
        }

        self.ctx.pending.insert(
            item.clone(),
            PendingPass {
                kind,
                before,
                planned: plan.cache,
                _guard: guard,
            },
        );

        if let Err(err) = self.writes.submit(plan.ops) {
            self.ctx.pending.remove(item);
            return Err(err.into());
        }
        Ok(report)
    }

    /// Cache entry currently stored for an item
    ///
    /// # Errors
    /// - `ReconcileError::Value` if the stored entry is unreadable
    pub fn owned(&self, item: &ItemId) -> Result<CacheMap, ReconcileError> {
        self.ctx.load_cache(item)
    }

    /// Most recent settled pass for an item
    #[must_use]
    pub fn last_settled(&self, item: &ItemId) -> Option<SettledPass> {
        self.ctx.settled.get(item).map(|entry| entry.value().clone())
    }

    /// Wait until the settings queue has drained and folded its outcome
    pub async fn wait_idle(&self) {
        self.writes.wait_idle().await;
    }

    /// Wait until every registered queue has drained
    pub async fn wait_idle_all(&self) {
        self.ctx.queues.wait_idle_all().await;
    }
}
