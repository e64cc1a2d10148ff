//! Scalar reconciliation planning
//!
//! Pure functions over (desired bundle, provenance cache, live reader). The
//! live value is re-validated for every tracked key: the cache alone cannot
//! tell "still holds our value" from "user customised it after we wrote it".

use crate::host::LiveSettings;
use pref_value::{Bundle, CacheMap, ItemId, SettingKey, WriteOp};

/// Writes to schedule and the cache state expected once they succeed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScalarPlan {
    /// Operations to submit, in bundle order then cache order
    pub ops: Vec<WriteOp>,
    /// Cache copy assuming every operation succeeds
    pub cache: CacheMap,
    /// Keys whose ownership was released without a write
    pub released: Vec<SettingKey>,
}

impl ScalarPlan {
    /// Whether nothing needs writing
    #[inline]
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Plan moving live state toward `bundle` without touching user-owned keys
#[must_use]
pub fn plan_reconcile(
    item: &ItemId,
    bundle: &Bundle,
    cache: &CacheMap,
    live: &dyn LiveSettings,
) -> ScalarPlan {
    let mut plan = ScalarPlan {
        cache: cache.clone(),
        ..ScalarPlan::default()
    };

    for (key, desired) in bundle.iter() {
        let current = live.read(key);

        match cache.get(key.as_str()) {
            Some(cached) if current.as_ref() == Some(cached) => {
                if cached != desired {
                    tracing::debug!(%item, %key, "owned value differs from bundle, updating");
                    plan.ops.push(WriteOp::set(item.clone(), key.clone(), desired.clone()));
                    plan.cache.insert(key.clone(), desired.clone());
                }
            }
            Some(_) => {
                tracing::debug!(%item, %key, "live value drifted from cache, releasing");
                plan.cache.remove(key.as_str());
                plan.released.push(key.clone());
            }
            None if current.is_none() => {
                tracing::debug!(%item, %key, "default value, taking ownership");
                plan.ops.push(WriteOp::set(item.clone(), key.clone(), desired.clone()));
                plan.cache.insert(key.clone(), desired.clone());
            }
            None => {
                tracing::debug!(%item, %key, "user-set value, leaving alone");
            }
        }
    }

    for (key, cached) in cache.iter() {
        if bundle.contains(key.as_str()) {
            continue;
        }

        if live.read(key).as_ref() == Some(cached) {
            plan.ops.push(WriteOp::revert(item.clone(), key.clone()));
        } else {
            plan.released.push(key.clone());
        }
        plan.cache.remove(key.as_str());
    }

    plan
}

/// Plan reverting every key this item still owns
#[must_use]
pub fn plan_restore(item: &ItemId, cache: &CacheMap, live: &dyn LiveSettings) -> ScalarPlan {
    let mut plan = ScalarPlan::default();

    for (key, cached) in cache.iter() {
        if live.read(key).as_ref() == Some(cached) {
            plan.ops.push(WriteOp::revert(item.clone(), key.clone()));
        } else {
            plan.released.push(key.clone());
        }
    }

    plan
}

/// Final cache for a settled pass
///
/// Succeeded operations are already reflected in `planned`. A failed
/// operation keeps its planned effect only when the live value already
/// equals its target; otherwise the key falls back to its pre-pass
/// ownership.
#[must_use]
pub fn fold_outcome<'a>(
    before: &CacheMap,
    planned: &CacheMap,
    failed: impl IntoIterator<Item = &'a WriteOp>,
    live: &dyn LiveSettings,
) -> CacheMap {
    let mut settled = planned.clone();

    for op in failed {
        if live.read(&op.key) == op.value {
            continue;
        }
        settled.apply(&op.key, before.get(op.key.as_str()));
    }

    settled
}
