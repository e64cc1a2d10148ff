//! Command execution
//!
//! Every command runs to completion: queued writes are drained and their
//! cache updates persisted before the summary is produced.

use pref_reconcile::{Action, ActionOutcome, Controller, Dispatched, ReconcileError};
use pref_value::{CacheMap, ItemId, ScopeSet, SettingKey};

/// One prefctl command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Reconcile an item toward a bundle
    Apply {
        /// Item identity
        item: ItemId,
        /// Bundle name
        bundle: String,
    },
    /// Restore an item
    Restore {
        /// Item identity
        item: ItemId,
    },
    /// Merge a composite rule
    Merge {
        /// Item identity
        item: ItemId,
        /// Composite rule name
        composite: String,
    },
    /// Unmerge a composite rule
    Unmerge {
        /// Item identity
        item: ItemId,
        /// Composite rule name
        composite: String,
    },
    /// Run the bindings of a toggle setting
    Toggle {
        /// Toggle setting key
        setting: SettingKey,
    },
    /// Run activation bindings
    Activate,
    /// Print the stored cache entry for an item
    Show {
        /// Item identity
        item: ItemId,
    },
}

/// Printable result of a command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    /// Summary lines
    pub lines: Vec<String>,
    /// False when any write failed or a cache update was lost
    pub clean: bool,
}

/// Run a request against a controller
///
/// # Errors
/// Any error the reconciler or controller reports before writes are queued.
pub async fn execute(controller: &Controller, request: Request) -> Result<Outcome, ReconcileError> {
    let dispatched = match request {
        Request::Show { item } => return show(controller, &item),
        Request::Apply { item, bundle } => vec![run(controller, item, Action::Apply { bundle }).await?],
        Request::Restore { item } => vec![run(controller, item, Action::Restore).await?],
        Request::Merge { item, composite } => vec![run(controller, item, Action::Merge { composite }).await?],
        Request::Unmerge { item, composite } => {
            vec![run(controller, item, Action::Unmerge { composite }).await?]
        }
        Request::Toggle { setting } => controller.handle_change(&setting).await?,
        Request::Activate => controller.activate().await?,
    };

    controller.shutdown().await;
    Ok(summarize(controller, &dispatched))
}

async fn run(controller: &Controller, item: ItemId, action: Action) -> Result<Dispatched, ReconcileError> {
    let outcome = controller.run(&item, &action).await?;
    Ok(Dispatched {
        setting: SettingKey::new(item.as_str()),
        item,
        action,
        outcome,
    })
}

fn summarize(controller: &Controller, dispatched: &[Dispatched]) -> Outcome {
    let mut outcome = Outcome {
        lines: Vec::new(),
        clean: true,
    };

    if dispatched.is_empty() {
        outcome.lines.push("no bindings matched".to_string());
    }

    for entry in dispatched {
        let line = match &entry.outcome {
            ActionOutcome::Nothing => format!("{}: nothing to do", entry.item),
            ActionOutcome::Composite(report) => format!(
                "{}: {} {}, owns {} selector(s)",
                entry.item,
                verb(&entry.action),
                if report.written { "written" } else { "unchanged" },
                report.owned.len()
            ),
            ActionOutcome::Pass(report) => match controller.reconciler().last_settled(&entry.item) {
                Some(settled) => {
                    outcome.clean &= settled.is_clean();
                    let mut line = format!(
                        "{}: {} wrote {}, failed {}, released {}, owns {}",
                        entry.item,
                        verb(&entry.action),
                        settled.succeeded.len(),
                        settled.failed.len(),
                        report.released.len(),
                        settled.cache.len()
                    );
                    if let Some(err) = &settled.persist_error {
                        line.push_str(&format!(" (cache not saved: {err})"));
                    }
                    line
                }
                None => format!("{}: {} queued {}", entry.item, verb(&entry.action), report.submitted.len()),
            },
        };
        outcome.lines.push(line);
    }

    outcome
}

fn verb(action: &Action) -> &'static str {
    match action {
        Action::Apply { .. } => "apply",
        Action::Restore => "restore",
        Action::Merge { .. } => "merge",
        Action::Unmerge { .. } => "unmerge",
        Action::Nothing => "nothing",
    }
}

fn show(controller: &Controller, item: &ItemId) -> Result<Outcome, ReconcileError> {
    let cache = controller.reconciler().context().cache();
    let Some(raw) = cache.read(item) else {
        return Ok(Outcome {
            lines: vec![format!("{item}: owns nothing")],
            clean: true,
        });
    };

    let mut lines = vec![format!("{item}:")];
    if let Ok(map) = CacheMap::decode(&raw) {
        lines.extend(map.iter().map(|(key, value)| format!("  {key} = {value}")));
    } else {
        let scopes = ScopeSet::decode(&raw)?;
        lines.extend(scopes.iter().map(|scope| format!("  scope {scope}")));
    }
    Ok(Outcome { lines, clean: true })
}
