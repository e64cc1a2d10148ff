//! Built-in bundles, composite rule and toggle bindings

use crate::composite::CompositeTarget;
use crate::reconciler::Reconciler;
use crate::toggle::{Action, CompositeRule, Controller, ToggleBinding};
use pref_value::{Bundle, Rule, SettingValue};

/// Toggle selecting the experience bundle
pub const EXPERIENCE_MODE: &str = "comfort.experienceMode";

/// Toggle controlling the bold font rule
pub const FONT_STYLE_BOLD: &str = "comfort.fontStyle.bold";

/// Composite rule name used by the bold toggle
pub const BOLD_COMPOSITE: &str = "fontStyleBold";

/// Calm editor defaults
#[must_use]
pub fn basic() -> Bundle {
    Bundle::new("basic")
        .with("editor.foldingHighlight", false)
        .with("editor.hideCursorInOverviewRuler", true)
        .with("editor.scrollbar.verticalScrollbarSize", 24)
        .with("editor.smoothScrolling", true)
        .with("workbench.list.smoothScrolling", true)
}

/// Basic plus fewer distractions
#[must_use]
pub fn advanced() -> Bundle {
    Bundle::new("advanced")
        .with("editor.minimap.enabled", false)
        .with("editor.foldingHighlight", false)
        .with("editor.hideCursorInOverviewRuler", true)
        .with("editor.scrollbar.verticalScrollbarSize", 24)
        .with("editor.smoothScrolling", true)
        .with("editor.stickyScroll.enabled", true)
        .with("workbench.list.smoothScrolling", true)
}

/// Where token colour rules live
#[must_use]
pub fn token_rules_target() -> CompositeTarget {
    CompositeTarget::new("editor.tokenColorCustomizations", "textMateRules")
}

/// Bold constants and function names
#[must_use]
pub fn bold_font_rule() -> Rule {
    Rule::new("Font Style: Bold")
        .with_scope(["constant", "entity.name.function", "meta.function-call.python"])
        .with_setting("fontStyle", "bold")
}

/// Experience mode: unset restores, "on" applies basic, "advance" applies advanced
#[must_use]
pub fn experience_binding() -> ToggleBinding {
    ToggleBinding::new(EXPERIENCE_MODE, EXPERIENCE_MODE)
        .when(None, Action::Restore)
        .when(
            Some(SettingValue::from("on")),
            Action::Apply {
                bundle: "basic".to_string(),
            },
        )
        .when(
            Some(SettingValue::from("advance")),
            Action::Apply {
                bundle: "advanced".to_string(),
            },
        )
}

/// Bold toggle: unset merges the rule, false withdraws it
#[must_use]
pub fn bold_binding() -> ToggleBinding {
    ToggleBinding::new(FONT_STYLE_BOLD, FONT_STYLE_BOLD)
        .when(
            None,
            Action::Merge {
                composite: BOLD_COMPOSITE.to_string(),
            },
        )
        .when(
            Some(SettingValue::Bool(false)),
            Action::Unmerge {
                composite: BOLD_COMPOSITE.to_string(),
            },
        )
        .on_activate()
}

/// Controller wired with every built-in bundle, rule and binding
#[must_use]
pub fn controller(reconciler: Reconciler) -> Controller {
    Controller::new(reconciler)
        .with_bundle(basic())
        .with_bundle(advanced())
        .with_composite(
            BOLD_COMPOSITE,
            CompositeRule {
                target: token_rules_target(),
                rule: bold_font_rule(),
            },
        )
        .with_binding(experience_binding())
        .with_binding(bold_binding())
}
