//! Setting values
//!
//! Values are a closed variant compared by structural equality, never by
//! identity. Absence (the external default) is modelled as `Option::None`
//! by every consumer, so there is no `Null` variant.

use crate::error::ValueError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};

/// A single externally-owned preference value
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    /// Boolean flag
    Bool(bool),
    /// Numeric value
    Number(f64),
    /// String value
    String(String),
    /// Ordered list of named rule objects
    Rules(Vec<Rule>),
    /// Object holding nested properties (e.g. a rule list next to foreign keys)
    Object(IndexMap<String, SettingValue>),
}

impl SettingValue {
    /// Convert a JSON value, rejecting shapes with no setting representation
    ///
    /// # Errors
    /// - `ValueError::Unrepresentable` for `null` and arrays that are not rule lists
    pub fn from_json(value: serde_json::Value) -> Result<Self, ValueError> {
        if value.is_null() {
            return Err(ValueError::Unrepresentable("null".to_string()));
        }
        let shown = value.to_string();
        serde_json::from_value(value).map_err(|_| ValueError::Unrepresentable(shown))
    }

    /// Convert into a JSON value
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => match whole_number(*n) {
                Some(i) => serde_json::Value::from(i),
                None => serde_json::Number::from_f64(*n)
                    .map_or(serde_json::Value::Null, serde_json::Value::Number),
            },
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Rules(rules) => serde_json::Value::Array(
                rules.iter().map(Rule::to_json).collect(),
            ),
            Self::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Borrow as object properties
    #[inline]
    #[must_use]
    pub fn as_object(&self) -> Option<&IndexMap<String, SettingValue>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Borrow as a rule list
    #[inline]
    #[must_use]
    pub fn as_rules(&self) -> Option<&[Rule]> {
        match self {
            Self::Rules(rules) => Some(rules),
            _ => None,
        }
    }

    /// Borrow as string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as boolean
    #[inline]
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Whole numbers within the exact f64 range are written without a fraction
#[allow(clippy::cast_possible_truncation)]
fn whole_number(n: f64) -> Option<i64> {
    const EXACT: f64 = 9_007_199_254_740_992.0;
    (n.fract() == 0.0 && n.abs() < EXACT).then(|| n as i64)
}

impl Serialize for SettingValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => match whole_number(*n) {
                Some(i) => serializer.serialize_i64(i),
                None => serializer.serialize_f64(*n),
            },
            Self::String(s) => serializer.serialize_str(s),
            Self::Rules(rules) => rules.serialize(serializer),
            Self::Object(map) => map.serialize(serializer),
        }
    }
}

impl std::fmt::Display for SettingValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for SettingValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<Rule>> for SettingValue {
    fn from(value: Vec<Rule>) -> Self {
        Self::Rules(value)
    }
}

/// Scope selectors of a rule, kept in the shape they were written in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scope {
    /// Single selector written as a plain string
    One(String),
    /// Selector list
    Many(Vec<String>),
}

impl Scope {
    /// Selectors as a slice
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        match self {
            Self::One(selector) => std::slice::from_ref(selector),
            Self::Many(selectors) => selectors,
        }
    }

    /// Whether `selector` is present
    #[inline]
    #[must_use]
    pub fn contains(&self, selector: &str) -> bool {
        self.as_slice().iter().any(|s| s == selector)
    }

    /// Append a selector; a single selector becomes a list
    pub fn push(&mut self, selector: String) {
        match self {
            Self::One(first) => *self = Self::Many(vec![std::mem::take(first), selector]),
            Self::Many(selectors) => selectors.push(selector),
        }
    }

    /// Keep only selectors matching `keep`
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        match self {
            Self::One(selector) => {
                if !keep(selector) {
                    *self = Self::Many(Vec::new());
                }
            }
            Self::Many(selectors) => selectors.retain(|s| keep(s)),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            Self::One(selector) => serde_json::Value::String(selector.clone()),
            Self::Many(selectors) => selectors.iter().cloned().map(serde_json::Value::String).collect(),
        }
    }
}

/// One named entry of a list-structured setting
///
/// Several contributors may share one list; an entry is recognised as ours
/// only when both `name` and the complete `settings` object match. Properties
/// other than `name`, `scope` and `settings` belong to whoever wrote the entry
/// and are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Rule identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Scope selectors the rule applies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    /// Rule payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<IndexMap<String, SettingValue>>,
    /// Foreign properties
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

impl Rule {
    /// Create named rule with empty scope and settings
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            scope: None,
            settings: None,
            extra: IndexMap::new(),
        }
    }

    /// With scope selectors
    #[must_use]
    pub fn with_scope<I, S>(mut self, scope: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope = Some(Scope::Many(scope.into_iter().map(Into::into).collect()));
        self
    }

    /// With one settings entry
    #[must_use]
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<SettingValue>) -> Self {
        self.settings
            .get_or_insert_with(IndexMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// With one foreign property
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Same name and exactly the same settings
    #[inline]
    #[must_use]
    pub fn same_identity(&self, other: &Rule) -> bool {
        self.name.is_some() && self.name == other.name && self.settings == other.settings
    }

    /// Scope selectors, empty when absent
    #[inline]
    #[must_use]
    pub fn scope(&self) -> &[String] {
        self.scope.as_ref().map_or(&[], Scope::as_slice)
    }

    fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        if let Some(name) = &self.name {
            obj.insert("name".to_string(), serde_json::Value::String(name.clone()));
        }
        if let Some(scope) = &self.scope {
            obj.insert("scope".to_string(), scope.to_json());
        }
        if let Some(settings) = &self.settings {
            obj.insert(
                "settings".to_string(),
                serde_json::Value::Object(
                    settings.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
                ),
            );
        }
        for (key, value) in &self.extra {
            obj.insert(key.clone(), value.clone());
        }
        serde_json::Value::Object(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn numbers_compare_structurally() {
        assert_eq!(SettingValue::from(24), SettingValue::Number(24.0));
        assert_ne!(SettingValue::from(24), SettingValue::from("24"));
    }

    #[test]
    fn whole_numbers_serialize_without_fraction() {
        assert_eq!(serde_json::to_string(&SettingValue::from(24)).unwrap(), "24");
        assert_eq!(serde_json::to_string(&SettingValue::Number(1.5)).unwrap(), "1.5");
        assert_eq!(SettingValue::from(24).to_string(), "24");
    }

    #[test]
    fn object_equality_ignores_property_order() {
        let a = SettingValue::from_json(json!({"a": 1, "b": true})).unwrap();
        let b = SettingValue::from_json(json!({"b": true, "a": 1})).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rule_list_parses_from_json() {
        let value = SettingValue::from_json(json!({
            "textMateRules": [
                {"name": "Foo", "scope": ["comment"], "settings": {"fontStyle": "italic"}}
            ]
        }))
        .unwrap();

        let rules = value.as_object().unwrap()["textMateRules"].as_rules().unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name.as_deref(), Some("Foo"));
        assert_eq!(rules[0].scope(), ["comment".to_string()]);
    }

    #[test]
    fn null_is_unrepresentable() {
        assert!(matches!(
            SettingValue::from_json(serde_json::Value::Null),
            Err(ValueError::Unrepresentable(_))
        ));
    }

    #[test]
    fn json_conversion_is_lossless_for_rules() {
        let rule = Rule::new("Bold").with_scope(["constant"]).with_setting("fontStyle", "bold");
        let value = SettingValue::Rules(vec![rule]);
        let back = SettingValue::from_json(value.to_json()).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn foreign_rule_properties_survive_conversion() {
        let raw = json!({
            "textMateRules": [
                {"name": "Foo", "scope": ["c"], "settings": {"foreground": "#888"}, "comment": "mine"}
            ]
        });
        let value = SettingValue::from_json(raw.clone()).unwrap();
        assert_eq!(value.to_json(), raw);

        let rulers = json!([{"column": 80, "color": "#f00"}]);
        assert_eq!(SettingValue::from_json(rulers.clone()).unwrap().to_json(), rulers);
        assert_ne!(
            SettingValue::from_json(rulers).unwrap(),
            SettingValue::from_json(json!([{"column": 120}])).unwrap()
        );
    }

    #[test]
    fn single_selector_scope_keeps_its_shape() {
        let raw = json!([{"name": "Foo", "scope": "comment", "settings": {"fontStyle": "italic"}}]);
        let value = SettingValue::from_json(raw.clone()).unwrap();

        assert_eq!(value.as_rules().unwrap()[0].scope(), ["comment".to_string()]);
        assert_eq!(value.to_json(), raw);
        assert_eq!(serde_json::to_value(&value).unwrap(), raw);
    }

    #[test]
    fn scope_push_widens_single_selector() {
        let mut scope = Scope::One("comment".to_string());
        scope.push("keyword".to_string());
        assert_eq!(scope, Scope::Many(vec!["comment".into(), "keyword".into()]));

        let mut single = Scope::One("comment".to_string());
        single.retain(|s| s != "comment");
        assert!(single.as_slice().is_empty());
    }

    #[test]
    fn identity_requires_exact_settings() {
        let ours = Rule::new("Bold").with_setting("fontStyle", "bold");
        let extended = ours.clone().with_setting("foreground", "#fff");
        let renamed = Rule::new("Other").with_setting("fontStyle", "bold");

        assert!(ours.same_identity(&ours.clone().with_scope(["x"])));
        assert!(!ours.same_identity(&extended));
        assert!(!ours.same_identity(&renamed));
    }
}
