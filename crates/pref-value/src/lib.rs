//! Pref Value Model
//!
//! Closed, structurally-compared setting values and the small set of types
//! that move between the reconciler and the retry queue:
//!
//! - [`SettingValue`]: boolean | number | string | rule list | object
//! - [`Rule`]: one named entry of a list-structured setting
//! - [`WriteOp`]: set or revert a single setting on behalf of an item
//! - [`Bundle`]: a named, ordered mapping of desired setting values
//! - [`CacheMap`] / [`ScopeSet`]: serialized provenance cache entries
//!
//! # Example
//!
//! ```rust
//! use pref_value::{Bundle, CacheMap, SettingValue};
//!
//! let bundle = Bundle::new("basic")
//!     .with("editor.smoothScrolling", true)
//!     .with("editor.scrollbar.verticalScrollbarSize", 24);
//!
//! let mut cache = CacheMap::new();
//! cache.insert("editor.smoothScrolling", SettingValue::Bool(true));
//! let encoded = cache.encode().unwrap();
//! assert_eq!(encoded, r#"[["editor.smoothScrolling",true]]"#);
//! assert_eq!(bundle.len(), 2);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod cache;
pub mod error;
pub mod op;
pub mod value;

pub use cache::{CacheMap, ScopeSet};
pub use error::ValueError;
pub use op::{Bundle, ItemId, SettingKey, WriteOp};
pub use value::{Rule, Scope, SettingValue};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with setting values
    pub use crate::{Bundle, CacheMap, ItemId, Rule, Scope, ScopeSet, SettingKey, SettingValue, WriteOp};
}
