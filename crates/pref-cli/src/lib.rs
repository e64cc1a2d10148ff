//! prefctl support library
//!
//! File-backed host collaborators, the TOML configuration and command
//! execution used by the `prefctl` binary.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod commands;
pub mod config;
pub mod store;

pub use commands::{execute, Outcome, Request};
pub use config::{ConfigError, PrefConfig, DEFAULT_CONFIG};
pub use store::{JsonCacheFile, JsonSettingsFile};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
