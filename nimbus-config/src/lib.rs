//! Run settings for the Nimbus scan pipeline.
//!
//! Settings come from a TOML or JSON file (or inline JSON), are overridden by
//! `NIMBUS_*` environment variables, and are finally combined with
//! credentials into [`nimbus_core::RunOptions`].
#![allow(missing_docs)]

pub mod loader;
pub mod models;
pub mod util;

pub use loader::{SettingsLoad, SettingsLoader, error::ConfigLoadError};
pub use models::{RateLimitSettings, RunSettings, RunSettingsSource, ScopeSettings};
