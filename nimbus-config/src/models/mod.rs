pub mod rate_limit;
pub mod settings;

pub use rate_limit::RateLimitSettings;
pub use settings::{RunSettings, RunSettingsSource, ScopeSettings};
