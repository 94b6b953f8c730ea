//! Core data model definitions shared across Nimbus crates.
#![allow(missing_docs)]

pub mod error;
pub mod exceptions;
pub mod ids;
pub mod ip_ranges;
pub mod metadata;
pub mod provider;
pub mod rate_limit;
pub mod resource;
pub mod ruleset;
pub mod services;
pub mod state;

// Intentionally curated re-exports for downstream consumers.
pub use error::{ModelError, Result as ModelResult};
pub use exceptions::ExceptionTable;
pub use ids::RunId;
pub use ip_ranges::{IpRange, IpRangeTable};
pub use metadata::{LastRun, RunMetadata, RunParameters, ServiceSummary};
pub use provider::ProviderKind;
pub use rate_limit::RateLimitRule;
pub use resource::{Finding, Resource, ResourceTree, RuleLevel, ServiceTree};
pub use ruleset::{Annotation, RuleType, RulesetRequest};
pub use services::ServiceList;
pub use state::{STATE_BLOB_VERSION, StateBlob};
