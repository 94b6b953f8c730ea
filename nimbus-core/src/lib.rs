//! Cloud inventory scan pipeline: authenticate, gather under a rate cap,
//! merge with persisted state, evaluate rules, finalize.
#![allow(missing_docs)]

pub mod auth;
pub mod backend;
pub mod credentials;
pub mod error;
pub mod exceptions;
pub mod fetch;
pub mod limiter;
pub mod merge;
pub mod pipeline;
pub mod postprocess;
pub mod preprocess;
pub mod provider;
pub mod rules;
pub mod state_store;

pub use auth::{AccountScope, AuthOptions, SecretString};
pub use backend::{
    FetchContext, ProviderBackend, ProviderDescription, ProviderRegistry,
    RegionFilter, Selection,
};
pub use credentials::Credentials;
pub use error::{
    ExceptionLoadError, FetchError, HandleStateError, PipelineError, Result,
    StateLoadError,
};
pub use fetch::{FailedService, FetchCoordinator, FetchReport};
pub use limiter::{CallThrottle, FixedWindowLimiter, RatePermit};
pub use pipeline::{
    DataMode, PipelineStage, RunFailure, RunOptions, RunOutcome, ScanPipeline,
    ScanReport, execute_run, exit_codes,
};
pub use provider::{HandleState, ProviderHandle};
pub use rules::{RuleEngine, RulePipeline};
pub use state_store::{InMemoryStateStore, JsonFileStateStore, StateStore};

pub use nimbus_model as model;
