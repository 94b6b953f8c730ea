use std::path::PathBuf;

use nimbus_model::ProviderKind;
use thiserror::Error;

use crate::pipeline::stage::{PipelineStage, exit_codes};
use crate::provider::HandleState;

/// Hard failure of a pipeline stage. Every variant aborts the run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Authentication failure: {0:#}")]
    Authentication(#[source] anyhow::Error),

    #[error("Initialization failure: {0:#}")]
    Initialization(#[source] anyhow::Error),

    #[error("Report initialization failure: {0:#}")]
    ReportInit(#[source] anyhow::Error),

    #[error("Failure while gathering data: {0}")]
    Fetch(#[source] FetchError),

    /// Carries the stage during which the cancellation was observed.
    #[error("Cancelled by user")]
    Cancelled(PipelineStage),

    #[error("Failure while running pre-processing engine: {0:#}")]
    Preprocessing(#[source] anyhow::Error),

    #[error("Failure while running rule engine: {0:#}")]
    RuleEngine(#[source] anyhow::Error),

    #[error("Failure while applying display filters: {0:#}")]
    FilterEngine(#[source] anyhow::Error),

    #[error("Failure while running post-processing engine: {0:#}")]
    PostProcessing(#[source] anyhow::Error),
}

impl PipelineError {
    pub fn stage(&self) -> PipelineStage {
        match self {
            PipelineError::Authentication(_) => PipelineStage::Authenticating,
            PipelineError::Initialization(_) => PipelineStage::ProviderInit,
            PipelineError::ReportInit(_) => PipelineStage::ReportInit,
            PipelineError::Fetch(_) => PipelineStage::Gathering,
            PipelineError::Cancelled(stage) => *stage,
            PipelineError::Preprocessing(_) => PipelineStage::Preprocessing,
            PipelineError::RuleEngine(_) => PipelineStage::RuleEvaluation,
            PipelineError::FilterEngine(_) => PipelineStage::FilterEvaluation,
            PipelineError::PostProcessing(_) => PipelineStage::PostProcessing,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Authentication(_) => exit_codes::AUTHENTICATION,
            PipelineError::Initialization(_) => exit_codes::INITIALIZATION,
            PipelineError::ReportInit(_) => exit_codes::REPORT_INIT,
            PipelineError::Fetch(_) => exit_codes::FETCH,
            PipelineError::Cancelled(_) => exit_codes::CANCELLED,
            PipelineError::Preprocessing(_) => exit_codes::PREPROCESSING,
            PipelineError::RuleEngine(_) => exit_codes::RULE_ENGINE,
            PipelineError::FilterEngine(_) => exit_codes::FILTER_ENGINE,
            PipelineError::PostProcessing(_) => exit_codes::POST_PROCESSING,
        }
    }
}

impl From<FetchError> for PipelineError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Cancelled { .. } => {
                PipelineError::Cancelled(PipelineStage::Gathering)
            }
            other => PipelineError::Fetch(other),
        }
    }
}

/// Rejected lifecycle transition on a provider handle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("provider handle is {from}; cannot move to {to}")]
pub struct HandleStateError {
    pub from: HandleState,
    pub to: HandleState,
}

/// Gathering failures. `Service` and `Panicked` are partial failures the
/// coordinator records without aborting sibling services.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid region selection: {0}")]
    InvalidRegions(String),

    #[error("fetch for service '{service}' failed: {source}")]
    Service {
        service: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("fetch task for service '{service}' panicked")]
    Panicked { service: String },

    #[error("fetch cancelled after {completed} service(s) completed")]
    Cancelled { completed: usize },

    #[error(transparent)]
    Handle(#[from] HandleStateError),
}

impl FetchError {
    /// Service the failure belongs to, for per-service failures.
    pub fn service(&self) -> Option<&str> {
        match self {
            FetchError::Service { service, .. }
            | FetchError::Panicked { service } => Some(service),
            _ => None,
        }
    }
}

/// Persisted state could not be used. Logged and tolerated by the pipeline.
#[derive(Error, Debug)]
pub enum StateLoadError {
    #[error("no persisted state at {path}")]
    Missing { path: PathBuf },

    #[error("no persisted state under key '{key}'")]
    MissingKey { key: String },

    #[error("failed to read persisted state {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("persisted state {origin} is not valid: {source}")]
    Invalid {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("persisted state version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u16, expected: u16 },

    #[error("persisted state belongs to provider {found}, run targets {expected}")]
    ProviderMismatch {
        expected: ProviderKind,
        found: ProviderKind,
    },

    #[error(transparent)]
    Handle(#[from] HandleStateError),
}

/// The exceptions file could not be used. Logged; an empty table is
/// substituted.
#[derive(Error, Debug)]
pub enum ExceptionLoadError {
    #[error("failed to read exceptions file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("exceptions file {path} is not valid: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("exceptions file targets account '{found}', run targets '{expected}'")]
    AccountMismatch { expected: String, found: String },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
