use std::fmt;

use serde::{Deserialize, Serialize};

/// Process exit statuses surfaced to the caller, one per hard-stop stage.
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const AUTHENTICATION: i32 = 101;
    pub const INITIALIZATION: i32 = 102;
    pub const REPORT_INIT: i32 = 103;
    pub const FETCH: i32 = 104;
    pub const PREPROCESSING: i32 = 105;
    pub const RULE_ENGINE: i32 = 106;
    pub const FILTER_ENGINE: i32 = 107;
    pub const POST_PROCESSING: i32 = 108;
    /// Matches the conventional SIGINT status.
    pub const CANCELLED: i32 = 130;
}

/// States of the run controller, in execution order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum PipelineStage {
    Authenticating,
    ProviderInit,
    ReportInit,
    ListServicesAndExit,
    Gathering,
    Merging,
    Preprocessing,
    RuleEvaluation,
    FilterEvaluation,
    ExceptionHandling,
    PostProcessing,
    Done,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Authenticating => "authenticating",
            PipelineStage::ProviderInit => "provider_init",
            PipelineStage::ReportInit => "report_init",
            PipelineStage::ListServicesAndExit => "list_services",
            PipelineStage::Gathering => "gathering",
            PipelineStage::Merging => "merging",
            PipelineStage::Preprocessing => "preprocessing",
            PipelineStage::RuleEvaluation => "rule_evaluation",
            PipelineStage::FilterEvaluation => "filter_evaluation",
            PipelineStage::ExceptionHandling => "exception_handling",
            PipelineStage::PostProcessing => "post_processing",
            PipelineStage::Done => "done",
        }
    }

    /// Operator-facing progress line for the stage.
    pub fn banner(&self) -> &'static str {
        match self {
            PipelineStage::Authenticating => "Authenticating to cloud provider",
            PipelineStage::ProviderInit => "Initializing provider",
            PipelineStage::ReportInit => "Initializing report",
            PipelineStage::ListServicesAndExit => "Listing available services",
            PipelineStage::Gathering => "Gathering data from APIs",
            PipelineStage::Merging => "Merging persisted data",
            PipelineStage::Preprocessing => "Running pre-processing engine",
            PipelineStage::RuleEvaluation => "Running rule engine",
            PipelineStage::FilterEvaluation => "Applying display filters",
            PipelineStage::ExceptionHandling => "Applying exceptions",
            PipelineStage::PostProcessing => "Running post-processing engine",
            PipelineStage::Done => "Scan complete",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
